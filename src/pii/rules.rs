// Ordered PII detection rules

use regex::Regex;

/// One typed detection rule. `group` 0 replaces the whole match; a positive
/// `group` replaces only that capture, keeping the surrounding literal text
/// (used for "key: value" credential patterns where the label stays visible).
pub struct PiiRule {
    pub prefix: &'static str,
    pub regex: Regex,
    pub group: usize,
}

impl PiiRule {
    fn whole(prefix: &'static str, pattern: &str) -> Self {
        PiiRule {
            prefix,
            regex: Regex::new(pattern).unwrap(),
            group: 0,
        }
    }

    fn capture(prefix: &'static str, pattern: &str, group: usize) -> Self {
        PiiRule {
            prefix,
            regex: Regex::new(pattern).unwrap(),
            group,
        }
    }
}

/// Default rule table. Order is the precedence policy: structural,
/// high-specificity patterns run before generic ones, because replacement is
/// textual and a later rule never sees an already-tokenized span. The
/// overlapping numeric-id rules keep the 10 -> 9 -> 8 digit order; callers
/// needing a different precedence pass their own slice to
/// `PiiTokenizer::with_rules`.
pub fn default_rules() -> Vec<PiiRule> {
    vec![
        // 1. JWT & tokens
        PiiRule::whole("JWT", r"eyJ[A-Za-z0-9-_]+\.eyJ[A-Za-z0-9-_]+\.[A-Za-z0-9-_]+"),
        PiiRule::whole("OPENAI_KEY", r"sk-[a-zA-Z0-9]{32,}"),
        PiiRule::whole("AWS_KEY", r"(?:AKIA|ASIA)[0-9A-Z]{16}"),
        // 2. Financial
        PiiRule::whole("IBAN", r"\b[A-Z]{2}\d{2}[A-Z0-9]{1,30}\b"),
        PiiRule::whole("SWIFT", r"\b[A-Z]{6}[A-Z0-9]{2}(?:[A-Z0-9]{3})?\b"),
        PiiRule::whole("CARD", r"\b(?:\d[ -]*?){13,19}\b"),
        // 3. Specific ids, prioritized over generic phone/email
        PiiRule::whole("PASSPORT_UA_OLD", r"\b[A-Z]{2}\d{6}\b"),
        PiiRule::whole("RNOKPP", r"\b\d{10}\b"),
        PiiRule::whole("PASSPORT_ID", r"\b\d{9}\b"),
        PiiRule::whole("EDRPOU", r"\b\d{8}\b"),
        // 4. Contact & location
        PiiRule::whole("EMAIL", r"(?i)\b[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}\b"),
        PiiRule::whole(
            "PHONE",
            r"\b(?:\+?\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b",
        ),
        PiiRule::whole(
            "COORDS",
            r"[-+]?([1-8]?\d(\.\d+)?|90(\.0+)?),\s*[-+]?(180(\.0+)?|((1[0-7]\d)|([1-9]?\d))(\.\d+)?)",
        ),
        // 5. Credentials: contextual, mask the value only
        PiiRule::capture(
            "CREDENTIAL",
            r"(?i)(?:password|passwd|pwd|secret|token|api[_-]?key|login)\s*[:=]\s*(\S+)",
            1,
        ),
        // 6. Address
        PiiRule::whole(
            "ADDRESS",
            r"\b\d+\s+[A-Za-z]+\s+(?:St|Street|Ave|Avenue|Road|Rd|Blvd|Lane|Ln)\b",
        ),
        PiiRule::whole(
            "ADDRESS_UA",
            r"\b(?:вул\.|вулиця|просп\.|проспект|бул\.|бульвар|пров\.|провулок)\s+[А-Яа-яIiЇїЄє0-9\-\s]+\b",
        ),
    ]
}
