// Reversible PII tokenization

pub mod rules;
pub mod tokenizer;

pub use rules::{default_rules, PiiRule};
pub use tokenizer::PiiTokenizer;

use serde::{Deserialize, Serialize};

/// Run-scoped association between tokens and original sensitive values.
///
/// Created empty at the start of an orchestrator run, mutated by every mask
/// call within that run, and discarded when the run completes. Counters are
/// per type prefix and monotone; tokens are never renumbered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenMap {
    entries: Vec<TokenEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenEntry {
    prefix: String,
    index: usize,
    token: String,
    original: String,
}

impl TokenMap {
    pub fn new() -> Self {
        TokenMap::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Original value for a braced token, if present.
    pub fn original_for(&self, token: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.token == token)
            .map(|entry| entry.original.as_str())
    }

    /// Reuse the existing token when this exact value already has one of the
    /// same type prefix (dedup); otherwise allocate the next `{{PREFIX_n}}`.
    pub fn token_or_allocate(&mut self, prefix: &str, original: &str) -> String {
        if let Some(entry) = self
            .entries
            .iter()
            .find(|entry| entry.prefix == prefix && entry.original == original)
        {
            return entry.token.clone();
        }

        let index = self
            .entries
            .iter()
            .filter(|entry| entry.prefix == prefix)
            .count()
            + 1;
        let token = format!("{{{{{}_{}}}}}", prefix, index);
        self.entries.push(TokenEntry {
            prefix: prefix.to_string(),
            index,
            token: token.clone(),
            original: original.to_string(),
        });
        token
    }

    /// (token, bare token, original) triples, insertion order.
    pub(crate) fn replacement_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.entries.len() * 2);
        for entry in &self.entries {
            pairs.push((entry.token.clone(), entry.original.clone()));
            // Bare variant: the model may echo the token without braces.
            pairs.push((
                format!("{}_{}", entry.prefix, entry.index),
                entry.original.clone(),
            ));
        }
        pairs
    }
}
