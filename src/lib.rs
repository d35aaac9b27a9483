// Privacy-preserving mail/calendar secretary agent core: reversible PII
// tokenization, capability-driven provider dispatch and a bounded
// tool-calling loop.

pub mod agent;
pub mod capabilities;
pub mod config;
pub mod pii;
pub mod providers;
pub mod tools;
pub mod types;

pub use agent::{AgentOrchestrator, EMPTY_REPLY, MAX_TURNS_MESSAGE};
pub use capabilities::{ModelCapability, ModelRegistry, ProtocolVariant};
pub use config::{AgentConfig, ProviderConfig};
pub use pii::{PiiTokenizer, TokenMap};
pub use providers::{DeltaStream, ProviderAdapter, ProviderFactory};
pub use tools::{secretary_tools, MailCalendar, MailCalendarExecutor, ToolExecutor};
pub use types::{Message, StreamEvent, ToolCall};
