//! Intent engines and capability providers for the careline workflow.
//!
//! Two `IntentEngine` implementations live here: a deterministic
//! keyword-and-lexicon engine for local development and tests, and an
//! LLM-backed engine that delegates only the reply text to the model while
//! keeping classification and action ranking deterministic. Two
//! `CapabilityProvider` implementations mirror them: an in-memory mock of
//! the support backend and an HTTP client for the real one.

pub mod classify;
pub mod engine;
pub mod http;
pub mod llm;
pub mod mock;

pub use engine::{default_action_catalog, HeuristicIntentEngine, LlmIntentEngine};
pub use http::HttpCapabilityProvider;
pub use llm::{LlmClient, OllamaClient};
pub use mock::MockCapabilityProvider;
