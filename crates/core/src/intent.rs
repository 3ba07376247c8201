use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::action::Action;
use crate::domain::conversation::Message;

/// Everything the intent engine may consult for one turn: the new message,
/// the full transcript so far, the verified user context, and the catalog
/// of actions it is allowed to suggest from.
#[derive(Clone, Copy, Debug)]
pub struct ResponseRequest<'a> {
    pub message: &'a str,
    pub history: &'a [Message],
    pub user_context: &'a BTreeMap<String, Value>,
    pub available_actions: &'a [Action],
}

/// Structured output of one intent-engine call. `confidence` and
/// `sentiment` are both in `[0, 1]`; `suggested_actions` is ranked, most
/// relevant first.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineResponse {
    pub text: String,
    pub confidence: f64,
    pub sentiment: f64,
    pub intents: BTreeSet<String>,
    pub suggested_actions: Vec<Action>,
}

#[derive(Debug, Error)]
pub enum IntentEngineError {
    #[error("intent engine transport failure: {0}")]
    Transport(String),
    #[error("intent engine returned an unusable response: {0}")]
    InvalidResponse(String),
}

/// The natural-language boundary. The workflow engine treats any `Err` as
/// a signal to escalate the conversation to a human; it never retries
/// within a turn and never crashes the invocation.
#[async_trait]
pub trait IntentEngine: Send + Sync {
    async fn generate_response(
        &self,
        request: ResponseRequest<'_>,
    ) -> Result<EngineResponse, IntentEngineError>;
}
