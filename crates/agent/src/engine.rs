use std::collections::BTreeSet;

use async_trait::async_trait;
use careline_core::intent::{
    EngineResponse, IntentEngine, IntentEngineError, ResponseRequest,
};
use careline_core::{Action, ActionPriority};
use tracing::debug;

use crate::classify::{detect_intents, has_specific_intent, rank_actions, sentiment_score};
use crate::llm::{build_prompt, LlmClient};

/// Confidence reported when the classifier recognized a specific intent.
const SPECIFIC_INTENT_CONFIDENCE: f64 = 0.85;
/// Confidence reported when only the general-inquiry fallback matched.
/// Deliberately below the workflow escalation threshold, so unclassifiable
/// messages route to a human.
const GENERAL_INQUIRY_CONFIDENCE: f64 = 0.55;

/// The default catalog of backend actions either engine may suggest from,
/// used when the caller supplies none.
pub fn default_action_catalog() -> Vec<Action> {
    vec![
        Action::new("order_track", "Track your order", ActionPriority::Medium),
        Action::new("order_refund", "Request a refund", ActionPriority::High),
        Action::new("order_email_confirmation", "Resend order confirmation", ActionPriority::Low),
        Action::new("account_update_email", "Update account email", ActionPriority::Medium),
        Action::new("account_reset_password", "Reset your password", ActionPriority::High),
        Action::new("payment_update_method", "Update payment method", ActionPriority::Medium),
        Action::new("payment_dispute_charge", "Dispute a charge", ActionPriority::High),
    ]
}

/// Deterministic engine: lexicon sentiment, keyword intents, templated
/// replies. No I/O, so it never fails.
pub struct HeuristicIntentEngine {
    catalog: Vec<Action>,
}

impl Default for HeuristicIntentEngine {
    fn default() -> Self {
        Self { catalog: default_action_catalog() }
    }
}

impl HeuristicIntentEngine {
    pub fn with_catalog(catalog: Vec<Action>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl IntentEngine for HeuristicIntentEngine {
    async fn generate_response(
        &self,
        request: ResponseRequest<'_>,
    ) -> Result<EngineResponse, IntentEngineError> {
        let intents = detect_intents(request.message);
        let sentiment = sentiment_score(request.message);
        let catalog =
            if request.available_actions.is_empty() {
                self.catalog.as_slice()
            } else {
                request.available_actions
            };
        let suggested_actions = rank_actions(catalog, &intents);
        let confidence = if has_specific_intent(&intents) {
            SPECIFIC_INTENT_CONFIDENCE
        } else {
            GENERAL_INQUIRY_CONFIDENCE
        };

        debug!(
            event_name = "intent.heuristic.classified",
            intents = ?intents,
            confidence,
            sentiment,
            "message classified"
        );

        Ok(EngineResponse {
            text: templated_reply(&intents, sentiment, request),
            confidence,
            sentiment,
            intents,
            suggested_actions,
        })
    }
}

fn templated_reply(
    intents: &BTreeSet<String>,
    sentiment: f64,
    request: ResponseRequest<'_>,
) -> String {
    let name = request
        .user_context
        .get("name")
        .and_then(|value| value.as_str())
        .map(|name| format!("{name}, "))
        .unwrap_or_default();

    let body = if intents.contains("order_status") {
        "I can help with your order. I've pulled up the options below."
    } else if intents.contains("technical_support") {
        "sorry you're running into trouble. Let's get that fixed."
    } else if intents.contains("account_help") {
        "I can help with your account. Here's what I can do right away."
    } else if intents.contains("billing") {
        "I can help with billing. The options below cover the common cases."
    } else {
        "how can I help you today?"
    };

    let empathy = if sentiment < 0.4 { " I understand this has been frustrating." } else { "" };
    format!("{name}{body}{empathy}")
}

/// LLM-backed engine. Classification and action ranking stay deterministic;
/// the model supplies only the reply text. Confidence is fixed at the
/// specific-intent level because the model always produces a usable reply
/// or an error.
pub struct LlmIntentEngine<C> {
    client: C,
    catalog: Vec<Action>,
}

impl<C: LlmClient> LlmIntentEngine<C> {
    pub fn new(client: C) -> Self {
        Self { client, catalog: default_action_catalog() }
    }

    pub fn with_catalog(client: C, catalog: Vec<Action>) -> Self {
        Self { client, catalog }
    }
}

#[async_trait]
impl<C: LlmClient> IntentEngine for LlmIntentEngine<C> {
    async fn generate_response(
        &self,
        request: ResponseRequest<'_>,
    ) -> Result<EngineResponse, IntentEngineError> {
        let intents = detect_intents(request.message);
        let sentiment = sentiment_score(request.message);
        let catalog =
            if request.available_actions.is_empty() {
                self.catalog.as_slice()
            } else {
                request.available_actions
            };
        let suggested_actions = rank_actions(catalog, &intents);

        let text = self.client.complete(&build_prompt(&request)).await?;

        Ok(EngineResponse {
            text,
            confidence: SPECIFIC_INTENT_CONFIDENCE,
            sentiment,
            intents,
            suggested_actions,
        })
    }
}
