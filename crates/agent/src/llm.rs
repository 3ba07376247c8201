use std::time::Duration;

use async_trait::async_trait;
use careline_core::intent::{IntentEngineError, ResponseRequest};
use careline_core::Role;
use serde::{Deserialize, Serialize};

/// Text-completion boundary for the LLM engine. Implementations return the
/// raw completion; interpretation stays with the caller.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, IntentEngineError>;
}

/// Render the conversation turn into a single completion prompt. The model
/// is asked only for reply text; it is never shown actions to pick from and
/// never asked for a decision.
pub fn build_prompt(request: &ResponseRequest<'_>) -> String {
    let mut prompt = String::from(
        "You are a customer service representative. Reply to the customer's \
         latest message helpfully and concisely, in plain text.\n\n",
    );

    if let Some(name) = request.user_context.get("name").and_then(|value| value.as_str()) {
        prompt.push_str(&format!("Customer name: {name}\n"));
    }

    if !request.history.is_empty() {
        prompt.push_str("Conversation so far:\n");
        for message in request.history {
            let speaker = match message.role {
                Role::User => "Customer",
                Role::Assistant => "Agent",
                Role::System => "System",
            };
            prompt.push_str(&format!("{speaker}: {}\n", message.content));
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!("Customer: {}\nAgent:", request.message));
    prompt
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Ollama `/api/generate` client.
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, IntentEngineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| IntentEngineError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String, IntentEngineError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest { model: &self.model, prompt, stream: false };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| IntentEngineError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IntentEngineError::Transport(format!(
                "ollama returned status {status}"
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|err| IntentEngineError::InvalidResponse(err.to_string()))?;

        let text = parsed.response.trim().to_owned();
        if text.is_empty() {
            return Err(IntentEngineError::InvalidResponse(
                "model returned an empty completion".to_owned(),
            ));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use careline_core::intent::ResponseRequest;
    use careline_core::Message;
    use serde_json::json;

    use super::build_prompt;

    #[test]
    fn prompt_includes_history_and_customer_name() {
        let history = vec![Message::user("CUST1234 hello"), Message::assistant("Welcome back!")];
        let mut user_context = BTreeMap::new();
        user_context.insert("name".to_owned(), json!("Jordan Diaz"));

        let prompt = build_prompt(&ResponseRequest {
            message: "where is my order",
            history: &history,
            user_context: &user_context,
            available_actions: &[],
        });

        assert!(prompt.contains("Customer name: Jordan Diaz"));
        assert!(prompt.contains("Customer: CUST1234 hello"));
        assert!(prompt.contains("Agent: Welcome back!"));
        assert!(prompt.ends_with("Customer: where is my order\nAgent:"));
    }

    #[test]
    fn prompt_for_fresh_conversation_has_no_history_section() {
        let prompt = build_prompt(&ResponseRequest {
            message: "hi",
            history: &[],
            user_context: &BTreeMap::new(),
            available_actions: &[],
        });
        assert!(!prompt.contains("Conversation so far"));
        assert!(prompt.ends_with("Customer: hi\nAgent:"));
    }
}
