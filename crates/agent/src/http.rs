//! HTTP client for a real support backend. Every endpoint speaks the same
//! envelope as [`ActionResult`], and every transport failure is folded into
//! a failed result rather than an error, which is what the workflow's
//! recovery rules expect from this boundary.

use std::time::Duration;

use async_trait::async_trait;
use careline_core::{ActionResult, CapabilityProvider};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::warn;

pub struct HttpCapabilityProvider {
    client: reqwest::Client,
    base_url: String,
    api_token: SecretString,
}

#[derive(Debug, thiserror::Error)]
pub enum HttpProviderError {
    #[error("could not build http client: {0}")]
    Client(reqwest::Error),
}

impl HttpCapabilityProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_token: SecretString,
        timeout: Duration,
    ) -> Result<Self, HttpProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(HttpProviderError::Client)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_token,
        })
    }

    /// POST `body` to `path` and decode the backend's `ActionResult`
    /// envelope. Any transport, status, or decode failure comes back as a
    /// failed result.
    async fn call(&self, path: &str, body: Value) -> ActionResult {
        let url = format!("{}{path}", self.base_url);
        let sent = self
            .client
            .post(&url)
            .bearer_auth(self.api_token.expose_secret())
            .json(&body)
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(err) => {
                warn!(event_name = "provider.http.transport_failure", path, error = %err);
                return ActionResult::fail("Support backend unreachable", err.to_string());
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(event_name = "provider.http.error_status", path, status = %status);
            return ActionResult::fail(
                "Support backend rejected the request",
                format!("status {status} from {path}"),
            );
        }

        match response.json::<ActionResult>().await {
            Ok(result) => result,
            Err(err) => {
                warn!(event_name = "provider.http.decode_failure", path, error = %err);
                ActionResult::fail("Support backend returned an unreadable response", err.to_string())
            }
        }
    }
}

#[async_trait]
impl CapabilityProvider for HttpCapabilityProvider {
    async fn verify_identity(&self, customer_id: &str, credential: &str) -> ActionResult {
        self.call("/auth/verify", json!({ "customer_id": customer_id, "credential": credential }))
            .await
    }

    async fn query_knowledge_base(&self, query: &str, category: Option<&str>) -> ActionResult {
        self.call("/kb/search", json!({ "query": query, "category": category })).await
    }

    async fn fetch_order_status(&self, order_number: &str) -> ActionResult {
        self.call(&format!("/orders/{order_number}/status"), json!({})).await
    }

    async fn get_user_context(&self, user_id: &str) -> ActionResult {
        self.call(&format!("/users/{user_id}/context"), json!({})).await
    }

    async fn execute_action(
        &self,
        user_id: &str,
        action_id: &str,
        params: Option<Value>,
    ) -> ActionResult {
        self.call(
            &format!("/actions/{action_id}/execute"),
            json!({ "user_id": user_id, "params": params }),
        )
        .await
    }

    async fn log_feedback(
        &self,
        session_id: &str,
        rating: u8,
        comments: Option<&str>,
    ) -> ActionResult {
        self.call(
            "/feedback/log",
            json!({ "session_id": session_id, "rating": rating, "comments": comments }),
        )
        .await
    }

    async fn update_shipping_address(&self, order_number: &str, address: &Value) -> ActionResult {
        self.call(
            &format!("/orders/{order_number}/update_shipping"),
            json!({ "address": address }),
        )
        .await
    }

    async fn request_refund(&self, order_number: &str, reason: &str) -> ActionResult {
        self.call(&format!("/orders/{order_number}/refund"), json!({ "reason": reason })).await
    }

    async fn send_order_email(&self, recipient: &str, order_number: &str) -> ActionResult {
        self.call(
            &format!("/orders/{order_number}/email"),
            json!({ "recipient": recipient }),
        )
        .await
    }

    async fn update_account_details(&self, user_id: &str, details: &Value) -> ActionResult {
        self.call("/account/update", json!({ "user_id": user_id, "details": details })).await
    }

    async fn schedule_callback(&self, user_id: &str, time: &str) -> ActionResult {
        self.call("/crm/callback", json!({ "user_id": user_id, "time": time })).await
    }
}
