use async_trait::async_trait;
use serde_json::Value;

use crate::domain::action::ActionResult;

/// The support-backend boundary: identity, knowledge base, order, account,
/// and feedback operations. Every call yields an [`ActionResult`];
/// implementations fold transport and backend failures into
/// `success == false` rather than returning an error, so the state machine
/// only ever sees a recoverable condition.
///
/// The engine assumes each call completes or fails synchronously within one
/// invocation. Implementations that add network I/O own their own timeout
/// and retry policy behind this boundary.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    async fn verify_identity(&self, customer_id: &str, credential: &str) -> ActionResult;

    async fn query_knowledge_base(&self, query: &str, category: Option<&str>) -> ActionResult;

    async fn fetch_order_status(&self, order_number: &str) -> ActionResult;

    async fn get_user_context(&self, user_id: &str) -> ActionResult;

    async fn execute_action(
        &self,
        user_id: &str,
        action_id: &str,
        params: Option<Value>,
    ) -> ActionResult;

    async fn log_feedback(
        &self,
        session_id: &str,
        rating: u8,
        comments: Option<&str>,
    ) -> ActionResult;

    async fn update_shipping_address(&self, order_number: &str, address: &Value) -> ActionResult;

    async fn request_refund(&self, order_number: &str, reason: &str) -> ActionResult;

    async fn send_order_email(&self, recipient: &str, order_number: &str) -> ActionResult;

    async fn update_account_details(&self, user_id: &str, details: &Value) -> ActionResult;

    async fn schedule_callback(&self, user_id: &str, time: &str) -> ActionResult;
}
