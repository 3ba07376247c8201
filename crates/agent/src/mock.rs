//! In-memory stand-in for the support backend, used by local development,
//! the smoke command, and tests. Behavior is deterministic: customer ids
//! beginning with `CUST` verify, a small fixed set of orders and knowledge
//! base articles exists, and every known catalog action executes
//! successfully.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use careline_core::{Action, ActionPriority, ActionResult, CapabilityProvider};
use chrono::Utc;
use serde_json::{json, Value};

const KNOWN_ACTIONS: [&str; 7] = [
    "order_track",
    "order_refund",
    "order_email_confirmation",
    "account_update_email",
    "account_reset_password",
    "payment_update_method",
    "payment_dispute_charge",
];

#[derive(Clone, Debug, PartialEq)]
pub struct FeedbackRecord {
    pub session_id: String,
    pub rating: u8,
    pub comments: Option<String>,
}

pub struct MockCapabilityProvider {
    orders: HashMap<&'static str, Value>,
    feedback: Mutex<Vec<FeedbackRecord>>,
}

impl Default for MockCapabilityProvider {
    fn default() -> Self {
        let mut orders = HashMap::new();
        orders.insert(
            "ORD1001",
            json!({
                "order_number": "ORD1001",
                "status": "shipped",
                "carrier": "UPS",
                "estimated_delivery": "2026-09-01",
            }),
        );
        orders.insert(
            "ORD1002",
            json!({
                "order_number": "ORD1002",
                "status": "processing",
                "estimated_delivery": "2026-09-05",
            }),
        );
        Self { orders, feedback: Mutex::new(Vec::new()) }
    }
}

impl MockCapabilityProvider {
    /// Feedback rows recorded so far, oldest first.
    pub fn recorded_feedback(&self) -> Vec<FeedbackRecord> {
        match self.feedback.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl CapabilityProvider for MockCapabilityProvider {
    async fn verify_identity(&self, customer_id: &str, credential: &str) -> ActionResult {
        if customer_id.starts_with("CUST") && !credential.trim().is_empty() {
            ActionResult::ok_with(
                "Identity verified successfully",
                json!({
                    "user_info": {
                        "id": customer_id,
                        "name": "Jordan Diaz",
                        "email": "jordan.diaz@example.com",
                        "tier": "standard",
                    }
                }),
            )
        } else {
            ActionResult::fail("Identity verification failed", "unknown customer id")
        }
    }

    async fn query_knowledge_base(&self, query: &str, category: Option<&str>) -> ActionResult {
        let article = match category {
            Some("billing") => "Refunds post within 5-7 business days of approval.",
            Some("shipping") => "Standard shipping takes 3-5 business days.",
            _ => "Visit your account page to manage orders, payments, and settings.",
        };
        ActionResult::ok_with(
            "Found 1 matching article",
            json!({ "query": query, "articles": [article] }),
        )
    }

    async fn fetch_order_status(&self, order_number: &str) -> ActionResult {
        match self.orders.get(order_number) {
            Some(order) => ActionResult::ok_with("Order found", order.clone()),
            None => ActionResult::fail(
                "Order not found",
                format!("no order with number `{order_number}`"),
            ),
        }
    }

    async fn get_user_context(&self, user_id: &str) -> ActionResult {
        // The catalog entries carry the same namespaced ids the execute
        // endpoint accepts, so a caller can feed them straight back in.
        let available_actions = vec![
            Action::new("payment_update_method", "Update payment method", ActionPriority::High),
            Action::new("order_track", "Track your order", ActionPriority::Medium),
            Action::new("order_email_confirmation", "Resend order confirmation", ActionPriority::Low),
        ];
        ActionResult::ok_with(
            "User context loaded",
            json!({
                "id": user_id,
                "open_orders": ["ORD1001"],
                "preferred_contact": "email",
                "pending_actions": ["payment_update_method"],
                "available_actions": available_actions,
            }),
        )
    }

    async fn execute_action(
        &self,
        _user_id: &str,
        action_id: &str,
        _params: Option<Value>,
    ) -> ActionResult {
        if KNOWN_ACTIONS.contains(&action_id) {
            ActionResult::ok_with(
                format!("Action `{action_id}` executed successfully"),
                json!({ "action_id": action_id, "completed_at": Utc::now().to_rfc3339() }),
            )
        } else {
            ActionResult::fail(
                "Action execution failed",
                format!("unknown action id `{action_id}`"),
            )
        }
    }

    async fn log_feedback(
        &self,
        session_id: &str,
        rating: u8,
        comments: Option<&str>,
    ) -> ActionResult {
        let record = FeedbackRecord {
            session_id: session_id.to_owned(),
            rating,
            comments: comments.map(str::to_owned),
        };
        match self.feedback.lock() {
            Ok(mut records) => records.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
        ActionResult::ok("Feedback logged successfully")
    }

    async fn update_shipping_address(&self, order_number: &str, address: &Value) -> ActionResult {
        if self.orders.contains_key(order_number) {
            ActionResult::ok_with(
                "Shipping address updated",
                json!({ "order_number": order_number, "address": address }),
            )
        } else {
            ActionResult::fail(
                "Shipping address update failed",
                format!("no order with number `{order_number}`"),
            )
        }
    }

    async fn request_refund(&self, order_number: &str, reason: &str) -> ActionResult {
        if self.orders.contains_key(order_number) {
            ActionResult::ok_with(
                "Refund requested",
                json!({ "order_number": order_number, "reason": reason, "status": "pending" }),
            )
        } else {
            ActionResult::fail(
                "Refund request failed",
                format!("no order with number `{order_number}`"),
            )
        }
    }

    async fn send_order_email(&self, recipient: &str, order_number: &str) -> ActionResult {
        ActionResult::ok_with(
            "Confirmation email queued",
            json!({ "recipient": recipient, "order_number": order_number }),
        )
    }

    async fn update_account_details(&self, user_id: &str, details: &Value) -> ActionResult {
        ActionResult::ok_with(
            "Account details updated",
            json!({ "user_id": user_id, "updated_fields": details }),
        )
    }

    async fn schedule_callback(&self, user_id: &str, time: &str) -> ActionResult {
        ActionResult::ok_with(
            "Callback scheduled",
            json!({ "user_id": user_id, "scheduled_for": time }),
        )
    }
}

#[cfg(test)]
mod tests {
    use careline_core::{Action, CapabilityProvider};

    use super::MockCapabilityProvider;

    #[tokio::test]
    async fn cust_prefixed_ids_verify_and_carry_user_info() {
        let provider = MockCapabilityProvider::default();
        let result = provider.verify_identity("CUST1234", "credential").await;
        assert!(result.success);
        let name = result
            .data
            .as_ref()
            .and_then(|data| data.pointer("/user_info/name"))
            .and_then(|value| value.as_str());
        assert_eq!(name, Some("Jordan Diaz"));
    }

    #[tokio::test]
    async fn unknown_ids_and_blank_credentials_are_rejected() {
        let provider = MockCapabilityProvider::default();
        assert!(!provider.verify_identity("USER1234", "credential").await.success);
        assert!(!provider.verify_identity("CUST1234", "  ").await.success);
    }

    #[tokio::test]
    async fn user_context_carries_a_namespaced_action_catalog() {
        let provider = MockCapabilityProvider::default();
        let result = provider.get_user_context("CUST1234").await;
        assert!(result.success);

        let actions: Vec<Action> = result
            .data
            .as_ref()
            .and_then(|data| data.get("available_actions"))
            .cloned()
            .map(|value| serde_json::from_value(value).expect("decode actions"))
            .unwrap_or_default();
        assert!(!actions.is_empty());
        // Every offered action is executable as-is.
        for action in &actions {
            assert!(super::KNOWN_ACTIONS.contains(&action.id.as_str()), "{}", action.id);
            assert!(provider.execute_action("CUST1234", &action.id, None).await.success);
        }
    }

    #[tokio::test]
    async fn known_catalog_actions_execute_and_unknown_ones_fail() {
        let provider = MockCapabilityProvider::default();
        assert!(provider.execute_action("CUST1", "order_refund", None).await.success);

        let failed = provider.execute_action("CUST1", "reboot_mainframe", None).await;
        assert!(!failed.success);
        assert!(failed.failure_detail().contains("reboot_mainframe"));
    }

    #[tokio::test]
    async fn feedback_is_recorded_in_order() {
        let provider = MockCapabilityProvider::default();
        provider.log_feedback("conv-1", 3, Some("Escalated to human agent")).await;
        provider.log_feedback("conv-2", 5, None).await;

        let records = provider.recorded_feedback();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].session_id, "conv-1");
        assert_eq!(records[0].rating, 3);
        assert_eq!(records[1].comments, None);
    }

    #[tokio::test]
    async fn missing_orders_fail_without_panicking() {
        let provider = MockCapabilityProvider::default();
        let result = provider.fetch_order_status("ORD9999").await;
        assert!(!result.success);
    }
}
