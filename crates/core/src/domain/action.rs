use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Priority bands for backend actions. Variant order doubles as ranking
/// order, so `sort_by_key` puts high-priority actions first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionPriority {
    High,
    #[default]
    Medium,
    Low,
}

/// An executable backend action offered to the customer. Ids are namespaced
/// by domain prefix (`order_`, `account_`, `payment_`), which is the only
/// property the ranking policy relies on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub priority: ActionPriority,
}

impl Action {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        priority: ActionPriority,
    ) -> Self {
        Self { id: id.into(), title: title.into(), priority }
    }

    /// The domain prefix of the action id, e.g. `order` for `order_refund`.
    pub fn domain_prefix(&self) -> Option<&str> {
        self.id.split_once('_').map(|(prefix, _)| prefix)
    }
}

/// Uniform outcome wrapper for every capability call. A failed call is a
/// recoverable condition carried in-band (`success == false`), never an
/// unhandled fault raised into the state machine.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into(), data: None, error: None }
    }

    pub fn ok_with(message: impl Into<String>, data: Value) -> Self {
        Self { success: true, message: message.into(), data: Some(data), error: None }
    }

    pub fn fail(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self { success: false, message: message.into(), data: None, error: Some(error.into()) }
    }

    /// The most specific failure detail available for logs and audit rows.
    pub fn failure_detail(&self) -> &str {
        self.error.as_deref().unwrap_or(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::{Action, ActionPriority, ActionResult};

    #[test]
    fn action_exposes_domain_prefix() {
        let action = Action::new("order_refund", "Request refund", ActionPriority::High);
        assert_eq!(action.domain_prefix(), Some("order"));

        let unprefixed = Action::new("escalate", "Escalate", ActionPriority::Low);
        assert_eq!(unprefixed.domain_prefix(), None);
    }

    #[test]
    fn priority_ordering_ranks_high_first() {
        let mut priorities = vec![ActionPriority::Low, ActionPriority::High, ActionPriority::Medium];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![ActionPriority::High, ActionPriority::Medium, ActionPriority::Low]
        );
    }

    #[test]
    fn failure_detail_prefers_error_over_message() {
        let failed = ActionResult::fail("verification failed", "invalid credentials");
        assert_eq!(failed.failure_detail(), "invalid credentials");

        let bare = ActionResult { success: false, ..ActionResult::ok("no detail") };
        assert_eq!(bare.failure_detail(), "no detail");
    }

    #[test]
    fn serialization_omits_empty_optionals() {
        let encoded = serde_json::to_string(&ActionResult::ok("done")).expect("encode");
        assert!(!encoded.contains("data"));
        assert!(!encoded.contains("error"));
    }
}
