use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::action::Action;

/// Caller-assigned identifier for one conversation. The engine itself never
/// mints these; the storage layer keys snapshots by it and the feedback
/// operation reports against it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One transcript entry. Assistant messages may carry the ranked actions
/// that were offered alongside the reply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_actions: Vec<Action>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), suggested_actions: Vec::new() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into(), suggested_actions: Vec::new() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into(), suggested_actions: Vec::new() }
    }

    pub fn with_actions(mut self, actions: Vec<Action>) -> Self {
        self.suggested_actions = actions;
        self
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::action::{Action, ActionPriority};

    use super::{Message, Role};

    #[test]
    fn constructors_assign_roles() {
        assert_eq!(Message::user("hi").role, Role::User);
        assert_eq!(Message::assistant("hello").role, Role::Assistant);
        assert_eq!(Message::system("note").role, Role::System);
    }

    #[test]
    fn empty_suggested_actions_are_not_serialized() {
        let plain = serde_json::to_string(&Message::user("hi")).expect("encode");
        assert!(!plain.contains("suggested_actions"));

        let with_actions = Message::assistant("here you go").with_actions(vec![Action::new(
            "order_track",
            "Track order",
            ActionPriority::Medium,
        )]);
        let encoded = serde_json::to_string(&with_actions).expect("encode");
        assert!(encoded.contains("order_track"));
    }

    #[test]
    fn legacy_message_without_actions_field_still_loads() {
        let decoded: Message =
            serde_json::from_str(r#"{"role":"user","content":"hello"}"#).expect("decode");
        assert!(decoded.suggested_actions.is_empty());
    }
}
