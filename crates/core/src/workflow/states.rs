use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::action::Action;
use crate::domain::conversation::{Message, Role};

/// Verification is abandoned once this many attempts have been made without
/// success; the conversation then proceeds unverified (general inquiry only).
pub const MAX_VERIFICATION_ATTEMPTS: u32 = 3;

/// The workflow phases. `Verify` self-loops until its guard passes;
/// `Execute` and `Feedback` both advance unconditionally to `End`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Verify,
    Process,
    Execute,
    Feedback,
    End,
}

impl Phase {
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::Verify => "verify",
            Self::Process => "process",
            Self::Execute => "execute",
            Self::Feedback => "feedback",
            Self::End => "end",
        }
    }

    /// Parse a persisted phase tag. Unknown tags fall back to `Verify` so a
    /// snapshot written by an older or newer build always loads. `init` is
    /// the legacy tag for a conversation that has not verified yet.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "verify" | "init" => Self::Verify,
            "process" => Self::Process,
            "execute" => Self::Execute,
            "feedback" => Self::Feedback,
            "end" => Self::End,
            _ => Self::default(),
        }
    }
}

impl<'de> Deserialize<'de> for Phase {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        Ok(Phase::from_tag(&tag))
    }
}

fn default_confidence() -> f64 {
    1.0
}

/// The mutable record threaded through every workflow invocation.
///
/// Field semantics the engine relies on:
/// - `verification_attempts` only ever increases; `verified` never goes
///   back to false.
/// - `requires_escalation` and `feedback_submitted` are sticky once true.
///   Only a brand-new conversation clears them.
/// - `processed` is turn-scoped: reset at the start of every invocation,
///   set once the current message has been interpreted.
/// - `messages` is append-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationState {
    pub verified: bool,
    pub verification_attempts: u32,
    pub current_phase: Phase,
    pub messages: Vec<Message>,
    pub user_context: BTreeMap<String, Value>,
    #[serde(default = "default_confidence")]
    pub confidence_score: f64,
    pub requires_escalation: bool,
    pub pending_action: Option<Action>,
    pub feedback_submitted: bool,
    pub processed: bool,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self {
            verified: false,
            verification_attempts: 0,
            current_phase: Phase::default(),
            messages: Vec::new(),
            user_context: BTreeMap::new(),
            confidence_score: default_confidence(),
            requires_escalation: false,
            pending_action: None,
            feedback_submitted: false,
            processed: false,
        }
    }
}

impl ConversationState {
    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// The most recent user-authored message, skipping assistant and system
    /// entries appended after it.
    pub fn latest_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|message| message.role == Role::User)
    }

    /// The backend user id captured during verification, if any.
    pub fn user_id(&self) -> Option<&str> {
        self.user_context.get("id").and_then(Value::as_str)
    }

    pub fn is_terminal(&self) -> bool {
        self.current_phase == Phase::End
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::domain::conversation::Message;

    use super::{ConversationState, Phase};

    #[test]
    fn unknown_phase_tag_falls_back_to_verify() {
        let decoded: Phase = serde_json::from_str("\"hibernate\"").expect("decode");
        assert_eq!(decoded, Phase::Verify);
    }

    #[test]
    fn legacy_init_tag_maps_to_verify() {
        let decoded: Phase = serde_json::from_str("\"init\"").expect("decode");
        assert_eq!(decoded, Phase::Verify);
    }

    #[test]
    fn phase_tags_round_trip() {
        for phase in [Phase::Verify, Phase::Process, Phase::Execute, Phase::Feedback, Phase::End] {
            assert_eq!(Phase::from_tag(phase.as_tag()), phase);
            let encoded = serde_json::to_string(&phase).expect("encode");
            let decoded: Phase = serde_json::from_str(&encoded).expect("decode");
            assert_eq!(decoded, phase);
        }
    }

    #[test]
    fn missing_fields_load_to_documented_defaults() {
        let decoded: ConversationState =
            serde_json::from_str(r#"{"verified":true}"#).expect("decode");
        assert!(decoded.verified);
        assert_eq!(decoded.verification_attempts, 0);
        assert_eq!(decoded.current_phase, Phase::Verify);
        assert_eq!(decoded.confidence_score, 1.0);
        assert!(!decoded.requires_escalation);
        assert!(decoded.messages.is_empty());
        assert!(decoded.user_context.is_empty());
        assert!(decoded.pending_action.is_none());
    }

    #[test]
    fn full_snapshot_round_trips() {
        let mut state = ConversationState::default();
        state.verified = true;
        state.verification_attempts = 1;
        state.current_phase = Phase::End;
        state.user_context.insert("id".to_string(), json!("CUST1234"));
        state.confidence_score = 0.5;
        state.requires_escalation = true;
        state.feedback_submitted = true;
        state.push_message(Message::user("CUST1234 where is my order"));
        state.push_message(Message::assistant("Let me check that for you."));

        let encoded = serde_json::to_string(&state).expect("encode");
        let decoded: ConversationState = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded, state);
    }

    #[test]
    fn latest_user_message_skips_trailing_assistant_entries() {
        let mut state = ConversationState::default();
        state.push_message(Message::user("first"));
        state.push_message(Message::user("second"));
        state.push_message(Message::assistant("reply"));
        state.push_message(Message::system("escalation notice"));

        let latest = state.latest_user_message().expect("user message");
        assert_eq!(latest.content, "second");
    }

    #[test]
    fn user_id_reads_from_context() {
        let mut state = ConversationState::default();
        assert_eq!(state.user_id(), None);
        state.user_context.insert("id".to_string(), json!("CUST9000"));
        assert_eq!(state.user_id(), Some("CUST9000"));
    }
}
