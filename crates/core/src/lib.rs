//! Core workflow engine for the careline customer-service assistant.
//!
//! The crate owns the conversation state machine
//! (`Verify -> Process -> {Execute | Feedback | End}`), the conversation
//! data model it threads through every turn, and the boundary traits the
//! machine drives:
//!
//! - `CapabilityProvider` - identity, order, account, and feedback
//!   operations on the support backend, each yielding a uniform
//!   `ActionResult`.
//! - `IntentEngine` - the natural-language boundary that turns a message
//!   plus context into a reply, a confidence score, and suggested actions.
//!
//! # Safety Principle
//!
//! The intent engine is strictly an interpreter. Whether an action
//! executes, whether a conversation escalates, and when a conversation
//! terminates are decisions the state machine makes from its own guards.
//! Any boundary failure degrades toward human escalation, never toward a
//! silently dropped message.

pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod intent;
pub mod provider;
pub mod workflow;

pub use domain::action::{Action, ActionPriority, ActionResult};
pub use domain::conversation::{ConversationId, Message, Role};
pub use errors::{ApplicationError, InterfaceError, WorkflowFault};
pub use intent::{EngineResponse, IntentEngine, IntentEngineError, ResponseRequest};
pub use provider::CapabilityProvider;
pub use workflow::engine::WorkflowEngine;
pub use workflow::states::{ConversationState, Phase};
