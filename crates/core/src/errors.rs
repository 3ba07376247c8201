use thiserror::Error;

/// Recoverable fault classes absorbed inside a workflow invocation. Every
/// one of these maps to an in-state fallback (escalate, or log and
/// continue); none propagates out of `WorkflowEngine::invoke`. They exist
/// so logs and audit rows can name what degraded a turn.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowFault {
    #[error("identity verification rejected (attempt {attempts} of {limit})")]
    Verification { attempts: u32, limit: u32 },
    #[error("intent engine failure: {0}")]
    IntentEngine(String),
    #[error("action `{action_id}` failed to execute: {detail}")]
    ActionExecution { action_id: String, detail: String },
    #[error("feedback logging failed: {0}")]
    FeedbackLogging(String),
}

impl WorkflowFault {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Verification { .. } => "verification",
            Self::IntentEngine(_) => "intent_engine",
            Self::ActionExecution { .. } => "action_execution",
            Self::FeedbackLogging(_) => "feedback_logging",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
    #[error("conversation `{0}` is being updated by a concurrent invocation")]
    ConcurrentInvocation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Conflict { .. } => {
                "This conversation was updated by another request. Please retry."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::ConcurrentInvocation(id) => Self::Conflict {
                message: format!("conversation `{id}` has a newer snapshot"),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Persistence(message) | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ApplicationError, InterfaceError, WorkflowFault};

    #[test]
    fn fault_kinds_are_stable_labels() {
        let faults = [
            WorkflowFault::Verification { attempts: 1, limit: 3 },
            WorkflowFault::IntentEngine("timeout".to_owned()),
            WorkflowFault::ActionExecution {
                action_id: "order_refund".to_owned(),
                detail: "backend rejected".to_owned(),
            },
            WorkflowFault::FeedbackLogging("unavailable".to_owned()),
        ];
        let kinds: Vec<_> = faults.iter().map(WorkflowFault::kind).collect();
        assert_eq!(kinds, ["verification", "intent_engine", "action_execution", "feedback_logging"]);
    }

    #[test]
    fn concurrent_invocation_maps_to_conflict() {
        let interface =
            ApplicationError::ConcurrentInvocation("conv-7".to_owned()).into_interface("req-1");
        assert!(matches!(
            interface,
            InterfaceError::Conflict { ref correlation_id, .. } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "This conversation was updated by another request. Please retry."
        );
    }

    #[test]
    fn persistence_error_maps_to_service_unavailable() {
        let interface =
            ApplicationError::Persistence("database lock timeout".to_owned()).into_interface("req-2");
        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface =
            ApplicationError::Configuration("missing provider url".to_owned()).into_interface("req-3");
        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
