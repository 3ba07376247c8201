use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::conversation::Message;
use crate::errors::WorkflowFault;
use crate::intent::{IntentEngine, ResponseRequest};
use crate::provider::CapabilityProvider;
use crate::workflow::states::{ConversationState, Phase, MAX_VERIFICATION_ATTEMPTS};

/// Confidence below this routes the conversation toward human escalation.
pub const DEFAULT_ESCALATION_THRESHOLD: f64 = 0.7;

const ESCALATION_FEEDBACK_RATING: u8 = 3;
const ESCALATION_FEEDBACK_COMMENT: &str = "Escalated to human agent";
const UNATTRIBUTED_SESSION: &str = "unattributed";
const ESCALATION_NOTICE: &str = "This conversation will be escalated to a human agent.";
const INTERPRETATION_FALLBACK_REPLY: &str =
    "I'm sorry, I couldn't process that request. Let me bring in a human agent to help.";

/// The conversation state machine. One call to [`invoke`] processes exactly
/// one pending user message: it runs phase by phase, with no suspension
/// between phases, until it reaches a quiescent point (a phase that needs
/// external input, or `End`).
///
/// `invoke` is infallible by design. Every boundary failure is absorbed
/// into the state per the documented fallback - escalation for
/// interpretation and execution faults, log-and-continue for feedback - so
/// a turn always yields a well-formed successor state. The turn that first
/// raises escalation appends a system notice so the customer sees the
/// handoff.
///
/// The verification credential is supplied by the caller from a secure
/// input channel; the engine never fabricates one.
///
/// [`invoke`]: WorkflowEngine::invoke
pub struct WorkflowEngine {
    provider: Arc<dyn CapabilityProvider>,
    intent_engine: Arc<dyn IntentEngine>,
    credential: SecretString,
    escalation_threshold: f64,
}

impl WorkflowEngine {
    pub fn new(
        provider: Arc<dyn CapabilityProvider>,
        intent_engine: Arc<dyn IntentEngine>,
        credential: SecretString,
    ) -> Self {
        Self {
            provider,
            intent_engine,
            credential,
            escalation_threshold: DEFAULT_ESCALATION_THRESHOLD,
        }
    }

    pub fn with_escalation_threshold(mut self, threshold: f64) -> Self {
        self.escalation_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Run the state machine to quiescence for one inbound message.
    pub async fn invoke(&self, state: ConversationState) -> ConversationState {
        self.run(state, None).await
    }

    /// Same as [`invoke`], additionally emitting one audit event per phase
    /// executed.
    ///
    /// [`invoke`]: WorkflowEngine::invoke
    pub async fn invoke_with_audit(
        &self,
        state: ConversationState,
        sink: &dyn AuditSink,
        audit: &AuditContext,
    ) -> ConversationState {
        self.run(state, Some((sink, audit))).await
    }

    async fn run(
        &self,
        mut state: ConversationState,
        audit: Option<(&dyn AuditSink, &AuditContext)>,
    ) -> ConversationState {
        // A fresh message has arrived; the reprocess guard is scoped to
        // this single pass.
        state.processed = false;
        let escalated_on_entry = state.requires_escalation;

        let session_id = audit
            .map(|(_, context)| context.conversation_id.as_str().to_owned())
            .unwrap_or_else(|| UNATTRIBUTED_SESSION.to_owned());

        loop {
            let phase = state.current_phase;
            let fault = self.run_phase(phase, &mut state, &session_id).await;
            let next = transition(phase, &state);

            if let Some(fault) = &fault {
                warn!(
                    event_name = "workflow.phase.fault",
                    phase = phase.as_tag(),
                    fault_kind = fault.kind(),
                    detail = %fault,
                    "phase fault absorbed, continuing per fallback"
                );
            }
            debug!(
                event_name = "workflow.phase.completed",
                from = phase.as_tag(),
                to = next.as_tag(),
                "phase executed"
            );
            if let Some((sink, context)) = audit {
                emit_phase_event(sink, context, phase, next, fault.as_ref());
            }

            if phase == Phase::End {
                break;
            }
            state.current_phase = next;
        }

        // The customer is told once, on the turn that first raised the
        // flag, whichever phase raised it.
        if state.requires_escalation && !escalated_on_entry {
            state.push_message(Message::system(ESCALATION_NOTICE));
        }

        state
    }

    async fn run_phase(
        &self,
        phase: Phase,
        state: &mut ConversationState,
        session_id: &str,
    ) -> Option<WorkflowFault> {
        match phase {
            Phase::Verify => self.verify(state).await,
            Phase::Process => self.process(state).await,
            Phase::Execute => self.execute(state).await,
            Phase::Feedback => self.feedback(state, session_id).await,
            Phase::End => {
                // Prepare for the next invocation; everything else in the
                // state survives termination untouched.
                state.processed = false;
                None
            }
        }
    }

    async fn verify(&self, state: &mut ConversationState) -> Option<WorkflowFault> {
        if state.verified || state.verification_attempts >= MAX_VERIFICATION_ATTEMPTS {
            return None;
        }

        let mut fault = None;
        let token = state
            .latest_user_message()
            .and_then(|message| customer_id_token(&message.content));

        if let Some(customer_id) = token {
            let result = self
                .provider
                .verify_identity(&customer_id, self.credential.expose_secret())
                .await;
            if result.success {
                state.verified = true;
                if let Some(user_info) = result
                    .data
                    .as_ref()
                    .and_then(|data| data.get("user_info"))
                    .and_then(Value::as_object)
                {
                    state.user_context =
                        user_info.iter().map(|(key, value)| (key.clone(), value.clone())).collect();
                }
                info!(
                    event_name = "workflow.verify.succeeded",
                    attempts = state.verification_attempts + 1,
                    "identity verified"
                );
            } else {
                fault = Some(WorkflowFault::Verification {
                    attempts: state.verification_attempts + 1,
                    limit: MAX_VERIFICATION_ATTEMPTS,
                });
            }
        }

        // Attempts advance on every unverified pass, credential token or
        // not; this is what bounds the Verify self-loop.
        state.verification_attempts += 1;
        fault
    }

    async fn process(&self, state: &mut ConversationState) -> Option<WorkflowFault> {
        if state.processed {
            return None;
        }
        let Some(message) = state.latest_user_message().cloned() else {
            state.processed = true;
            return None;
        };

        let request = ResponseRequest {
            message: &message.content,
            history: &state.messages,
            user_context: &state.user_context,
            available_actions: &[],
        };
        let outcome = self.intent_engine.generate_response(request).await;

        let fault = match outcome {
            Ok(response) => {
                state.confidence_score = response.confidence.clamp(0.0, 1.0);
                if state.confidence_score < self.escalation_threshold {
                    // Sticky: set here, never cleared by the engine.
                    state.requires_escalation = true;
                }
                state.pending_action = response.suggested_actions.first().cloned();
                state.push_message(
                    Message::assistant(response.text).with_actions(response.suggested_actions),
                );
                None
            }
            Err(error) => {
                // Fail safe toward human handoff, never toward silent drop;
                // the customer still gets a reply.
                state.requires_escalation = true;
                state.pending_action = None;
                state.push_message(Message::assistant(INTERPRETATION_FALLBACK_REPLY));
                Some(WorkflowFault::IntentEngine(error.to_string()))
            }
        };

        // Unconditional: the same message is never interpreted twice within
        // one invocation.
        state.processed = true;
        fault
    }

    async fn execute(&self, state: &mut ConversationState) -> Option<WorkflowFault> {
        let Some(action) = state.pending_action.clone() else {
            return None;
        };

        let user_id = state.user_id().unwrap_or_default().to_owned();
        let result = self.provider.execute_action(&user_id, &action.id, None).await;
        // Execute-then-clear: the attempt fully resolves before the slot is
        // emptied, so the slot is never observed stale.
        state.pending_action = None;

        if result.success {
            state.push_message(Message::system(format!("Action executed: {}", action.title)));
            None
        } else {
            state.requires_escalation = true;
            state.push_message(Message::system(format!(
                "Action could not be completed: {}",
                action.title
            )));
            Some(WorkflowFault::ActionExecution {
                action_id: action.id,
                detail: result.failure_detail().to_owned(),
            })
        }
    }

    async fn feedback(
        &self,
        state: &mut ConversationState,
        session_id: &str,
    ) -> Option<WorkflowFault> {
        if state.feedback_submitted || !state.requires_escalation {
            return None;
        }

        let result = self
            .provider
            .log_feedback(
                session_id,
                ESCALATION_FEEDBACK_RATING,
                Some(ESCALATION_FEEDBACK_COMMENT),
            )
            .await;
        // Sticky regardless of outcome; a failed logging call is never
        // allowed to block reaching End.
        state.feedback_submitted = true;

        if result.success {
            None
        } else {
            Some(WorkflowFault::FeedbackLogging(result.failure_detail().to_owned()))
        }
    }
}

/// The transition table from the design: guards read the state the phase
/// just produced.
fn transition(current: Phase, state: &ConversationState) -> Phase {
    match current {
        Phase::Verify => {
            if state.verified || state.verification_attempts >= MAX_VERIFICATION_ATTEMPTS {
                Phase::Process
            } else {
                Phase::Verify
            }
        }
        Phase::Process => {
            if state.pending_action.is_some() {
                Phase::Execute
            } else if state.requires_escalation && !state.feedback_submitted {
                Phase::Feedback
            } else {
                Phase::End
            }
        }
        Phase::Execute | Phase::Feedback | Phase::End => Phase::End,
    }
}

/// Extract a customer-id-shaped token (`CUST` followed by alphanumerics)
/// from a message. Only the token is sent to verification, never the whole
/// message.
fn customer_id_token(content: &str) -> Option<String> {
    content
        .split_whitespace()
        .map(|word| word.trim_matches(|ch: char| !ch.is_ascii_alphanumeric()))
        .find(|word| {
            word.len() > 4
                && word.starts_with("CUST")
                && word[4..].chars().all(|ch| ch.is_ascii_alphanumeric())
        })
        .map(str::to_owned)
}

fn emit_phase_event(
    sink: &dyn AuditSink,
    context: &AuditContext,
    from: Phase,
    to: Phase,
    fault: Option<&WorkflowFault>,
) {
    let category = match from {
        Phase::Verify => AuditCategory::Verification,
        Phase::Process => AuditCategory::Processing,
        Phase::Execute => AuditCategory::Execution,
        Phase::Feedback => AuditCategory::Feedback,
        Phase::End => AuditCategory::System,
    };
    let outcome = if fault.is_some() { AuditOutcome::Recovered } else { AuditOutcome::Success };

    let mut event = AuditEvent::new(
        context,
        format!("workflow.phase.{}", from.as_tag()),
        category,
        outcome,
    )
    .with_metadata("from", from.as_tag())
    .with_metadata("to", to.as_tag());
    if let Some(fault) = fault {
        event = event.with_metadata("fault", fault.kind());
    }
    sink.emit(event);
}
