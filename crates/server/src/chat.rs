//! Conversation endpoints. One POST carries one customer message through a
//! full workflow invocation; the reply, phase, and suggested actions come
//! back in the response body. Saves are compare-and-swap on the stored
//! version, so two racing requests for the same conversation cannot lose
//! turns - the loser gets a 409 and retries.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use careline_core::audit::{AuditContext, TracingAuditSink};
use careline_core::{
    Action, ApplicationError, ConversationId, ConversationState, InterfaceError, Message, Role,
    WorkflowEngine,
};
use careline_db::{ConversationStore, StoreError};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct ChatState {
    store: ConversationStore,
    engine: Arc<WorkflowEngine>,
}

impl ChatState {
    pub fn new(store: ConversationStore, engine: Arc<WorkflowEngine>) -> Self {
        Self { store, engine }
    }
}

pub fn router(state: ChatState) -> Router {
    Router::new()
        .route("/conversations/{id}/messages", post(post_message))
        .route("/conversations/{id}", get(get_conversation).delete(reset_conversation))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub conversation_id: String,
    pub reply: String,
    pub phase: &'static str,
    pub requires_escalation: bool,
    pub suggested_actions: Vec<Action>,
    pub correlation_id: String,
}

#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    pub conversation_id: String,
    pub version: i64,
    pub state: ConversationState,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub correlation_id: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn bad_request(message: &str, correlation_id: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse {
                error: message.to_owned(),
                correlation_id: correlation_id.to_owned(),
            },
        }
    }

    fn not_found(correlation_id: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: ErrorResponse {
                error: "No such conversation.".to_owned(),
                correlation_id: correlation_id.to_owned(),
            },
        }
    }

    fn conflict(message: &str, correlation_id: &str) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            body: ErrorResponse {
                error: message.to_owned(),
                correlation_id: correlation_id.to_owned(),
            },
        }
    }
}

impl From<InterfaceError> for ApiError {
    fn from(value: InterfaceError) -> Self {
        let (status, correlation_id) = match &value {
            InterfaceError::BadRequest { correlation_id, .. } => {
                (StatusCode::BAD_REQUEST, correlation_id.clone())
            }
            InterfaceError::Conflict { correlation_id, .. } => {
                (StatusCode::CONFLICT, correlation_id.clone())
            }
            InterfaceError::ServiceUnavailable { correlation_id, .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, correlation_id.clone())
            }
            InterfaceError::Internal { correlation_id, .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, correlation_id.clone())
            }
        };
        Self {
            status,
            body: ErrorResponse { error: value.user_message().to_owned(), correlation_id },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn store_error(err: StoreError, id: &ConversationId, correlation_id: &str) -> ApiError {
    let application = match err {
        StoreError::VersionConflict(id) => ApplicationError::ConcurrentInvocation(id.to_string()),
        other => {
            error!(
                event_name = "chat.persistence_failure",
                conversation_id = %id,
                correlation_id,
                error = %other,
                "conversation store operation failed"
            );
            ApplicationError::Persistence(other.to_string())
        }
    };
    application.into_interface(correlation_id).into()
}

pub async fn post_message(
    State(state): State<ChatState>,
    Path(id): Path<String>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let id = ConversationId::new(id);

    if request.message.trim().is_empty() {
        return Err(ApiError::bad_request("Message must not be blank.", &correlation_id));
    }

    let loaded = state.store.load(&id).await.map_err(|err| store_error(err, &id, &correlation_id))?;
    let (mut conversation, expected_version) = match loaded {
        Some(versioned) => (versioned.state, Some(versioned.version)),
        None => (ConversationState::default(), None),
    };

    if conversation.is_terminal() {
        return Err(ApiError::conflict(
            "This conversation has ended. Start a new one to continue.",
            &correlation_id,
        ));
    }

    conversation.push_message(Message::user(request.message));
    let transcript_before = conversation.messages.len();

    let sink = TracingAuditSink;
    let context = AuditContext::new(id.clone(), correlation_id.clone(), "careline-server");
    let conversation = state.engine.invoke_with_audit(conversation, &sink, &context).await;

    state
        .store
        .save(&id, &conversation, expected_version)
        .await
        .map_err(|err| store_error(err, &id, &correlation_id))?;

    let appended = &conversation.messages[transcript_before..];
    let reply = appended
        .iter()
        .rev()
        .find(|message| message.role == Role::Assistant)
        .or_else(|| appended.iter().rev().find(|message| message.role == Role::System))
        .map(|message| message.content.clone())
        .unwrap_or_default();
    let suggested_actions = appended
        .iter()
        .rev()
        .find(|message| message.role == Role::Assistant)
        .map(|message| message.suggested_actions.clone())
        .unwrap_or_default();

    info!(
        event_name = "chat.message_processed",
        conversation_id = %id,
        correlation_id,
        phase = conversation.current_phase.as_tag(),
        requires_escalation = conversation.requires_escalation,
        "message processed"
    );

    Ok(Json(MessageResponse {
        conversation_id: id.to_string(),
        reply,
        phase: conversation.current_phase.as_tag(),
        requires_escalation: conversation.requires_escalation,
        suggested_actions,
        correlation_id,
    }))
}

pub async fn get_conversation(
    State(state): State<ChatState>,
    Path(id): Path<String>,
) -> Result<Json<SnapshotResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let id = ConversationId::new(id);

    let loaded = state.store.load(&id).await.map_err(|err| store_error(err, &id, &correlation_id))?;
    match loaded {
        Some(versioned) => Ok(Json(SnapshotResponse {
            conversation_id: id.to_string(),
            version: versioned.version,
            state: versioned.state,
        })),
        None => Err(ApiError::not_found(&correlation_id)),
    }
}

pub async fn reset_conversation(
    State(state): State<ChatState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let id = ConversationId::new(id);

    state.store.reset(&id).await.map_err(|err| store_error(err, &id, &correlation_id))?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use axum::Json;
    use careline_agent::{HeuristicIntentEngine, MockCapabilityProvider};
    use careline_core::{Phase, Role, WorkflowEngine};
    use careline_db::{connect, migrations, ConversationStore};

    use super::{get_conversation, post_message, reset_conversation, ChatState, MessageRequest};

    async fn chat_state() -> ChatState {
        let pool = connect("sqlite::memory:").await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        let engine = WorkflowEngine::new(
            Arc::new(MockCapabilityProvider::default()),
            Arc::new(HeuristicIntentEngine::default()),
            "test-credential".to_owned().into(),
        );
        ChatState::new(ConversationStore::new(pool), Arc::new(engine))
    }

    #[tokio::test]
    async fn posting_a_message_runs_a_full_turn_and_persists() {
        let state = chat_state().await;

        let Json(response) = post_message(
            State(state.clone()),
            Path("conv-1".to_owned()),
            Json(MessageRequest { message: "CUST1234 where is my order tracking".to_owned() }),
        )
        .await
        .expect("turn succeeds");

        assert_eq!(response.phase, "end");
        assert!(!response.reply.is_empty());
        assert!(!response.requires_escalation);

        let Json(snapshot) =
            get_conversation(State(state), Path("conv-1".to_owned())).await.expect("snapshot");
        assert_eq!(snapshot.version, 1);
        assert!(snapshot.state.verified);
        assert_eq!(snapshot.state.current_phase, Phase::End);
    }

    #[tokio::test]
    async fn escalated_turns_return_a_reply_and_record_the_notice() {
        let state = chat_state().await;

        let Json(response) = post_message(
            State(state.clone()),
            Path("conv-esc".to_owned()),
            Json(MessageRequest { message: "ummm".to_owned() }),
        )
        .await
        .expect("turn succeeds");

        assert!(response.requires_escalation);
        assert!(!response.reply.is_empty());

        let Json(snapshot) =
            get_conversation(State(state), Path("conv-esc".to_owned())).await.expect("snapshot");
        let last = snapshot.state.messages.last().expect("transcript");
        assert_eq!(last.role, Role::System);
        assert!(last.content.contains("escalated to a human agent"));
    }

    #[tokio::test]
    async fn blank_messages_are_rejected() {
        let state = chat_state().await;

        let error = post_message(
            State(state),
            Path("conv-1".to_owned()),
            Json(MessageRequest { message: "   ".to_owned() }),
        )
        .await
        .expect_err("blank message is a bad request");

        assert_eq!(error.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn terminal_conversations_reject_further_messages() {
        let state = chat_state().await;

        post_message(
            State(state.clone()),
            Path("conv-1".to_owned()),
            Json(MessageRequest { message: "CUST1234 hello".to_owned() }),
        )
        .await
        .expect("first turn succeeds");

        let error = post_message(
            State(state),
            Path("conv-1".to_owned()),
            Json(MessageRequest { message: "one more thing".to_owned() }),
        )
        .await
        .expect_err("terminal conversation conflicts");

        assert_eq!(error.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn missing_conversation_is_not_found() {
        let state = chat_state().await;

        let error = get_conversation(State(state), Path("conv-missing".to_owned()))
            .await
            .expect_err("missing conversation");
        assert_eq!(error.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn reset_deletes_the_conversation() {
        let state = chat_state().await;

        post_message(
            State(state.clone()),
            Path("conv-1".to_owned()),
            Json(MessageRequest { message: "CUST1234 hello".to_owned() }),
        )
        .await
        .expect("turn succeeds");

        let status = reset_conversation(State(state.clone()), Path("conv-1".to_owned()))
            .await
            .expect("reset succeeds");
        assert_eq!(status, StatusCode::NO_CONTENT);

        let error = get_conversation(State(state), Path("conv-1".to_owned()))
            .await
            .expect_err("conversation is gone");
        assert_eq!(error.status, StatusCode::NOT_FOUND);
    }
}
