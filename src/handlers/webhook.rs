use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::services::{conversation, replies};
use crate::state::AppState;

/// Inbound message from the chat auto-responder channel.
#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub app: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    pub phone: String,
    pub message: String,
    #[serde(default)]
    pub group: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub reply: String,
}

pub async fn chat_webhook(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatMessage>, JsonRejection>,
) -> Result<Json<ChatReply>, AppError> {
    let Json(inbound) = payload.map_err(|e| AppError::InvalidPayload(e.to_string()))?;
    let phone = inbound.phone.trim().to_string();
    let text = inbound.message.trim().to_string();

    // Group chatter never belongs to a booking conversation.
    if inbound.group.as_deref().is_some_and(|g| !g.is_empty()) {
        return Ok(Json(ChatReply {
            reply: String::new(),
        }));
    }

    tracing::info!(phone = %phone, message = %text, "incoming chat message");

    match conversation::process_message(&state, &phone, &text).await {
        Ok(reply) => Ok(Json(ChatReply { reply })),
        Err(e) => {
            tracing::error!(error = %e, phone = %phone, "conversation processing failed");
            Ok(Json(ChatReply {
                reply: replies::generic_failure(),
            }))
        }
    }
}
