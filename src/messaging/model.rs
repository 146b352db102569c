//! Conversation log models

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::bartr::Bartr;
use crate::models::UserSummary;

/// Chat message scoped to a bartr
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub bartr_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub message_type: MessageType,
    pub created_at: DateTime<Utc>,
}

/// Message kinds; the CLOSE_DEAL_* kinds carry the deal-closure handshake
#[derive(Debug, Default, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "message_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    #[default]
    Text,
    CloseDealRequest,
    CloseDealAccepted,
    CloseDealRejected,
}

impl MessageType {
    pub fn is_control(&self) -> bool {
        !matches!(self, MessageType::Text)
    }
}

/// Message annotated with its sender's identity
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageWithSender {
    #[serde(flatten)]
    pub message: Message,
    pub sender: Option<UserSummary>,
}

impl MessageWithSender {
    /// Annotate messages with whichever of `senders` wrote them
    pub fn annotate(messages: Vec<Message>, senders: &[UserSummary]) -> Vec<Self> {
        messages
            .into_iter()
            .map(|message| {
                let sender = senders.iter().find(|u| u.id == message.sender_id).cloned();
                Self { message, sender }
            })
            .collect()
    }
}

/// Request DTO for POST /bartrs/:id/messages
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageRequest {
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
}

/// Request DTO for POST /bartrs/:id/close-deal
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CloseDealResponseRequest {
    pub accept: bool,
    #[validate(length(min = 1, max = 2000))]
    pub content: Option<String>,
}

/// A posted message together with the bartr state it left behind
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MessagePosted {
    pub message: MessageWithSender,
    pub bartr: Bartr,
}

pub(crate) const CLOSE_DEAL_REQUEST_TEXT: &str =
    "I'd like to finalize this trade. Please confirm to complete the deal.";
pub(crate) const CLOSE_DEAL_ACCEPTED_TEXT: &str = "Trade confirmed! Deal is complete.";
pub(crate) const CLOSE_DEAL_REJECTED_TEXT: &str =
    "I need more time. Let's continue chatting.";
