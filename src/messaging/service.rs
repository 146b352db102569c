//! Conversation service - chat log and the deal-closure handshake
//!
//! A CLOSE_DEAL_REQUEST confirms the trade for the requester. The other
//! party answers with CLOSE_DEAL_ACCEPTED, which confirms for them and so
//! completes the bartr, or CLOSE_DEAL_REJECTED, which retracts the
//! requester's confirmation. The engine transition runs first; the control
//! message is appended only once it succeeded.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::bartr::{BartrService, BartrStatus};
use crate::error::{DomainError, DomainResult};
use crate::messaging::model::{
    CLOSE_DEAL_ACCEPTED_TEXT, CLOSE_DEAL_REJECTED_TEXT, CLOSE_DEAL_REQUEST_TEXT,
};
use crate::messaging::{Message, MessagePosted, MessageType, MessageWithSender, PostMessageRequest};
use crate::notification::NotificationType;
use crate::store::MarketStore;

const MAX_CONTENT_CHARS: usize = 2000;

pub struct ConversationService {
    store: Arc<dyn MarketStore>,
    bartrs: Arc<BartrService>,
}

impl ConversationService {
    pub fn new(store: Arc<dyn MarketStore>, bartrs: Arc<BartrService>) -> Self {
        Self { store, bartrs }
    }

    /// Post a message; control types run the handshake on the server
    pub async fn post_message(
        &self,
        bartr_id: Uuid,
        sender_id: Uuid,
        request: PostMessageRequest,
    ) -> DomainResult<MessagePosted> {
        let content = Some(request.content);
        match request.message_type {
            MessageType::Text => self.post_text(bartr_id, sender_id, content).await,
            MessageType::CloseDealRequest => {
                self.request_close_deal(bartr_id, sender_id, content).await
            }
            MessageType::CloseDealAccepted => {
                self.respond_to_close_deal(bartr_id, sender_id, true, content)
                    .await
            }
            MessageType::CloseDealRejected => {
                self.respond_to_close_deal(bartr_id, sender_id, false, content)
                    .await
            }
        }
    }

    async fn post_text(
        &self,
        bartr_id: Uuid,
        sender_id: Uuid,
        content: Option<String>,
    ) -> DomainResult<MessagePosted> {
        let content = message_content(content, None)?;
        let (bartr, _) = self.bartrs.party_bartr(bartr_id, sender_id).await?;

        let message = self
            .append(bartr_id, sender_id, content, MessageType::Text)
            .await?;

        self.bartrs
            .notify(
                bartr.counterpart_of(sender_id),
                NotificationType::NewMessage,
                "New Message",
                "You have a new message",
            )
            .await;

        Ok(MessagePosted {
            message,
            bartr: self.bartrs.find(bartr_id).await?,
        })
    }

    /// Ask the other party to close the deal; counts as the caller's
    /// confirmation
    #[tracing::instrument(skip(self, content))]
    pub async fn request_close_deal(
        &self,
        bartr_id: Uuid,
        sender_id: Uuid,
        content: Option<String>,
    ) -> DomainResult<MessagePosted> {
        let content = message_content(content, Some(CLOSE_DEAL_REQUEST_TEXT))?;
        let (bartr, _) = self.bartrs.party_bartr(bartr_id, sender_id).await?;

        if bartr.status != BartrStatus::Accepted {
            return Err(DomainError::InvalidOperation(format!(
                "Cannot close a bartr that is {}",
                bartr.status
            )));
        }

        self.bartrs.confirm(bartr_id, sender_id).await?;
        let message = self
            .append(bartr_id, sender_id, content, MessageType::CloseDealRequest)
            .await?;
        let bartr = self.bartrs.find(bartr_id).await?;

        tracing::info!(bartr_id = %bartr_id, user_id = %sender_id, "Close deal requested");

        self.bartrs
            .notify(
                bartr.counterpart_of(sender_id),
                NotificationType::NewMessage,
                "Deal Closure Requested",
                "The other party wants to finalize the trade",
            )
            .await;

        Ok(MessagePosted { message, bartr })
    }

    /// Answer the other party's open close-deal request
    #[tracing::instrument(skip(self, content))]
    pub async fn respond_to_close_deal(
        &self,
        bartr_id: Uuid,
        responder_id: Uuid,
        accept: bool,
        content: Option<String>,
    ) -> DomainResult<MessagePosted> {
        let (message_type, default_text) = if accept {
            (MessageType::CloseDealAccepted, CLOSE_DEAL_ACCEPTED_TEXT)
        } else {
            (MessageType::CloseDealRejected, CLOSE_DEAL_REJECTED_TEXT)
        };
        let content = message_content(content, Some(default_text))?;
        let (bartr, _) = self.bartrs.party_bartr(bartr_id, responder_id).await?;

        let open_request = self
            .store
            .latest_control_message(bartr_id)
            .await?
            .filter(|m| {
                m.message_type == MessageType::CloseDealRequest && m.sender_id != responder_id
            })
            // A request whose sender has since reset their confirmation is stale
            .filter(|m| {
                bartr
                    .party_of(m.sender_id)
                    .is_some_and(|party| bartr.is_confirmed_by(party))
            });
        let Some(request) = open_request else {
            return Err(DomainError::InvalidOperation(
                "There is no open close-deal request to respond to".to_string(),
            ));
        };

        let status_ok = if accept {
            bartr.status == BartrStatus::Accepted
        } else {
            bartr.status != BartrStatus::Completed
        };
        if !status_ok {
            return Err(DomainError::InvalidOperation(format!(
                "Cannot close a bartr that is {}",
                bartr.status
            )));
        }

        if accept {
            let confirmed = self.bartrs.confirm(bartr_id, responder_id).await?;
            if confirmed.status != BartrStatus::Completed {
                return Err(DomainError::InvalidOperation(
                    "The close-deal request was withdrawn".to_string(),
                ));
            }
        } else {
            self.bartrs.reset_confirmations(bartr_id, responder_id).await?;
        }

        let message = self
            .append(bartr_id, responder_id, content, message_type)
            .await?;
        let bartr = self.bartrs.find(bartr_id).await?;

        tracing::info!(
            bartr_id = %bartr_id,
            user_id = %responder_id,
            accept,
            status = %bartr.status,
            "Close deal answered"
        );

        let (title, text) = if accept {
            ("Deal Confirmed", "The other party confirmed the deal")
        } else {
            ("Deal Still Open", "The other party needs more time")
        };
        self.bartrs
            .notify(request.sender_id, NotificationType::NewMessage, title, text)
            .await;

        Ok(MessagePosted { message, bartr })
    }

    /// Conversation history, oldest first
    pub async fn list_messages(
        &self,
        bartr_id: Uuid,
        requester_id: Uuid,
    ) -> DomainResult<Vec<MessageWithSender>> {
        let (bartr, _) = self.bartrs.party_bartr(bartr_id, requester_id).await?;
        let party_ids = [bartr.initiator_id, bartr.receiver_id];

        let (messages, parties) = tokio::try_join!(
            self.store.find_messages(bartr_id),
            self.store.find_user_summaries(&party_ids),
        )?;

        Ok(MessageWithSender::annotate(messages, &parties))
    }

    async fn append(
        &self,
        bartr_id: Uuid,
        sender_id: Uuid,
        content: String,
        message_type: MessageType,
    ) -> DomainResult<MessageWithSender> {
        let message = Message {
            id: Uuid::new_v4(),
            bartr_id,
            sender_id,
            content,
            message_type,
            created_at: Utc::now(),
        };

        let message = self.store.append_message(message).await?;
        let sender = self
            .store
            .find_user_summaries(&[sender_id])
            .await?
            .into_iter()
            .next();

        Ok(MessageWithSender { message, sender })
    }
}

/// Trimmed content, or `fallback` when none was given
fn message_content(content: Option<String>, fallback: Option<&str>) -> DomainResult<String> {
    let content = content
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .or_else(|| fallback.map(str::to_string))
        .ok_or_else(|| {
            DomainError::InvalidOperation("Message content cannot be empty".to_string())
        })?;

    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(DomainError::InvalidOperation(format!(
            "Message content cannot exceed {} characters",
            MAX_CONTENT_CHARS
        )));
    }
    Ok(content)
}
