//! Bartr (trade proposal) models and data structures

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::listing::ListingSummary;
use crate::messaging::{Message, MessageWithSender};
use crate::models::UserSummary;

/// Bartr model, the aggregate root of the trade workflow
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bartr {
    pub id: Uuid,
    pub initiator_id: Uuid,
    pub receiver_id: Uuid,
    pub listing_id: Uuid,                 // the receiver's listing being requested
    pub offered_listing_id: Option<Uuid>, // absent for donation requests
    pub status: BartrStatus,
    pub message: Option<String>,
    pub initiator_confirmed: bool,
    pub receiver_confirmed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bartr {
    /// Which side of the trade `user_id` is on, if any
    pub fn party_of(&self, user_id: Uuid) -> Option<Party> {
        if user_id == self.initiator_id {
            Some(Party::Initiator)
        } else if user_id == self.receiver_id {
            Some(Party::Receiver)
        } else {
            None
        }
    }

    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.party_of(user_id).is_some()
    }

    /// The other side of the trade, seen from `user_id`
    pub fn counterpart_of(&self, user_id: Uuid) -> Uuid {
        if user_id == self.initiator_id {
            self.receiver_id
        } else {
            self.initiator_id
        }
    }

    pub fn is_confirmed_by(&self, party: Party) -> bool {
        match party {
            Party::Initiator => self.initiator_confirmed,
            Party::Receiver => self.receiver_confirmed,
        }
    }

    pub fn both_confirmed(&self) -> bool {
        self.initiator_confirmed && self.receiver_confirmed
    }

    /// The requested listing, then the offered one if any
    pub fn listing_ids(&self) -> Vec<Uuid> {
        std::iter::once(self.listing_id)
            .chain(self.offered_listing_id)
            .collect()
    }
}

/// Bartr lifecycle status
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "bartr_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum BartrStatus {
    Pending,   // Proposed, awaiting the receiver
    Accepted,  // Receiver agreed; parties confirm completion
    Declined,  // Receiver refused
    Completed, // Both parties confirmed
    Cancelled, // Withdrawn by the initiator while pending
}

impl BartrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BartrStatus::Pending => "PENDING",
            BartrStatus::Accepted => "ACCEPTED",
            BartrStatus::Declined => "DECLINED",
            BartrStatus::Completed => "COMPLETED",
            BartrStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for BartrStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side of a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Initiator,
    Receiver,
}

/// Request DTO for proposing a bartr
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProposeBartrRequest {
    pub listing_id: Uuid,
    pub offered_listing_id: Option<Uuid>,
    #[validate(length(max = 1000))]
    pub message: Option<String>,
}

/// Query parameters for POST /bartrs/:id/complete
#[derive(Debug, Default, Deserialize)]
pub struct CompleteQuery {
    #[serde(default)]
    pub reset: bool,
}

/// Bartr with everything the chat view needs (GET /bartrs/:id)
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BartrDetail {
    #[serde(flatten)]
    pub bartr: Bartr,
    pub listing: Option<ListingSummary>,
    pub offered_listing: Option<ListingSummary>,
    pub initiator: Option<UserSummary>,
    pub receiver: Option<UserSummary>,
    pub messages: Vec<MessageWithSender>,
}

/// Conversation-list entry (GET /bartrs)
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BartrOverview {
    #[serde(flatten)]
    pub bartr: Bartr,
    pub listing: Option<ListingSummary>,
    pub initiator: Option<UserSummary>,
    pub receiver: Option<UserSummary>,
    pub latest_message: Option<Message>,
}

/// Result of an accept: the accepted bartr plus the proposals it displaced
#[derive(Debug, Clone)]
pub struct AcceptOutcome {
    pub bartr: Bartr,
    pub auto_declined: Vec<Bartr>,
}

/// Bartr change pushed to live subscribers after every mutation
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BartrEvent {
    pub kind: BartrEventKind,
    pub bartr_id: Uuid,
    pub initiator_id: Uuid,
    pub receiver_id: Uuid,
    pub status: BartrStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BartrEventKind {
    Proposed,
    Accepted,
    Declined,
    Cancelled,
    ConfirmationChanged,
    Completed,
    MessagePosted,
}

impl BartrEvent {
    pub fn new(kind: BartrEventKind, bartr: &Bartr) -> Self {
        Self {
            kind,
            bartr_id: bartr.id,
            initiator_id: bartr.initiator_id,
            receiver_id: bartr.receiver_id,
            status: bartr.status,
            updated_at: bartr.updated_at,
        }
    }

    /// Event describing the bartr's current state after a confirm/reset
    pub fn after_confirmation(bartr: &Bartr) -> Self {
        let kind = if bartr.status == BartrStatus::Completed {
            BartrEventKind::Completed
        } else {
            BartrEventKind::ConfirmationChanged
        };
        Self::new(kind, bartr)
    }

    pub fn concerns(&self, user_id: Uuid) -> bool {
        self.initiator_id == user_id || self.receiver_id == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Bartr {
        let now = Utc::now();
        Bartr {
            id: Uuid::new_v4(),
            initiator_id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
            listing_id: Uuid::new_v4(),
            offered_listing_id: None,
            status: BartrStatus::Accepted,
            message: None,
            initiator_confirmed: true,
            receiver_confirmed: false,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_party_lookup() {
        let bartr = sample();
        assert_eq!(bartr.party_of(bartr.initiator_id), Some(Party::Initiator));
        assert_eq!(bartr.party_of(bartr.receiver_id), Some(Party::Receiver));
        assert_eq!(bartr.party_of(Uuid::new_v4()), None);
        assert_eq!(bartr.counterpart_of(bartr.initiator_id), bartr.receiver_id);
        assert_eq!(bartr.counterpart_of(bartr.receiver_id), bartr.initiator_id);
    }

    #[test]
    fn test_confirmation_flags() {
        let mut bartr = sample();
        assert!(bartr.is_confirmed_by(Party::Initiator));
        assert!(!bartr.is_confirmed_by(Party::Receiver));
        assert!(!bartr.both_confirmed());
        bartr.receiver_confirmed = true;
        assert!(bartr.both_confirmed());
    }

    #[test]
    fn test_listing_ids_include_offered_listing() {
        let mut bartr = sample();
        assert_eq!(bartr.listing_ids(), vec![bartr.listing_id]);
        let offered = Uuid::new_v4();
        bartr.offered_listing_id = Some(offered);
        assert_eq!(bartr.listing_ids(), vec![bartr.listing_id, offered]);
    }

    #[test]
    fn test_event_kind_follows_status() {
        let mut bartr = sample();
        assert_eq!(
            BartrEvent::after_confirmation(&bartr).kind,
            BartrEventKind::ConfirmationChanged
        );
        bartr.status = BartrStatus::Completed;
        assert_eq!(
            BartrEvent::after_confirmation(&bartr).kind,
            BartrEventKind::Completed
        );
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["status"], "ACCEPTED");
        assert_eq!(json["initiatorConfirmed"], true);
        assert!(json["completedAt"].is_null());

        let event = serde_json::to_value(BartrEvent::new(
            BartrEventKind::MessagePosted,
            &sample(),
        ))
        .unwrap();
        assert_eq!(event["kind"], "MESSAGE_POSTED");
    }

    #[test]
    fn test_complete_query_defaults_to_confirm() {
        let query: CompleteQuery = serde_json::from_str("{}").unwrap();
        assert!(!query.reset);
    }
}
