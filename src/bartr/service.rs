//! Bartr service layer - the trade lifecycle state machine
//!
//! ```text
//! PENDING --accept--> ACCEPTED --confirm x2--> COMPLETED
//!    |  \--decline--> DECLINED
//!    \----cancel----> CANCELLED
//! ```
//!
//! Every transition is a conditional update in the store, so a request that
//! raced another one sees `None` instead of overwriting it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::try_join_all;
use uuid::Uuid;

use crate::bartr::{
    AcceptOutcome, Bartr, BartrDetail, BartrOverview, BartrStatus, Party, ProposeBartrRequest,
};
use crate::error::{DomainError, DomainResult};
use crate::listing::{Listing, ListingStatus, ListingSummary};
use crate::messaging::MessageWithSender;
use crate::notification::{deliver, NewNotification, NotificationSink, NotificationType};
use crate::store::MarketStore;

/// Trade lifecycle engine
pub struct BartrService {
    store: Arc<dyn MarketStore>,
    notifier: Arc<dyn NotificationSink>,
    auto_decline_competing: bool,
}

impl BartrService {
    pub fn new(store: Arc<dyn MarketStore>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self {
            store,
            notifier,
            auto_decline_competing: true,
        }
    }

    /// Whether accepting one proposal declines the other pending ones that
    /// request or offer either of its listings
    pub fn with_auto_decline(mut self, enabled: bool) -> Self {
        self.auto_decline_competing = enabled;
        self
    }

    /// Propose a trade for someone else's listing
    #[tracing::instrument(skip(self, request), fields(listing_id = %request.listing_id))]
    pub async fn propose(
        &self,
        initiator_id: Uuid,
        request: ProposeBartrRequest,
    ) -> DomainResult<Bartr> {
        let listing = self
            .store
            .find_listing(request.listing_id)
            .await?
            .ok_or_else(|| DomainError::NotFound("Listing".to_string()))?;

        if listing.user_id == initiator_id {
            return Err(DomainError::InvalidOperation(
                "You cannot trade with yourself".to_string(),
            ));
        }
        if listing.status != ListingStatus::Active {
            return Err(DomainError::InvalidOperation(
                "Listing is not available for trade".to_string(),
            ));
        }

        if let Some(offered_id) = request.offered_listing_id {
            let offered = self
                .store
                .find_listing(offered_id)
                .await?
                .ok_or_else(|| DomainError::NotFound("Offered listing".to_string()))?;

            if offered.user_id != initiator_id {
                return Err(DomainError::InvalidOperation(
                    "You can only offer your own listings".to_string(),
                ));
            }
            if offered.status != ListingStatus::Active {
                return Err(DomainError::InvalidOperation(
                    "Offered listing is not available for trade".to_string(),
                ));
            }
        }

        let now = Utc::now();
        let bartr = Bartr {
            id: Uuid::new_v4(),
            initiator_id,
            receiver_id: listing.user_id,
            listing_id: listing.id,
            offered_listing_id: request.offered_listing_id,
            status: BartrStatus::Pending,
            message: request
                .message
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty()),
            initiator_confirmed: false,
            receiver_confirmed: false,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };

        let bartr = self.store.insert_bartr(bartr).await?;

        tracing::info!(
            bartr_id = %bartr.id,
            user_id = %initiator_id,
            receiver_id = %bartr.receiver_id,
            "Bartr proposed"
        );

        self.notify(
            bartr.receiver_id,
            NotificationType::BartrRequest,
            "New Bartr Request",
            format!("Someone wants to trade for your {}", listing.title),
        )
        .await;

        Ok(bartr)
    }

    /// Bartrs the user is a party to, newest first, for the conversation list
    pub async fn list_for_user(&self, user_id: Uuid) -> DomainResult<Vec<BartrOverview>> {
        let bartrs = self.store.find_bartrs_for_user(user_id).await?;
        if bartrs.is_empty() {
            return Ok(Vec::new());
        }

        let mut listing_ids: Vec<Uuid> = bartrs.iter().map(|b| b.listing_id).collect();
        listing_ids.sort_unstable();
        listing_ids.dedup();

        let mut user_ids: Vec<Uuid> = bartrs
            .iter()
            .flat_map(|b| [b.initiator_id, b.receiver_id])
            .collect();
        user_ids.sort_unstable();
        user_ids.dedup();

        let store = &self.store;
        let (listings, users, latest) = tokio::try_join!(
            try_join_all(listing_ids.iter().map(|id| store.find_listing(*id))),
            store.find_user_summaries(&user_ids),
            try_join_all(bartrs.iter().map(|b| store.latest_message(b.id))),
        )?;

        let listings: HashMap<Uuid, ListingSummary> = listings
            .iter()
            .flatten()
            .map(|listing| (listing.id, ListingSummary::from(listing)))
            .collect();
        let users: HashMap<Uuid, _> = users.into_iter().map(|u| (u.id, u)).collect();

        Ok(bartrs
            .into_iter()
            .zip(latest)
            .map(|(bartr, latest_message)| BartrOverview {
                listing: listings.get(&bartr.listing_id).cloned(),
                initiator: users.get(&bartr.initiator_id).cloned(),
                receiver: users.get(&bartr.receiver_id).cloned(),
                latest_message,
                bartr,
            })
            .collect())
    }

    /// Full trade view for one of its parties
    pub async fn get_detail(&self, id: Uuid, requester_id: Uuid) -> DomainResult<BartrDetail> {
        let (bartr, _) = self.party_bartr(id, requester_id).await?;
        self.detail_of(bartr).await
    }

    /// Assemble listing, parties and messages; the reads are independent
    pub(crate) async fn detail_of(&self, bartr: Bartr) -> DomainResult<BartrDetail> {
        let store = &self.store;
        let party_ids = [bartr.initiator_id, bartr.receiver_id];
        let offered = async {
            match bartr.offered_listing_id {
                Some(id) => store.find_listing(id).await,
                None => Ok(None),
            }
        };

        let (listing, offered_listing, parties, messages) = tokio::try_join!(
            store.find_listing(bartr.listing_id),
            offered,
            store.find_user_summaries(&party_ids),
            store.find_messages(bartr.id),
        )?;

        let summary = |listing: Option<Listing>| listing.as_ref().map(ListingSummary::from);
        let party = |id: Uuid| parties.iter().find(|u| u.id == id).cloned();

        Ok(BartrDetail {
            listing: summary(listing),
            offered_listing: summary(offered_listing),
            initiator: party(bartr.initiator_id),
            receiver: party(bartr.receiver_id),
            messages: MessageWithSender::annotate(messages, &parties),
            bartr,
        })
    }

    /// Receiver accepts a pending proposal
    #[tracing::instrument(skip(self))]
    pub async fn accept(&self, id: Uuid, caller_id: Uuid) -> DomainResult<AcceptOutcome> {
        let bartr = self.pending_for_receiver(id, caller_id, "accept").await?;

        let traded_ids = bartr.listing_ids();
        for listing_id in &traded_ids {
            let available = self
                .store
                .find_listing(*listing_id)
                .await?
                .map(|listing| listing.status == ListingStatus::Active)
                .unwrap_or(false);
            if !available {
                return Err(listing_unavailable());
            }
        }

        let bartr = self
            .transition(id, BartrStatus::Pending, BartrStatus::Accepted)
            .await?;

        let auto_declined = if self.auto_decline_competing {
            self.store.decline_competing(&traded_ids, bartr.id).await?
        } else {
            Vec::new()
        };

        tracing::info!(
            bartr_id = %bartr.id,
            user_id = %caller_id,
            auto_declined = auto_declined.len(),
            "Bartr accepted"
        );

        self.notify(
            bartr.initiator_id,
            NotificationType::BartrAccepted,
            "Bartr Accepted",
            "Your bartr request was accepted!",
        )
        .await;

        for declined in &auto_declined {
            self.notify(
                declined.initiator_id,
                NotificationType::BartrDeclined,
                "Bartr Declined",
                "Your bartr request was declined because another offer was accepted",
            )
            .await;
        }

        Ok(AcceptOutcome {
            bartr,
            auto_declined,
        })
    }

    /// Receiver turns a pending proposal down
    #[tracing::instrument(skip(self))]
    pub async fn decline(&self, id: Uuid, caller_id: Uuid) -> DomainResult<Bartr> {
        self.pending_for_receiver(id, caller_id, "decline").await?;

        let bartr = self
            .transition(id, BartrStatus::Pending, BartrStatus::Declined)
            .await?;

        tracing::info!(bartr_id = %bartr.id, user_id = %caller_id, "Bartr declined");

        self.notify(
            bartr.initiator_id,
            NotificationType::BartrDeclined,
            "Bartr Declined",
            "Your bartr request was declined",
        )
        .await;

        Ok(bartr)
    }

    /// Initiator withdraws a proposal that has not been answered yet
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, id: Uuid, caller_id: Uuid) -> DomainResult<Bartr> {
        let bartr = self.find(id).await?;

        if bartr.initiator_id != caller_id {
            return Err(DomainError::PermissionDenied(
                "Only the initiator can cancel this bartr".to_string(),
            ));
        }
        if bartr.status != BartrStatus::Pending {
            return Err(DomainError::InvalidOperation(format!(
                "Cannot cancel a bartr that is {}",
                bartr.status
            )));
        }

        let bartr = self
            .transition(id, BartrStatus::Pending, BartrStatus::Cancelled)
            .await?;

        tracing::info!(bartr_id = %bartr.id, user_id = %caller_id, "Bartr cancelled");

        self.notify(
            bartr.receiver_id,
            NotificationType::BartrCancelled,
            "Bartr Cancelled",
            "A bartr request for your listing was withdrawn",
        )
        .await;

        Ok(bartr)
    }

    /// Record the caller's agreement that the trade happened; the second
    /// confirmation completes the bartr.
    #[tracing::instrument(skip(self))]
    pub async fn confirm(&self, id: Uuid, caller_id: Uuid) -> DomainResult<Bartr> {
        let (bartr, party) = self.party_bartr(id, caller_id).await?;

        if bartr.status != BartrStatus::Accepted {
            return Err(DomainError::InvalidOperation(format!(
                "Cannot complete a bartr that is {}",
                bartr.status
            )));
        }

        let Some(confirmed) = self.store.set_confirmation(id, party).await? else {
            // Moved out of ACCEPTED since the read above
            let current = self.find(id).await?;
            if current.status == BartrStatus::Completed {
                return Ok(current);
            }
            return Err(DomainError::InvalidOperation(format!(
                "Cannot complete a bartr that is {}",
                current.status
            )));
        };

        if !confirmed.both_confirmed() {
            tracing::info!(
                bartr_id = %id,
                user_id = %caller_id,
                party = ?party,
                "Bartr confirmation recorded"
            );
            return Ok(confirmed);
        }

        match self.store.complete_bartr(id).await? {
            Some(completed) => {
                tracing::info!(
                    bartr_id = %id,
                    user_id = %caller_id,
                    status = %completed.status,
                    "Bartr completed"
                );

                self.notify(
                    completed.counterpart_of(caller_id),
                    NotificationType::BartrCompleted,
                    "Bartr Completed",
                    "A bartr has been marked as completed. The item is now marked as traded!",
                )
                .await;
                self.notify(
                    caller_id,
                    NotificationType::BartrCompleted,
                    "Bartr Completed",
                    "You've successfully completed a bartr! The item is now marked as traded.",
                )
                .await;

                Ok(completed)
            }
            None => {
                // Either the other party's confirm completed it first, or one
                // of the listings was traded away in another bartr
                let current = self.find(id).await?;
                if current.status == BartrStatus::Completed {
                    return Ok(current);
                }
                tracing::warn!(bartr_id = %id, "Bartr listing no longer available at completion");
                Err(listing_unavailable())
            }
        }
    }

    /// Retract both confirmations. Status and `completed_at` are never
    /// touched, whatever the status.
    #[tracing::instrument(skip(self))]
    pub async fn reset_confirmations(&self, id: Uuid, caller_id: Uuid) -> DomainResult<Bartr> {
        self.party_bartr(id, caller_id).await?;

        let bartr = self
            .store
            .reset_confirmations(id)
            .await?
            .ok_or_else(|| DomainError::NotFound("Bartr".to_string()))?;

        tracing::info!(
            bartr_id = %id,
            user_id = %caller_id,
            status = %bartr.status,
            "Bartr confirmations reset"
        );
        Ok(bartr)
    }

    /// Load a bartr the user takes part in, with the side they are on
    pub(crate) async fn party_bartr(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> DomainResult<(Bartr, Party)> {
        let bartr = self.find(id).await?;
        match bartr.party_of(user_id) {
            Some(party) => Ok((bartr, party)),
            None => Err(DomainError::PermissionDenied(
                "You are not a party to this bartr".to_string(),
            )),
        }
    }

    pub(crate) async fn find(&self, id: Uuid) -> DomainResult<Bartr> {
        self.store
            .find_bartr(id)
            .await?
            .ok_or_else(|| DomainError::NotFound("Bartr".to_string()))
    }

    async fn pending_for_receiver(
        &self,
        id: Uuid,
        caller_id: Uuid,
        action: &str,
    ) -> DomainResult<Bartr> {
        let bartr = self.find(id).await?;

        if bartr.receiver_id != caller_id {
            return Err(DomainError::PermissionDenied(format!(
                "Only the receiver can {} this bartr",
                action
            )));
        }
        if bartr.status != BartrStatus::Pending {
            return Err(DomainError::InvalidOperation(format!(
                "Cannot {} a bartr that is {}",
                action, bartr.status
            )));
        }
        Ok(bartr)
    }

    async fn transition(&self, id: Uuid, from: BartrStatus, to: BartrStatus) -> DomainResult<Bartr> {
        self.store
            .transition_status(id, from, to)
            .await?
            .ok_or_else(|| {
                DomainError::InvalidOperation(format!("Bartr is no longer {}", from))
            })
    }

    pub(crate) async fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationType,
        title: &str,
        message: impl Into<String>,
    ) {
        deliver(
            self.notifier.as_ref(),
            NewNotification::new(user_id, kind, title, message),
        )
        .await;
    }
}

fn listing_unavailable() -> DomainError {
    DomainError::InvalidOperation("Listing is no longer available for trade".to_string())
}
