//! Chat client poll loop
//!
//! Re-fetches `GET /bartrs/:id` on a fixed interval and reconciles each
//! snapshot into a `ChatView`. Snapshots older than the displayed one are
//! discarded, so a slow response can never roll the view backwards.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::bartr::BartrDetail;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Outcome of reconciling one snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewChange {
    /// First snapshot
    Initial,
    /// Message count, status or confirmation flags changed
    Replaced { new_messages: usize },
    Unchanged,
    /// Older than what is displayed; dropped
    Stale,
}

impl ViewChange {
    pub fn is_update(&self) -> bool {
        matches!(self, ViewChange::Initial | ViewChange::Replaced { .. })
    }
}

/// Locally displayed trade + conversation
#[derive(Debug, Default, Clone)]
pub struct ChatView {
    current: Option<BartrDetail>,
}

impl ChatView {
    pub fn current(&self) -> Option<&BartrDetail> {
        self.current.as_ref()
    }

    /// Last fetch wins, unless it is older than the current view
    pub fn apply(&mut self, snapshot: BartrDetail) -> ViewChange {
        let Some(current) = &self.current else {
            self.current = Some(snapshot);
            return ViewChange::Initial;
        };

        if snapshot.bartr.updated_at < current.bartr.updated_at {
            return ViewChange::Stale;
        }

        let changed = snapshot.messages.len() != current.messages.len()
            || snapshot.bartr.status != current.bartr.status
            || snapshot.bartr.initiator_confirmed != current.bartr.initiator_confirmed
            || snapshot.bartr.receiver_confirmed != current.bartr.receiver_confirmed;
        if !changed {
            return ViewChange::Unchanged;
        }

        let new_messages = snapshot
            .messages
            .len()
            .saturating_sub(current.messages.len());
        self.current = Some(snapshot);
        ViewChange::Replaced { new_messages }
    }
}

/// Polls one bartr for a signed-in user
pub struct ChatPoller {
    http: Client,
    base_url: String,
    token: String,
    interval: Duration,
}

impl ChatPoller {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub async fn fetch(&self, bartr_id: Uuid) -> Result<BartrDetail, ClientError> {
        let response = self
            .http
            .get(format!("{}/bartrs/{}", self.base_url, bartr_id))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<BartrDetail>().await?)
    }

    /// Poll until `shutdown` resolves or every receiver of `updates` is
    /// gone. Failed polls are retried on the next tick.
    pub async fn run(
        &self,
        bartr_id: Uuid,
        updates: watch::Sender<Option<BartrDetail>>,
        shutdown: impl Future<Output = ()>,
    ) {
        let mut view = ChatView::default();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::debug!(bartr_id = %bartr_id, interval_ms = self.interval.as_millis() as u64, "Chat poller started");

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = updates.closed() => break,
                _ = ticker.tick() => {}
            }

            let snapshot = match self.fetch(bartr_id).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::debug!(bartr_id = %bartr_id, error = %e, "Chat poll failed");
                    continue;
                }
            };

            let change = view.apply(snapshot);
            if change.is_update() && updates.send(view.current().cloned()).is_err() {
                break;
            }
        }

        tracing::debug!(bartr_id = %bartr_id, "Chat poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bartr::{Bartr, BartrStatus};
    use crate::messaging::{Message, MessageType, MessageWithSender};
    use chrono::{Duration as ChronoDuration, Utc};

    fn snapshot(messages: usize, status: BartrStatus) -> BartrDetail {
        let now = Utc::now();
        let bartr = Bartr {
            id: Uuid::nil(),
            initiator_id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
            listing_id: Uuid::new_v4(),
            offered_listing_id: None,
            status,
            message: None,
            initiator_confirmed: false,
            receiver_confirmed: false,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        let messages = (0..messages)
            .map(|i| MessageWithSender {
                message: Message {
                    id: Uuid::new_v4(),
                    bartr_id: bartr.id,
                    sender_id: bartr.initiator_id,
                    content: format!("message {}", i),
                    message_type: MessageType::Text,
                    created_at: now,
                },
                sender: None,
            })
            .collect();

        BartrDetail {
            bartr,
            listing: None,
            offered_listing: None,
            initiator: None,
            receiver: None,
            messages,
        }
    }

    #[test]
    fn test_first_snapshot_is_initial() {
        let mut view = ChatView::default();
        assert_eq!(view.apply(snapshot(0, BartrStatus::Pending)), ViewChange::Initial);
        assert!(view.current().is_some());
    }

    #[test]
    fn test_new_messages_replace_view() {
        let mut view = ChatView::default();
        view.apply(snapshot(1, BartrStatus::Accepted));

        let change = view.apply(snapshot(3, BartrStatus::Accepted));
        assert_eq!(change, ViewChange::Replaced { new_messages: 2 });
        assert_eq!(view.current().unwrap().messages.len(), 3);
    }

    #[test]
    fn test_status_and_flag_changes_replace_view() {
        let mut view = ChatView::default();
        view.apply(snapshot(1, BartrStatus::Pending));
        assert!(view.apply(snapshot(1, BartrStatus::Accepted)).is_update());

        let mut confirmed = snapshot(1, BartrStatus::Accepted);
        confirmed.bartr.initiator_confirmed = true;
        assert_eq!(view.apply(confirmed), ViewChange::Replaced { new_messages: 0 });
    }

    #[test]
    fn test_identical_snapshot_is_unchanged() {
        let mut view = ChatView::default();
        view.apply(snapshot(2, BartrStatus::Accepted));
        assert_eq!(
            view.apply(snapshot(2, BartrStatus::Accepted)),
            ViewChange::Unchanged
        );
    }

    #[test]
    fn test_older_snapshot_is_discarded() {
        let mut view = ChatView::default();
        view.apply(snapshot(4, BartrStatus::Accepted));

        let mut late = snapshot(2, BartrStatus::Pending);
        late.bartr.updated_at = Utc::now() - ChronoDuration::seconds(30);

        assert_eq!(view.apply(late), ViewChange::Stale);
        assert_eq!(view.current().unwrap().messages.len(), 4);
        assert_eq!(view.current().unwrap().bartr.status, BartrStatus::Accepted);
    }
}
