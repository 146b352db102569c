//! Notification domain module
//!
//! Contains models, the sink the trade engine reports through, and the
//! inbox service behind the notification endpoints.

mod model;
mod service;
mod sink;

pub use model::*;
pub use service::NotificationService;
pub use sink::{NotificationSink, StoreNotificationSink};
pub(crate) use sink::deliver;
