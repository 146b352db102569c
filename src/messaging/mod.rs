//! Conversation log module
//!
//! Append-only chat per bartr, plus the close-deal control messages.

mod model;
mod service;

pub use model::*;
pub use service::ConversationService;
