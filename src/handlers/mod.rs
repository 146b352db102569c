//! API handlers for the BARTR server

pub mod bartr;
pub mod health;
pub mod listing;
pub mod messages;
pub mod notification;
pub mod review;
pub mod user;

pub use bartr::*;
pub use health::health_check;
pub use listing::*;
pub use messages::*;
pub use notification::*;
pub use review::*;
pub use user::get_user_profile;
