//! Bartr domain module
//!
//! Contains the trade models and the lifecycle engine.

mod model;
mod service;

pub use model::*;
pub use service::BartrService;
