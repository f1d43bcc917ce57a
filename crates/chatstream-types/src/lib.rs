//! Shared types for the chatstream conversation engine.

mod activity;
mod chat;
mod event;
mod session;

pub use activity::*;
pub use chat::*;
pub use event::*;
pub use session::*;
