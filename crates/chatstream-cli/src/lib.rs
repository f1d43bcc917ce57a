//! Library half of the chatstream CLI.

pub mod config;
pub mod follow;
pub mod logging;
pub mod render;
