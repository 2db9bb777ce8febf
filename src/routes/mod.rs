//! HTTP route handlers

pub mod command;
pub mod health;

pub use command::{handle_callback, handle_command};
pub use health::{health_check, version_info};
