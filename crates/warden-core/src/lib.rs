//! Core domain + application logic for the warden Discord bot.
//!
//! This crate is intentionally framework-agnostic. Discord lives behind a
//! port (trait) implemented in the adapter crate.

pub mod audit;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod events;
pub mod flow;
pub mod gateway;
pub mod health;
pub mod logging;
pub mod machine;
pub mod moderation;
pub mod session;

pub use errors::{Error, Result};
