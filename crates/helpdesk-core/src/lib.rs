//! helpdesk-core library.
//!
//! # Conventions
//!
//! - **Errors**: record writes and store access return [`HelpdeskError`];
//!   configuration loading uses `anyhow::Result`.
//! - **Logging**: use `tracing` macros. Filter layers that fail are logged
//!   and dropped, never raised.

pub mod assign;
pub mod compose;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod mail;
pub mod model;
pub mod store;
pub mod ticket;

pub use error::{ErrorCode, HelpdeskError, Result};
