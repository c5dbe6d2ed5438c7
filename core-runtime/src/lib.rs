//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the session manager and the transfer
//! runs:
//! - Logging and tracing bootstrap
//! - Configuration and injected bridges
//! - Event bus (the progress/status channel observed by the UI)
//!
//! ## Overview
//!
//! Nothing here performs transfers. The crate fixes the conventions the rest
//! of the workspace follows: `tracing` for diagnostics, [`CoreConfig`] for
//! tunables, and [`EventBus`] for anything a UI wants to observe.
//!
//! [`CoreConfig`]: config::CoreConfig
//! [`EventBus`]: events::EventBus

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
