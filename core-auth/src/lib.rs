//! # Session Module
//!
//! Server login, credential persistence and the session-bound gateway.
//!
//! ## Overview
//!
//! A login is a server URL plus an API key. This crate validates that pair
//! against the server, keeps it in the platform secure store, and hands the
//! transfer engine a [`SessionGateway`] that follows whichever login is
//! active.
//!
//! ## Features
//!
//! - URL normalization and credential validation via `current_user`
//! - Silent sign-in from persisted credentials
//! - Logout that erases the stored login
//! - Session event emission

pub mod credential_store;
pub mod error;
pub mod gateway;
pub mod manager;

pub use credential_store::{CredentialStore, BASE_URL_KEY, TOKEN_KEY};
pub use error::{AuthError, Result};
pub use gateway::SessionGateway;
pub use manager::{AccountSummary, Session, SessionManager};
