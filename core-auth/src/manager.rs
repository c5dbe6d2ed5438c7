//! # Session Manager
//!
//! Owns the login to one photo server.
//!
//! ## Overview
//!
//! `SessionManager` turns a server URL plus API key into a validated
//! [`RemoteGateway`]. A login is only accepted after the server answers
//! [`RemoteGateway::current_user`]; accepted credentials are persisted through
//! [`CredentialStore`] so [`SessionManager::restore`] can sign in silently on
//! the next launch. State changes are published as [`SessionEvent`]s.
//!
//! ## Usage
//!
//! ```no_run
//! use core_auth::SessionManager;
//! use core_runtime::events::EventBus;
//! use std::sync::Arc;
//! # use bridge_traits::{remote::GatewayFactory, storage::SecureStore};
//! # async fn example(
//! #     secure_store: Arc<dyn SecureStore>,
//! #     factory: Arc<dyn GatewayFactory>,
//! # ) -> core_auth::Result<()> {
//! let manager = SessionManager::new(secure_store, factory, EventBus::new(100));
//!
//! if manager.restore().await?.is_none() {
//!     manager.login("https://photos.example.com/", "api-key").await?;
//! }
//!
//! let summary = manager.account_summary().await?;
//! println!("{} assets", summary.statistics.total);
//! # Ok(())
//! # }
//! ```

use crate::credential_store::CredentialStore;
use crate::error::{AuthError, Result};
use crate::gateway::SessionGateway;
use bridge_traits::error::BridgeError;
use bridge_traits::remote::{
    AssetStatistics, GatewayFactory, RemoteGateway, ServerCredentials, UserInfo,
};
use bridge_traits::storage::SecureStore;
use chrono::{DateTime, Utc};
use core_async::sync::RwLock;
use core_runtime::events::{CoreEvent, EventBus, SessionEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Public view of the active login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub base_url: String,
    pub user: UserInfo,
    pub signed_in_at: DateTime<Utc>,
}

impl Session {
    /// Label shown for the account: the display name, or the email when the
    /// server reports no name.
    pub fn display_name(&self) -> &str {
        if self.user.name.trim().is_empty() {
            &self.user.email
        } else {
            &self.user.name
        }
    }
}

/// Account details shown after login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub base_url: String,
    pub user: UserInfo,
    pub statistics: AssetStatistics,
}

pub(crate) struct ActiveSession {
    pub(crate) session: Session,
    pub(crate) gateway: Arc<dyn RemoteGateway>,
}

pub(crate) type SharedSession = Arc<RwLock<Option<ActiveSession>>>;

/// Login lifecycle for a single server.
pub struct SessionManager {
    credentials: CredentialStore,
    factory: Arc<dyn GatewayFactory>,
    event_bus: EventBus,
    active: SharedSession,
}

impl SessionManager {
    /// Creates a manager with no active session.
    ///
    /// # Arguments
    ///
    /// * `secure_store` - Platform secure storage for the persisted login
    /// * `factory` - Builds gateways from credentials
    /// * `event_bus` - Receives [`SessionEvent`]s
    pub fn new(
        secure_store: Arc<dyn SecureStore>,
        factory: Arc<dyn GatewayFactory>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            credentials: CredentialStore::new(secure_store),
            factory,
            event_bus,
            active: Arc::new(RwLock::new(None)),
        }
    }

    /// Trims surrounding whitespace and trailing slashes.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidServerUrl`] when nothing is left or the
    /// scheme is not `http`/`https`.
    pub fn normalize_base_url(raw: &str) -> Result<String> {
        let trimmed = raw.trim().trim_end_matches('/');

        if trimmed.is_empty() {
            return Err(AuthError::InvalidServerUrl("server URL is empty".to_string()));
        }

        let lower = trimmed.to_ascii_lowercase();
        if !lower.starts_with("http://") && !lower.starts_with("https://") {
            return Err(AuthError::InvalidServerUrl(format!(
                "'{}' must start with http:// or https://",
                trimmed
            )));
        }

        Ok(trimmed.to_string())
    }

    /// Validates and persists a new login, replacing any active one.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidServerUrl`] for a malformed URL
    /// - [`AuthError::AuthenticationFailed`] when the server rejects the key
    /// - [`AuthError::Gateway`] when the server cannot be reached
    /// - [`AuthError::SecureStorageUnavailable`] when persisting fails
    #[instrument(skip(self, api_key))]
    pub async fn login(&self, base_url: &str, api_key: &str) -> Result<Session> {
        let result = self.login_inner(base_url, api_key).await;
        if let Err(e) = &result {
            self.emit_error(e);
        }
        result
    }

    async fn login_inner(&self, base_url: &str, api_key: &str) -> Result<Session> {
        let base_url = Self::normalize_base_url(base_url)?;
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(AuthError::AuthenticationFailed {
                base_url,
                reason: "API key is empty".to_string(),
            });
        }

        let credentials = ServerCredentials::new(base_url, api_key);
        let session = self.activate(&credentials).await?;
        self.credentials.save(&credentials).await?;

        info!(base_url = %session.base_url, user = %session.display_name(), "Logged in");
        Ok(session)
    }

    /// Signs in with the persisted login, if any.
    ///
    /// Returns `Ok(None)` when nothing is stored. Stored credentials are kept
    /// when validation fails so a later retry can succeed.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Result<Option<Session>> {
        let Some(credentials) = self.credentials.load().await? else {
            debug!("No persisted login to restore");
            return Ok(None);
        };

        match self.activate(&credentials).await {
            Ok(session) => {
                info!(base_url = %session.base_url, "Restored persisted login");
                Ok(Some(session))
            }
            Err(e) => {
                self.emit_error(&e);
                Err(e)
            }
        }
    }

    /// Re-validates the active login against the server.
    ///
    /// A rejected key ends the session; stored credentials are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotAuthenticated`] when no session is active.
    #[instrument(skip(self))]
    pub async fn reauthenticate(&self) -> Result<Session> {
        let (gateway, base_url) = {
            let guard = self.active.read().await;
            let active = guard.as_ref().ok_or(AuthError::NotAuthenticated)?;
            (active.gateway.clone(), active.session.base_url.clone())
        };

        match gateway.current_user().await {
            Ok(user) => {
                let mut guard = self.active.write().await;
                let active = guard.as_mut().ok_or(AuthError::NotAuthenticated)?;
                active.session.user = user;
                Ok(active.session.clone())
            }
            Err(e) => {
                let error = Self::map_validation_error(&base_url, e);
                if !error.is_recoverable() {
                    warn!(base_url = %base_url, "Server rejected the active session");
                    *self.active.write().await = None;
                }
                self.emit_error(&error);
                Err(error)
            }
        }
    }

    /// Ends the session and deletes the persisted login.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        let previous = self.active.write().await.take();
        self.credentials.clear().await?;

        let base_url = previous
            .map(|active| active.session.base_url)
            .unwrap_or_default();

        info!(base_url = %base_url, "Logged out");
        self.event_bus
            .emit(CoreEvent::Session(SessionEvent::SignedOut { base_url }))
            .ok();
        Ok(())
    }

    pub async fn current_session(&self) -> Option<Session> {
        self.active
            .read()
            .await
            .as_ref()
            .map(|active| active.session.clone())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.active.read().await.is_some()
    }

    /// Gateway of the active session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotAuthenticated`] when no session is active.
    pub async fn gateway(&self) -> Result<Arc<dyn RemoteGateway>> {
        self.active
            .read()
            .await
            .as_ref()
            .map(|active| active.gateway.clone())
            .ok_or(AuthError::NotAuthenticated)
    }

    /// A gateway that always routes to whichever session is active at call
    /// time. Calls fail with `Unauthorized` while signed out.
    pub fn session_gateway(&self) -> SessionGateway {
        SessionGateway::new(self.active.clone())
    }

    /// User plus asset counts of the active session.
    ///
    /// Statistics failures are logged and reported as zero counts.
    pub async fn account_summary(&self) -> Result<AccountSummary> {
        let (gateway, session) = {
            let guard = self.active.read().await;
            let active = guard.as_ref().ok_or(AuthError::NotAuthenticated)?;
            (active.gateway.clone(), active.session.clone())
        };

        let statistics = match gateway.asset_statistics().await {
            Ok(statistics) => statistics,
            Err(e) => {
                warn!(error = %e, "Failed to fetch asset statistics");
                AssetStatistics::default()
            }
        };

        Ok(AccountSummary {
            base_url: session.base_url,
            user: session.user,
            statistics,
        })
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn activate(&self, credentials: &ServerCredentials) -> Result<Session> {
        let gateway = self.factory.connect(credentials)?;
        let user = gateway
            .current_user()
            .await
            .map_err(|e| Self::map_validation_error(&credentials.base_url, e))?;

        let session = Session {
            base_url: credentials.base_url.clone(),
            user,
            signed_in_at: Utc::now(),
        };

        *self.active.write().await = Some(ActiveSession {
            session: session.clone(),
            gateway,
        });

        self.event_bus
            .emit(CoreEvent::Session(SessionEvent::SignedIn {
                base_url: session.base_url.clone(),
                user_name: session.display_name().to_string(),
            }))
            .ok();

        Ok(session)
    }

    fn map_validation_error(base_url: &str, error: BridgeError) -> AuthError {
        match error {
            BridgeError::Unauthorized(reason) => AuthError::AuthenticationFailed {
                base_url: base_url.to_string(),
                reason,
            },
            other => AuthError::Gateway(other),
        }
    }

    fn emit_error(&self, error: &AuthError) {
        self.event_bus
            .emit(CoreEvent::Session(SessionEvent::SessionError {
                message: error.to_string(),
                recoverable: error.is_recoverable(),
            }))
            .ok();
    }
}
