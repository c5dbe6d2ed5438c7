//! Core service façade and bootstrap helpers.
//!
//! This crate wires a validated [`CoreConfig`] and a host-provided
//! [`GatewayFactory`] into the session manager and the three background run
//! kinds (upload, download, catalog refresh). Desktop apps typically enable the
//! `desktop-shims` feature so the keyring and local filesystem bridges are used
//! when none are injected.
//!
//! The UI layer only dispatches runs and observes them: progress arrives on the
//! per-run `watch` channels and on the shared event stream from
//! [`CoreService::subscribe_events`].

pub mod error;

pub use error::{CoreError, Result};

use std::path::PathBuf;
use std::sync::Arc;

use bridge_traits::remote::{GatewayFactory, RemoteGateway};
use core_async::sync::watch;
use core_auth::{AccountSummary, AuthError, Session, SessionManager};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, EventStream, Receiver};
use core_runtime::logging::{init_logging, LoggingConfig};
use core_transfer::{
    CatalogBrowser, CatalogSnapshot, DownloadConfiguration, DownloadOrchestrator, DownloadPack,
    DownloadQueue, DownloadReport, RunHandle, TransferConfiguration, TransferProgress,
    UploadOrchestrator, UploadReport,
};
use parking_lot::Mutex;
use tracing::{info, instrument};

/// Primary façade exposed to host applications.
pub struct CoreService {
    config: CoreConfig,
    event_bus: EventBus,
    session: Arc<SessionManager>,
    uploads: UploadOrchestrator,
    downloads: DownloadOrchestrator,
    catalog: CatalogBrowser,
    queue: Mutex<DownloadQueue>,
}

impl CoreService {
    /// Create a new service from a validated configuration.
    ///
    /// Every run talks to the server through the session gateway, so runs
    /// started after a logout fail per item instead of using stale
    /// credentials.
    pub fn new(config: CoreConfig, factory: Arc<dyn GatewayFactory>) -> Result<Self> {
        config.validate()?;

        let event_bus = EventBus::new(config.event_buffer_size);
        let session = Arc::new(SessionManager::new(
            Arc::clone(&config.secure_store),
            factory,
            event_bus.clone(),
        ));
        let gateway: Arc<dyn RemoteGateway> = Arc::new(session.session_gateway());

        let uploads = UploadOrchestrator::new(
            Arc::clone(&gateway),
            event_bus.clone(),
            config.retry,
            config.media_extensions.clone(),
            config.device_id.clone(),
        );
        let downloads = DownloadOrchestrator::new(
            Arc::clone(&gateway),
            event_bus.clone(),
            Arc::clone(&config.file_system),
            config.retry,
        );
        let catalog = CatalogBrowser::new(gateway, event_bus.clone(), config.smart_search_limit);

        info!(
            device_id = %config.device_id,
            extensions = config.media_extensions.len(),
            "Core service initialized"
        );

        Ok(Self {
            config,
            event_bus,
            session,
            uploads,
            downloads,
            catalog,
            queue: Mutex::new(DownloadQueue::new()),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Shared stream of session, transfer and catalog events.
    pub fn subscribe_events(&self) -> Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    /// Upload and download milestones only (the progress panel).
    pub fn subscribe_transfers(&self) -> EventStream {
        EventStream::transfers(self.event_bus.subscribe())
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    #[instrument(skip(self, api_key))]
    pub async fn login(&self, base_url: &str, api_key: &str) -> Result<Session> {
        Ok(self.session.login(base_url, api_key).await?)
    }

    /// Signs in silently from the persisted login, if any.
    pub async fn restore_session(&self) -> Result<Option<Session>> {
        Ok(self.session.restore().await?)
    }

    pub async fn reauthenticate(&self) -> Result<Session> {
        Ok(self.session.reauthenticate().await?)
    }

    /// Stops running transfers and forgets the stored login.
    pub async fn logout(&self) -> Result<()> {
        self.uploads.cancel();
        self.downloads.cancel();
        self.catalog.cancel();
        self.queue.lock().clear();
        Ok(self.session.logout().await?)
    }

    pub async fn current_session(&self) -> Option<Session> {
        self.session.current_session().await
    }

    pub async fn account_summary(&self) -> Result<AccountSummary> {
        Ok(self.session.account_summary().await?)
    }

    // ------------------------------------------------------------------
    // Uploads
    // ------------------------------------------------------------------

    /// # Errors
    ///
    /// - [`AuthError::NotAuthenticated`] without a session
    /// - [`TransferError::Configuration`](core_transfer::TransferError::Configuration)
    ///   for an empty selection
    /// - [`TransferError::AlreadyRunning`](core_transfer::TransferError::AlreadyRunning)
    ///   while an upload is in progress
    pub async fn start_upload(
        &self,
        sources: Vec<PathBuf>,
        config: TransferConfiguration,
    ) -> Result<RunHandle<UploadReport>> {
        self.require_session().await?;
        Ok(self.uploads.start(sources, config)?)
    }

    pub fn cancel_upload(&self) -> bool {
        self.uploads.cancel()
    }

    pub fn upload_progress(&self) -> watch::Receiver<TransferProgress> {
        self.uploads.subscribe()
    }

    // ------------------------------------------------------------------
    // Download queue
    // ------------------------------------------------------------------

    pub fn queue_pack(&self, pack: DownloadPack) {
        self.queue.lock().add(pack);
    }

    pub fn unqueue_pack(&self, index: usize) -> Option<DownloadPack> {
        self.queue.lock().remove(index)
    }

    pub fn clear_queue(&self) {
        self.queue.lock().clear();
    }

    pub fn download_queue(&self) -> DownloadQueue {
        self.queue.lock().clone()
    }

    /// Downloads a snapshot of the current queue.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NotAuthenticated`] without a session
    /// - [`TransferError::Configuration`](core_transfer::TransferError::Configuration)
    ///   when no save path is selected
    pub async fn start_download(
        &self,
        config: DownloadConfiguration,
    ) -> Result<RunHandle<DownloadReport>> {
        self.require_session().await?;
        let packs = self.queue.lock().snapshot();
        Ok(self.downloads.start(packs, config)?)
    }

    pub fn cancel_download(&self) -> bool {
        self.downloads.cancel()
    }

    pub fn download_progress(&self) -> watch::Receiver<TransferProgress> {
        self.downloads.subscribe()
    }

    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    pub async fn refresh_catalog(&self) -> Result<RunHandle<CatalogSnapshot>> {
        self.require_session().await?;
        Ok(self.catalog.refresh()?)
    }

    pub fn cancel_catalog_refresh(&self) -> bool {
        self.catalog.cancel()
    }

    pub fn catalog(&self) -> Option<CatalogSnapshot> {
        self.catalog.latest()
    }

    pub async fn smart_search(&self, query: &str) -> Result<DownloadPack> {
        self.require_session().await?;
        Ok(self.catalog.smart_search(query).await?)
    }

    pub async fn library_pack(&self) -> Result<DownloadPack> {
        self.require_session().await?;
        Ok(self.catalog.library_pack().await?)
    }

    async fn require_session(&self) -> Result<()> {
        if self.session.is_authenticated().await {
            Ok(())
        } else {
            Err(AuthError::NotAuthenticated.into())
        }
    }
}

/// Installs logging, then builds the service.
///
/// The config's logger sink, when present, receives every log record (the
/// desktop console pane).
///
/// ```ignore
/// let config = CoreConfig::builder().build()?;
/// let core = bootstrap(config, Arc::new(HttpGatewayFactory::new()), LoggingConfig::default())?;
/// core.restore_session().await?;
/// ```
pub fn bootstrap(
    config: CoreConfig,
    factory: Arc<dyn GatewayFactory>,
    logging: LoggingConfig,
) -> Result<CoreService> {
    let logging = match &config.logger_sink {
        Some(sink) if logging.logger_sink.is_none() => logging.with_logger_sink(Arc::clone(sink)),
        _ => logging,
    };
    init_logging(logging).map_err(|e| CoreError::InitializationFailed(e.to_string()))?;
    CoreService::new(config, factory)
}
