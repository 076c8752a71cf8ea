// ── Console facade ──
//
// Wires one device's client, availability prober, auth session and shared
// state socket together, and is the single entry point for consumers.

use std::future::Future;
use std::sync::Arc;

use boneio_api::transport::{TlsMode, TransportConfig};
use boneio_api::{BoneioClient, FileItem, LogEntry, StatusResponse, UpdateInfo};
use secrecy::SecretString;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::{AuthSession, AuthState, TokenStore};
use crate::availability::{AvailabilityProber, AvailabilityState};
use crate::command::{self, Command, CommandResult};
use crate::config::{ConsoleConfig, TlsVerification};
use crate::connection::{ConnectionEvent, ConnectionManager, Subscription, WsConnector};
use crate::error::CoreError;
use crate::scheduler::Scheduler;
use crate::stream::StateWatch;

/// The main entry point for consumers.
///
/// Cheaply cloneable. Construction wires everything but starts nothing;
/// call [`start()`](Self::start) to resolve the auth requirement and begin
/// availability probing. The state socket opens on its own once something
/// subscribes.
#[derive(Clone)]
pub struct Console {
    inner: Arc<ConsoleInner>,
}

struct ConsoleInner {
    config: ConsoleConfig,
    client: Arc<BoneioClient>,
    scheduler: Scheduler,
    prober: AvailabilityProber,
    auth: AuthSession,
    connection: ConnectionManager,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Console {
    /// Build a console for the device in `config`. Must be called inside a
    /// Tokio runtime.
    pub fn new(config: ConsoleConfig, tokens: Arc<dyn TokenStore>) -> Result<Self, CoreError> {
        let transport = build_transport(&config);
        let client = Arc::new(BoneioClient::new(config.url.clone(), &transport)?);

        if config.url.scheme() == "https" && config.tls != TlsVerification::SystemDefaults {
            warn!("custom TLS settings apply to HTTP requests only; the state socket uses the built-in root store");
        }

        let scheduler = Scheduler::new();
        let prober = AvailabilityProber::new(client.clone(), config.probe.clone());
        let auth = AuthSession::new(Arc::clone(&client), tokens);
        let connection = ConnectionManager::new(
            config.url.clone(),
            config.connection.clone(),
            Arc::new(WsConnector),
            auth.clone(),
            prober.subscribe(),
            scheduler.clone(),
        );

        Ok(Self {
            inner: Arc::new(ConsoleInner {
                config,
                client,
                scheduler,
                prober,
                auth,
                connection,
                tasks: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.inner.config
    }

    /// The raw API client, for calls the console does not wrap.
    pub fn client(&self) -> &Arc<BoneioClient> {
        &self.inner.client
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Ask the device whether login is required and start the periodic
    /// availability check.
    pub async fn start(&self) -> AuthState {
        let auth = self.inner.auth.init().await;
        debug!(
            required = auth.is_auth_required,
            authenticated = auth.is_authenticated,
            "auth requirement resolved"
        );

        let handle = self.inner.prober.spawn(self.inner.scheduler.child_token());
        self.inner.tasks.lock().await.push(handle);
        info!(url = %self.inner.config.url, "console started");
        auth
    }

    /// Stop every background task and drop the state socket.
    pub async fn close(&self) {
        self.inner.connection.shutdown();
        self.inner.scheduler.shutdown();

        let handles: Vec<_> = self.inner.tasks.lock().await.drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
        debug!("console closed");
    }

    /// Resolve auth, run `f`, close. Availability probing and the state
    /// socket are never started.
    pub async fn oneshot<F, Fut, T>(
        config: ConsoleConfig,
        tokens: Arc<dyn TokenStore>,
        f: F,
    ) -> Result<T, CoreError>
    where
        F: FnOnce(Console) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let console = Console::new(config, tokens)?;
        console.inner.auth.init().await;
        let result = f(console.clone()).await;
        console.close().await;
        result
    }

    // ── Availability ─────────────────────────────────────────────

    pub fn availability(&self) -> AvailabilityState {
        self.inner.prober.state()
    }

    pub fn watch_availability(&self) -> watch::Receiver<AvailabilityState> {
        self.inner.prober.subscribe()
    }

    /// Probe the device now. Takes at least the minimum check duration.
    pub async fn check_now(&self) -> bool {
        self.inner.prober.check_now().await
    }

    // ── Auth ─────────────────────────────────────────────────────

    pub fn auth_state(&self) -> AuthState {
        self.inner.auth.state()
    }

    pub fn watch_auth(&self) -> watch::Receiver<AuthState> {
        self.inner.auth.subscribe()
    }

    pub async fn login(&self, username: &str, password: &SecretString) -> Result<(), CoreError> {
        self.inner.auth.login(username, password).await
    }

    /// Forget the credential and tear the state socket down, listeners
    /// included.
    ///
    /// Every [`Subscription`] and [`StateWatch`] taken before this call is
    /// dead afterwards, even across a later [`login`](Self::login). Take
    /// fresh ones to see state again.
    pub fn logout(&self) {
        self.inner.auth.logout();
        self.inner.connection.shutdown();
    }

    // ── Realtime state ───────────────────────────────────────────

    pub fn connection(&self) -> &ConnectionManager {
        &self.inner.connection
    }

    /// Register a raw listener on the shared state socket.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        self.inner.connection.subscribe(listener)
    }

    /// Live entity tables, cleared whenever the device or the session goes
    /// away.
    ///
    /// The watch is bound to the listener registry as it is now.
    /// [`logout`](Self::logout) and [`close`](Self::close) clear that
    /// registry, so call this again after logging back in.
    pub fn watch_state(&self) -> StateWatch {
        StateWatch::new(
            &self.inner.connection,
            self.inner.prober.subscribe(),
            self.inner.auth.subscribe(),
        )
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Send a command. Refused without a request while the last liveness
    /// check found the device down.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        if !self.inner.prober.is_available() {
            debug!(command = cmd.name(), "device unavailable, command not sent");
            return Err(CoreError::Unavailable);
        }
        command::route(&self.inner.client, &self.inner.auth, cmd).await
    }

    // ── Reads ────────────────────────────────────────────────────

    pub async fn version(&self) -> Result<String, CoreError> {
        self.inner.auth.observe(self.inner.client.version().await)
    }

    pub async fn name(&self) -> Result<String, CoreError> {
        self.inner.auth.observe(self.inner.client.name().await)
    }

    /// Device-side validation of the stored configuration. An invalid
    /// configuration is a successful call whose status is not `success`.
    pub async fn check_configuration(&self) -> Result<StatusResponse, CoreError> {
        self.inner
            .auth
            .observe(self.inner.client.check_configuration().await)
    }

    pub async fn list_files(&self, path: Option<&str>) -> Result<Vec<FileItem>, CoreError> {
        self.inner.auth.observe(self.inner.client.list_files(path).await)
    }

    pub async fn get_file(&self, path: &str) -> Result<String, CoreError> {
        self.inner
            .auth
            .observe(self.inner.client.get_file(path).await)
            .map_err(|e| match e {
                CoreError::NotFound { .. } => CoreError::NotFound {
                    entity_type: "File".into(),
                    identifier: path.into(),
                },
                other => other,
            })
    }

    pub async fn logs(&self, since: Option<&str>, limit: Option<u32>) -> Result<Vec<LogEntry>, CoreError> {
        self.inner.auth.observe(self.inner.client.logs(since, limit).await)
    }

    pub async fn check_update(&self) -> Result<UpdateInfo, CoreError> {
        self.inner.auth.observe(self.inner.client.check_update().await)
    }

    /// The configuration as the device parsed it, includes resolved.
    pub async fn device_config(&self) -> Result<serde_json::Value, CoreError> {
        self.inner.auth.observe(self.inner.client.config().await)
    }
}

fn build_transport(config: &ConsoleConfig) -> TransportConfig {
    TransportConfig {
        tls: match &config.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        },
        timeout: config.timeout,
    }
}
