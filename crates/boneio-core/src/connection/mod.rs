// ── Connection manager ──
//
// One shared state socket per console, multiplexed to any number of
// listeners. The socket exists only while someone listens and the device is
// reachable; it reconnects at a constant pace up to a fixed budget, then
// reports a terminal error once.
//
// All mutable state sits behind one short-held std mutex. It is never held
// across an await or while calling listeners. Callbacks from sockets that
// were torn down are recognised by a generation counter and ignored.

mod connector;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use boneio_api::StateUpdate;
use boneio_api::websocket::{self, Inbound, PING, StateSocket};
use futures_util::{SinkExt, StreamExt};
use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, trace, warn};
use url::Url;

pub use connector::{ConnectRequest, Connector, WsConnector};

use crate::auth::AuthSession;
use crate::availability::AvailabilityState;
use crate::config::ConnectionConfig;
use crate::scheduler::{Scheduler, TimerHandle};

const CLOSE_GRACE: Duration = Duration::from_secs(1);

// ── Public types ─────────────────────────────────────────────────

/// Lifecycle of the shared socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    /// No socket and nothing pending.
    Idle,
    /// Handshake in flight.
    Connecting,
    Open,
    /// Socket lost, reconnect pending.
    Closed,
}

/// What listeners receive.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    Update(Arc<StateUpdate>),
    /// Terminal failure after the retry budget ran out. Sent once.
    Error(String),
}

type Listener = Arc<dyn Fn(&ConnectionEvent) + Send + Sync>;

/// Cheaply cloneable handle to the shared state socket.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

/// Registration of one listener. Dropping it (or calling
/// [`unsubscribe`](Self::unsubscribe)) removes the listener immediately.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    manager: Weak<ManagerInner>,
    active: bool,
}

// ── Internals ────────────────────────────────────────────────────

struct ManagerInner {
    base_url: Url,
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    scheduler: Scheduler,
    auth: AuthSession,
    availability: watch::Receiver<AvailabilityState>,
    listeners: Mutex<IndexMap<u64, Listener>>,
    next_listener_id: AtomicU64,
    slot: Mutex<SocketSlot>,
    state: watch::Sender<ConnectionState>,
    error: watch::Sender<Option<String>>,
    dropped_frames: AtomicU64,
    _supervisor: DropGuard,
}

/// The one socket and everything scheduled around it.
#[derive(Default)]
struct SocketSlot {
    outgoing: Option<mpsc::UnboundedSender<String>>,
    session: Option<CancellationToken>,
    connecting: bool,
    attempts: u32,
    generation: u64,
    heartbeat: Option<TimerHandle>,
    debounce: Option<TimerHandle>,
    reconnect: Option<TimerHandle>,
}

impl SocketSlot {
    /// A socket is open, opening, or about to be opened.
    fn is_active(&self) -> bool {
        self.outgoing.is_some()
            || self.connecting
            || self.debounce.is_some()
            || self.reconnect.is_some()
    }
}

// ── ConnectionManager ────────────────────────────────────────────

impl ConnectionManager {
    /// Create a manager. No socket is opened until the first subscriber
    /// arrives. Must be called inside a Tokio runtime: the availability
    /// supervisor is spawned here.
    pub fn new(
        base_url: Url,
        config: ConnectionConfig,
        connector: Arc<dyn Connector>,
        auth: AuthSession,
        availability: watch::Receiver<AvailabilityState>,
        scheduler: Scheduler,
    ) -> Self {
        let supervisor = scheduler.child_token();
        let (state, _) = watch::channel(ConnectionState::Idle);
        let (error, _) = watch::channel(None);

        let inner = Arc::new(ManagerInner {
            base_url,
            config,
            connector,
            scheduler,
            auth,
            availability: availability.clone(),
            listeners: Mutex::new(IndexMap::new()),
            next_listener_id: AtomicU64::new(1),
            slot: Mutex::new(SocketSlot::default()),
            state,
            error,
            dropped_frames: AtomicU64::new(0),
            _supervisor: supervisor.clone().drop_guard(),
        });

        tokio::spawn(supervise_availability(
            Arc::downgrade(&inner),
            availability,
            supervisor,
        ));

        Self { inner }
    }

    /// Register `listener` for every event on the shared socket. Listeners
    /// are called synchronously, in registration order, from the socket
    /// task; they should return quickly.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let count = {
            let mut listeners = self.inner.listeners();
            listeners.insert(id, Arc::new(listener));
            listeners.len()
        };
        debug!(subscriber = id, count, "listener registered");

        self.inner.ensure_connection();

        Subscription {
            id,
            manager: Arc::downgrade(&self.inner),
            active: true,
        }
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn current_state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Terminal error, if the retry budget ran out. Cleared on the next
    /// successful open.
    pub fn error(&self) -> watch::Receiver<Option<String>> {
        self.inner.error.subscribe()
    }

    /// Reconnect attempts since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.inner.slot().attempts
    }

    /// Frames that could not be decoded and were dropped.
    pub fn dropped_frames(&self) -> u64 {
        self.inner.dropped_frames.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners().len()
    }

    /// Drop every listener and tear the socket down.
    pub fn shutdown(&self) {
        self.inner.listeners().clear();
        self.inner.teardown("shutdown");
    }
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn unsubscribe(mut self) {
        self.dispose();
    }

    fn dispose(&mut self) {
        if std::mem::take(&mut self.active) {
            if let Some(inner) = self.manager.upgrade() {
                inner.unsubscribe(self.id);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}

// ── Lifecycle ────────────────────────────────────────────────────

impl ManagerInner {
    fn slot(&self) -> MutexGuard<'_, SocketSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn listeners(&self) -> MutexGuard<'_, IndexMap<u64, Listener>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_available(&self) -> bool {
        self.availability.borrow().is_available
    }

    /// Schedule a debounced connect if listeners exist and nothing is open
    /// or pending. An exhausted retry budget starts over.
    fn ensure_connection(self: &Arc<Self>) {
        if self.listeners().is_empty() {
            return;
        }
        if !self.is_available() {
            debug!("device unavailable, deferring state connection");
            return;
        }

        let mut slot = self.slot();
        if slot.is_active() {
            return;
        }
        if slot.attempts >= self.config.max_reconnect_attempts {
            debug!(attempts = slot.attempts, "retry budget was exhausted, starting over");
            slot.attempts = 0;
        }

        let manager = Arc::downgrade(self);
        slot.debounce = Some(
            self.scheduler
                .schedule_once(self.config.connect_debounce, move || async move {
                    if let Some(inner) = manager.upgrade() {
                        drop(inner.slot().debounce.take());
                        inner.connect();
                    }
                }),
        );
    }

    /// Start a handshake unless one is open or in flight.
    fn connect(self: &Arc<Self>) {
        if !self.is_available() {
            debug!("device unavailable, not connecting");
            return;
        }
        if self.listeners().is_empty() {
            debug!("no listeners, not connecting");
            return;
        }

        let request = match self.connect_request() {
            Ok(request) => request,
            Err(e) => {
                error!(error = %e, "cannot build state socket URL");
                self.error.send_replace(Some(e.to_string()));
                return;
            }
        };

        let (generation, attempt) = {
            let mut slot = self.slot();
            if slot.outgoing.is_some() {
                debug!("state socket already open");
                return;
            }
            if slot.connecting {
                debug!("state socket handshake already in flight");
                return;
            }
            slot.connecting = true;
            (slot.generation, slot.attempts)
        };

        self.state.send_replace(ConnectionState::Connecting);
        debug!(url = %request.url, attempt, "opening state socket");

        let handshake = self.connector.connect(request);
        let manager = Arc::downgrade(self);
        tokio::spawn(async move {
            let result = handshake.await;
            let Some(inner) = manager.upgrade() else {
                return;
            };
            match result {
                Ok(socket) => inner.on_open(generation, socket),
                Err(e) => {
                    warn!(error = %e, attempt, "state socket handshake failed");
                    inner.on_socket_error(&e);
                    inner.on_close(generation);
                }
            }
        });
    }

    fn connect_request(&self) -> Result<ConnectRequest, boneio_api::Error> {
        let url = websocket::state_socket_url(&self.base_url)?;
        let token = if self.auth.state().is_auth_required {
            self.auth.credential()
        } else {
            None
        };
        Ok(ConnectRequest { url, token })
    }

    fn on_open(self: &Arc<Self>, generation: u64, socket: StateSocket) {
        let (outgoing, frames) = mpsc::unbounded_channel();
        let session = CancellationToken::new();

        {
            let mut slot = self.slot();
            if slot.generation != generation {
                debug!("discarding socket from a torn-down session");
                return;
            }
            slot.connecting = false;
            slot.attempts = 0;

            let heartbeat = outgoing.clone();
            slot.heartbeat = Some(self.scheduler.schedule_repeating(
                self.config.heartbeat_interval,
                move || {
                    if heartbeat.send(PING.to_owned()).is_err() {
                        trace!("heartbeat after socket close");
                    }
                },
            ));
            slot.outgoing = Some(outgoing);
            slot.session = Some(session.clone());
        }

        self.error.send_if_modified(|e| e.take().is_some());
        self.state.send_replace(ConnectionState::Open);
        info!("state socket open");

        tokio::spawn(run_session(
            Arc::downgrade(self),
            generation,
            socket,
            frames,
            session,
        ));
    }

    /// Socket lost or handshake failed: schedule a reconnect or give up.
    fn on_close(self: &Arc<Self>, generation: u64) {
        let mut slot = self.slot();
        if slot.generation != generation {
            return;
        }
        slot.heartbeat = None;
        slot.outgoing = None;
        slot.session = None;
        slot.connecting = false;

        if self.listeners().is_empty() {
            drop(slot);
            self.state.send_replace(ConnectionState::Idle);
            return;
        }

        if !self.is_available() {
            drop(slot);
            self.state.send_replace(ConnectionState::Closed);
            debug!("device unavailable, waiting for it before reconnecting");
            return;
        }

        let max = self.config.max_reconnect_attempts;
        if slot.attempts < max {
            slot.attempts += 1;
            let attempt = slot.attempts;
            let delay = self.config.reconnect_delay;
            let manager = Arc::downgrade(self);
            slot.reconnect = Some(self.scheduler.schedule_once(delay, move || async move {
                if let Some(inner) = manager.upgrade() {
                    drop(inner.slot().reconnect.take());
                    inner.connect();
                }
            }));
            drop(slot);

            self.state.send_replace(ConnectionState::Closed);
            info!(attempt, max, delay_ms = delay.as_millis(), "state socket closed, reconnecting");
            return;
        }
        drop(slot);

        let message = format!("Lost connection to the device after {max} reconnect attempts");
        error!(attempts = max, "giving up on the state socket");
        self.state.send_replace(ConnectionState::Idle);
        self.error.send_replace(Some(message.clone()));
        self.fan_out(&ConnectionEvent::Error(message));
    }

    /// Transport errors are only logged; a rejected token is evicted so the
    /// next attempt goes out without it.
    fn on_socket_error(&self, error: &boneio_api::Error) {
        if error.is_unauthorized() {
            self.auth.evict();
        }
    }

    /// Drop the socket and every pending timer, and reset the counters.
    fn teardown(&self, reason: &str) {
        let session = {
            let mut slot = self.slot();
            slot.generation = slot.generation.wrapping_add(1);
            slot.attempts = 0;
            slot.connecting = false;
            slot.outgoing = None;
            slot.heartbeat = None;
            slot.debounce = None;
            slot.reconnect = None;
            slot.session.take()
        };
        if let Some(session) = session {
            session.cancel();
        }
        self.state.send_replace(ConnectionState::Idle);
        debug!(reason, "state connection torn down");
    }

    fn unsubscribe(&self, id: u64) {
        let remaining = {
            let mut listeners = self.listeners();
            listeners.shift_remove(&id);
            listeners.len()
        };
        debug!(subscriber = id, remaining, "listener removed");
        if remaining == 0 {
            self.teardown("last listener left");
        }
    }

    // ── Inbound frames ───────────────────────────────────────────

    fn dispatch(&self, text: &str) {
        match websocket::parse_frame(text) {
            Ok(Inbound::Pong) => trace!("heartbeat reply"),
            Ok(Inbound::Update(update)) => {
                self.fan_out(&ConnectionEvent::Update(Arc::new(update)));
            }
            Err(e) => {
                self.dropped_frames.fetch_add(1, Ordering::Relaxed);
                debug!(error = %e, "dropping malformed state frame");
            }
        }
    }

    /// Deliver `event` to every listener registered at the start of the
    /// call that is still registered when its turn comes.
    fn fan_out(&self, event: &ConnectionEvent) {
        let snapshot: Vec<(u64, Listener)> = self
            .listeners()
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect();

        for (id, listener) in snapshot {
            if !self.listeners().contains_key(&id) {
                continue;
            }
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!(subscriber = id, "listener panicked, continuing delivery");
            }
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Pump one socket: outgoing frames from the heartbeat, incoming frames to
/// the listeners. Ends on close, error, or teardown.
async fn run_session(
    manager: Weak<ManagerInner>,
    generation: u64,
    socket: StateSocket,
    mut outgoing: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    let StateSocket {
        mut sink,
        mut stream,
    } = socket;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = tokio::time::timeout(CLOSE_GRACE, sink.close()).await;
                return;
            }
            Some(frame) = outgoing.recv() => {
                if let Err(e) = sink.send(frame).await {
                    warn!(error = %e, "failed to send on state socket");
                    break;
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(text)) => {
                    let Some(inner) = manager.upgrade() else {
                        return;
                    };
                    inner.dispatch(&text);
                }
                Some(Err(e)) => {
                    warn!(error = %e, "state socket error");
                    if let Some(inner) = manager.upgrade() {
                        inner.on_socket_error(&e);
                    }
                    break;
                }
                None => {
                    debug!("state socket closed by device");
                    break;
                }
            },
        }
    }

    if let Some(inner) = manager.upgrade() {
        inner.on_close(generation);
    }
}

/// Follow availability: tear down when the device goes away, reconnect
/// when it comes back.
async fn supervise_availability(
    manager: Weak<ManagerInner>,
    mut availability: watch::Receiver<AvailabilityState>,
    cancel: CancellationToken,
) {
    let mut was_available = availability.borrow_and_update().is_available;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = availability.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        let is_available = availability.borrow_and_update().is_available;
        if is_available == was_available {
            continue;
        }
        was_available = is_available;

        let Some(inner) = manager.upgrade() else {
            break;
        };
        if is_available {
            info!("device available, resuming state connection");
            inner.ensure_connection();
        } else {
            warn!("device unavailable, dropping state connection");
            inner.teardown("device unavailable");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
