//! Realtime device-state synchronization for boneIO consoles.
//!
//! `boneio-core` sits between [`boneio_api`] and anything that shows device
//! state to a person. It keeps one WebSocket per device, shares it between
//! any number of listeners, and keeps it alive across reconnect storms,
//! heartbeat failures, expired sessions and devices dropping off the
//! network.
//!
//! The moving parts:
//!
//! - [`Scheduler`]: every timer in the crate, cancellable as a group.
//! - [`AvailabilityProber`]: periodic `GET /api/version` liveness checks.
//! - [`AuthSession`]: the bearer credential, its persistence through a
//!   [`TokenStore`], and eviction on any 401.
//! - [`ConnectionManager`]: the shared socket. Opens on the first
//!   listener, closes after the last one, reconnects at a constant pace up
//!   to a fixed budget.
//! - [`EntityTables`] / [`EntityStore`]: pure last-write-wins tables per
//!   entity kind, with no-op updates leaving storage untouched.
//! - [`Console`]: wires the above for one device and routes [`Command`]s.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use boneio_core::{Console, ConsoleConfig, MemoryTokenStore};
//!
//! let config = ConsoleConfig::new("http://boneio.local:8090".parse()?);
//! let console = Console::new(config, Arc::new(MemoryTokenStore::new()))?;
//! console.start().await;
//!
//! let mut state = console.watch_state();
//! while let Some(tables) = state.changed().await {
//!     for output in &tables.outputs {
//!         println!("{} = {}", output.name, output.state);
//!     }
//! }
//! ```

pub mod auth;
pub mod availability;
pub mod command;
pub mod config;
pub mod connection;
pub mod console;
pub mod error;
pub mod scheduler;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use auth::{AuthSession, AuthState, MemoryTokenStore, TokenStore};
pub use availability::{AvailabilityProber, AvailabilityState, LivenessProbe};
pub use command::{Command, CommandResult};
pub use config::{ConnectionConfig, ConsoleConfig, ProbeConfig, TlsVerification};
pub use connection::{
    ConnectRequest, ConnectionEvent, ConnectionManager, ConnectionState, Connector, Subscription,
    WsConnector,
};
pub use console::Console;
pub use error::CoreError;
pub use scheduler::{Scheduler, TimerHandle};
pub use store::{Entity, EntityStore, EntityTable, EntityTables};
pub use stream::{StateStream, StateWatch};

// Wire types consumers need alongside the core API.
pub use boneio_api::{
    CoverAction, CoverState, FileItem, FileKind, InputState, LogEntry, OutputState, SensorState,
    StateUpdate, StatusResponse, UpdateInfo,
};
