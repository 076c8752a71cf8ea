// boneio-api: Async Rust client for the boneIO device web API and state socket

mod auth;
pub mod client;
mod control;
pub mod error;
mod files;
pub mod models;
mod system;
pub mod transport;
pub mod websocket;

pub use client::BoneioClient;
pub use error::Error;
pub use models::{
    CoverAction, CoverState, FileItem, FileKind, InputState, LogEntry, OutputState, SensorState,
    StateUpdate, StatusResponse, UpdateInfo,
};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{Inbound, StateSocket};
