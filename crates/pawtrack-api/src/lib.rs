// pawtrack-api: Async Rust client for the pet tracking backend (REST + Socket.IO push)

pub mod auth;
pub mod error;
pub mod models;
pub mod push;
pub mod rest;
pub mod socketio;
pub mod transport;

pub use auth::{BearerSource, StaticToken};
pub use error::Error;
pub use push::{
    ConnectivityState, EventKind, LinkPhase, PushChannel, PushConfig, PushEvent, ReconnectConfig,
};
pub use rest::RestClient;
pub use transport::{TlsMode, TransportConfig};
