//! Kinesis emulator server
//!
//! The thin shell around the engine: HTTP/TLS listeners, the JSON/CBOR wire
//! codec, environment-driven configuration, boot-time stream creation, and
//! the periodic snapshot loop. Everything stateful lives in
//! `kinesis-mock-engine`; this crate only moves bytes and schedules
//! background tasks.

pub mod config;
pub mod init;
pub mod persistence;
pub mod routes;
pub mod tls;
pub mod wire;

pub use config::ServerConfig;
pub use routes::{create_router, AppState};
