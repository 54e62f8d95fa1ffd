//! Kinesis emulator state engine
//!
//! Everything between the wire and the model lives here:
//!
//! - [`cache`]: the coordinator: region map, union API, scheduling loop
//! - [`store`]: the per-region consistency boundary
//! - [`ops`]: one handler per API operation
//! - [`scheduler`]: delayed transitions modeling eventual consistency
//! - [`throttle`]: per-shard throughput quotas
//! - [`token`]: signed shard iterators and pagination tokens
//! - [`api`]: wire-shaped request/response DTOs
//! - [`snapshot`]: whole-engine persistence
//! - [`clock`]: the injected time source ([`clock::ManualClock`] for tests)
//!
//! The server crate owns HTTP, TLS, and the JSON/CBOR codecs; this crate
//! never reads a socket and only touches the filesystem through
//! [`snapshot`].

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod ops;
pub mod scheduler;
pub mod snapshot;
pub mod store;
pub mod throttle;
pub mod token;
pub mod validation;

pub use cache::Cache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use snapshot::Snapshot;
