//! Core model for the Kinesis emulator
//!
//! This crate holds everything the engine and server agree on but that has no
//! behavior of its own scheduling or I/O:
//!
//! - **Model types**: streams, shards, records, consumers ([`stream`],
//!   [`shard`], [`record`])
//! - **Sequence numbers**: the deterministic codec behind the opaque decimal
//!   strings handed to clients ([`sequence`])
//! - **Shard arithmetic**: 128-bit hash-key partitioning and split/merge
//!   geometry ([`shard`])
//! - **Errors**: the AWS-visible error taxonomy ([`error`])
//! - **ARNs**: construction and parsing of stream/consumer ARNs ([`arn`])
//!
//! Nothing in here touches the network, the filesystem, or a clock. The
//! engine crate owns time and concurrency; this crate owns the invariants.

pub mod arn;
pub mod error;
pub mod record;
pub mod sequence;
pub mod shard;
pub mod stream;

pub use error::{KinesisError, Result};
pub use record::Record;
pub use sequence::{SequenceNumber, SequenceParts};
pub use shard::{HashKeyRange, SequenceNumberRange, Shard};
pub use stream::{
    Consumer, ConsumerStatus, EncryptionType, ShardLevelMetric, Stream, StreamMode, StreamStatus,
};
