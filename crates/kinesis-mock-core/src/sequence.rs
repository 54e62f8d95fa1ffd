//! Sequence-Number Codec
//!
//! Kinesis hands clients sequence numbers as opaque decimal strings, but the
//! emulator needs to read positions back out of them: `GetShardIterator`
//! round-trips a sequence number into a shard position, and snapshot/restore
//! must re-derive allocation state. So the strings carry a fixed internal
//! structure.
//!
//! ## Layout
//!
//! Every sequence number packs into one `u128`:
//!
//! ```text
//! bit 127                                                            bit 0
//! ┌─────────┬─────────────┬────────────┬──────────────┬──────────┬──────┐
//! │ version │ shard index │ byte offset│ sub-sequence │ creation │ rsvd │
//! │ 4 bits  │ 32 bits     │ 40 bits    │ 16 bits      │ 32 bits  │ 4    │
//! └─────────┴─────────────┴────────────┴──────────────┴──────────┴──────┘
//! ```
//!
//! - **version** is always 2; it pins the top nibble so every encoding
//!   renders to exactly 38 decimal digits, which makes lexicographic
//!   comparison of the strings agree with numeric comparison.
//! - **shard index** is the ordinal of the shard within its stream.
//! - **byte offset** is the cumulative payload length appended to the shard
//!   before this record (up to 1 TiB per shard).
//! - **sub-sequence** disambiguates records that land on the same byte
//!   offset (zero-length payloads).
//! - **creation** is the shard's creation time in unix seconds.
//!
//! Ordering: the field order places (shard index, byte offset, sub-sequence)
//! in the most significant bits, so `u128` comparison (and therefore
//! decimal-string comparison) orders records exactly by allocation order
//! within a shard.
//!
//! The layout is an internal contract: it must stay fixed within a release
//! so that snapshots restore into an identical allocation state.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Version nibble stamped into every encoded sequence number.
pub const SEQUENCE_VERSION: u8 = 2;

const VERSION_SHIFT: u32 = 124;
const INDEX_SHIFT: u32 = 92;
const OFFSET_SHIFT: u32 = 52;
const SUB_SHIFT: u32 = 36;
const DATE_SHIFT: u32 = 4;

const INDEX_MASK: u128 = (1 << 32) - 1;
const OFFSET_MASK: u128 = (1 << 40) - 1;
const SUB_MASK: u128 = (1 << 16) - 1;
const DATE_MASK: u128 = (1 << 32) - 1;

/// Number of decimal digits of every encoded sequence number. The version
/// nibble keeps all values inside [2·2^124, 3·2^124), which spans no
/// power-of-ten boundary.
pub const SEQUENCE_DIGITS: usize = 38;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequenceError {
    #[error("sequence number is not a decimal integer: {0}")]
    NotDecimal(String),

    #[error("sequence number has unsupported version {0}")]
    UnsupportedVersion(u8),

    #[error("byte offset {0} exceeds the 40-bit field")]
    ByteOffsetOverflow(u64),
}

/// The structured fields of a sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceParts {
    pub shard_index: u32,
    pub byte_offset: u64,
    pub sub_sequence: u16,
    pub shard_creation_secs: u32,
}

/// An allocated sequence number. Compares by (shard index, byte offset,
/// sub-sequence) and renders as the 38-digit decimal string clients see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceNumber(u128);

impl SequenceNumber {
    /// Pack the structured fields. Fails only if the byte offset exceeds its
    /// 40-bit field (a shard would have to hold over 1 TiB of payload).
    pub fn encode(parts: SequenceParts) -> Result<Self, SequenceError> {
        if u128::from(parts.byte_offset) > OFFSET_MASK {
            return Err(SequenceError::ByteOffsetOverflow(parts.byte_offset));
        }
        let value = (u128::from(SEQUENCE_VERSION) << VERSION_SHIFT)
            | (u128::from(parts.shard_index) << INDEX_SHIFT)
            | (u128::from(parts.byte_offset) << OFFSET_SHIFT)
            | (u128::from(parts.sub_sequence) << SUB_SHIFT)
            | (u128::from(parts.shard_creation_secs) << DATE_SHIFT);
        Ok(Self(value))
    }

    /// Unpack the structured fields.
    pub fn parts(&self) -> SequenceParts {
        SequenceParts {
            shard_index: ((self.0 >> INDEX_SHIFT) & INDEX_MASK) as u32,
            byte_offset: ((self.0 >> OFFSET_SHIFT) & OFFSET_MASK) as u64,
            sub_sequence: ((self.0 >> SUB_SHIFT) & SUB_MASK) as u16,
            shard_creation_secs: ((self.0 >> DATE_SHIFT) & DATE_MASK) as u32,
        }
    }

    /// Parse a client-supplied decimal string, rejecting values this codec
    /// could not have produced.
    pub fn parse(s: &str) -> Result<Self, SequenceError> {
        let value = u128::from_str(s).map_err(|_| SequenceError::NotDecimal(s.to_string()))?;
        let version = (value >> VERSION_SHIFT) as u8;
        if version != SEQUENCE_VERSION {
            return Err(SequenceError::UnsupportedVersion(version));
        }
        Ok(Self(value))
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SequenceNumber {
    type Err = SequenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// Sequence numbers cross the wire and the snapshot file as their decimal
// strings, never as raw integers.
impl Serialize for SequenceNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SequenceNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
