//! Signed Opaque Tokens
//!
//! Shard iterators and pagination NextTokens are handed to clients as opaque
//! strings but must round-trip through the engine without any server-side
//! table: the token *is* the state. Each token is the bincode encoding of
//! its payload, prefixed with a 16-byte MD5 tag over a process-fixed secret
//! plus the payload, then base64url-encoded. Tampered or truncated tokens
//! fail verification before deserialization is attempted.
//!
//! Expiry is the caller's business: payloads carry `issued_at_ms` and the
//! handlers compare against the clock (300 s for both iterator kinds).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use kinesis_mock_core::sequence::SequenceNumber;
use md5::{Digest, Md5};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Iterators and next-tokens expire this long after issuance.
pub const TOKEN_TTL_MS: i64 = 300_000;

const SIGNING_SECRET: &[u8] = b"kinesis-mock/token-signing/v1";
const TAG_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is not valid base64")]
    Encoding,

    #[error("token failed signature verification")]
    BadSignature,

    #[error("token payload is malformed")]
    Malformed,
}

/// Where a shard iterator points. Resolved against the shard's records at
/// GetRecords time, so a LATEST iterator taken on an empty shard sees
/// records that arrive later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IteratorPosition {
    /// From the oldest stored record.
    TrimHorizon,
    /// From the record with exactly this sequence number.
    AtSequence(SequenceNumber),
    /// From the first record after this sequence number.
    AfterSequence(SequenceNumber),
    /// From the first record that arrived at or after this time.
    AtTimestamp(i64),
}

/// Payload of a shard iterator token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardIterator {
    pub stream_name: String,
    pub shard_id: String,
    pub position: IteratorPosition,
    pub issued_at_ms: i64,
}

/// Payload of a ListShards NextToken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardListToken {
    pub stream_name: String,
    pub exclusive_start_shard_id: String,
    pub max_results: u32,
    pub issued_at_ms: i64,
}

/// Payload of a ListStreamConsumers NextToken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerListToken {
    pub stream_name: String,
    pub exclusive_start_consumer: String,
    pub max_results: u32,
    pub issued_at_ms: i64,
}

fn tag(payload: &[u8]) -> [u8; TAG_LEN] {
    let mut hasher = Md5::new();
    hasher.update(SIGNING_SECRET);
    hasher.update(payload);
    hasher.finalize().into()
}

/// Sign and encode a token payload.
pub fn sign<T: Serialize>(payload: &T) -> String {
    let body = bincode::serialize(payload).expect("token payloads always serialize");
    let mut buf = Vec::with_capacity(TAG_LEN + body.len());
    buf.extend_from_slice(&tag(&body));
    buf.extend_from_slice(&body);
    URL_SAFE_NO_PAD.encode(buf)
}

/// Verify and decode a token produced by [`sign`].
pub fn verify<T: DeserializeOwned>(token: &str) -> Result<T, TokenError> {
    let raw = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| TokenError::Encoding)?;
    if raw.len() < TAG_LEN {
        return Err(TokenError::BadSignature);
    }
    let (got_tag, body) = raw.split_at(TAG_LEN);
    if got_tag != tag(body) {
        return Err(TokenError::BadSignature);
    }
    bincode::deserialize(body).map_err(|_| TokenError::Malformed)
}
