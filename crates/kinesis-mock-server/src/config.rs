//! Server Configuration
//!
//! All configuration comes from environment variables, with defaults that
//! make a bare `kinesis-mock` useful immediately:
//!
//! ## Identity & limits
//! - `AWS_ACCOUNT_ID`: account stamped into ARNs (default: 000000000000)
//! - `AWS_REGION`: default region for requests that carry none (default: us-east-1)
//! - `SHARD_LIMIT`: per-account open-shard limit (default: 50)
//! - `ON_DEMAND_STREAM_COUNT_LIMIT`: concurrent ON_DEMAND streams (default: 10)
//!
//! ## Transition delays
//! - `CREATE_STREAM_DURATION_MS`: CREATING → ACTIVE (default: 500)
//! - `DELETE_STREAM_DURATION_MS`: DELETING → removed (default: 500)
//! - `UPDATE_STREAM_DURATION_MS`: UPDATING → ACTIVE (default: 500)
//!
//! ## Persistence
//! - `SHOULD_PERSIST_DATA`: enable the snapshot loop (default: false)
//! - `PERSIST_INTERVAL_MS`: time between snapshots (default: 5000)
//! - `PERSIST_PATH`: snapshot file path (default: ./data/kinesis-mock.snapshot)
//! - `LOAD_DATA_IF_EXISTS`: restore the snapshot on boot (default: true)
//!
//! ## Boot-time streams
//! - `INITIALIZE_STREAMS`: comma-separated `name:shardCount[:region]`
//!   entries created before serving, e.g. `orders:4,clicks:2:eu-west-1`
//!
//! ## Listeners & logging
//! - `PLAIN_PORT`: HTTP listener (default: 4568)
//! - `TLS_PORT`: HTTPS listener (default: 4567)
//! - `TLS_CERT_PATH` / `TLS_KEY_PATH`: PEM files; the TLS listener starts
//!   only when both are set
//! - `LOG_LEVEL`: tracing filter directive (default: info)

use kinesis_mock_engine::EngineConfig;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Snapshot-loop settings.
#[derive(Debug, Clone)]
pub struct PersistConfig {
    pub should_persist: bool,
    pub interval_ms: u64,
    pub path: PathBuf,
    pub load_if_exists: bool,
}

/// One `INITIALIZE_STREAMS` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitStream {
    pub name: String,
    pub shard_count: u32,
    pub region: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub engine: EngineConfig,
    pub persist: PersistConfig,
    pub initialize_streams: Vec<InitStream>,
    pub plain_port: u16,
    pub tls_port: u16,
    pub tls_cert_path: Option<PathBuf>,
    pub tls_key_path: Option<PathBuf>,
    pub log_level: String,
}

fn env_string(name: &'static str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
            name,
            value: raw,
            reason: format!("expected a {}", std::any::type_name::<T>()),
        }),
    }
}

fn env_bool(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(ConfigError::Invalid {
                name,
                value: raw,
                reason: "expected true or false".to_string(),
            }),
        },
    }
}

/// Parse `name:shardCount[:region]` entries.
pub fn parse_initialize_streams(raw: &str) -> Result<Vec<InitStream>, ConfigError> {
    let invalid = |value: &str, reason: &str| ConfigError::Invalid {
        name: "INITIALIZE_STREAMS",
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let mut streams = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let mut parts = entry.split(':');
        let name = parts
            .next()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| invalid(entry, "missing stream name"))?;
        let shard_count = parts
            .next()
            .ok_or_else(|| invalid(entry, "missing shard count"))?
            .parse::<u32>()
            .map_err(|_| invalid(entry, "shard count is not a number"))?;
        if shard_count == 0 {
            return Err(invalid(entry, "shard count must be positive"));
        }
        let region = parts.next().map(str::to_string);
        if parts.next().is_some() {
            return Err(invalid(entry, "too many fields"));
        }
        streams.push(InitStream {
            name: name.to_string(),
            shard_count,
            region,
        });
    }
    Ok(streams)
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let engine = EngineConfig {
            account_id: env_string("AWS_ACCOUNT_ID", "000000000000"),
            default_region: env_string("AWS_REGION", "us-east-1"),
            shard_limit: env_parse("SHARD_LIMIT", 50)?,
            on_demand_stream_count_limit: env_parse("ON_DEMAND_STREAM_COUNT_LIMIT", 10)?,
            create_stream_duration_ms: env_parse("CREATE_STREAM_DURATION_MS", 500)?,
            delete_stream_duration_ms: env_parse("DELETE_STREAM_DURATION_MS", 500)?,
            update_stream_duration_ms: env_parse("UPDATE_STREAM_DURATION_MS", 500)?,
            retention_gc_interval_ms: env_parse("RETENTION_GC_INTERVAL_MS", 60_000)?,
        };

        let persist = PersistConfig {
            should_persist: env_bool("SHOULD_PERSIST_DATA", false)?,
            interval_ms: env_parse("PERSIST_INTERVAL_MS", 5_000)?,
            path: PathBuf::from(env_string("PERSIST_PATH", "./data/kinesis-mock.snapshot")),
            load_if_exists: env_bool("LOAD_DATA_IF_EXISTS", true)?,
        };

        let initialize_streams =
            parse_initialize_streams(&env_string("INITIALIZE_STREAMS", ""))?;

        Ok(Self {
            engine,
            persist,
            initialize_streams,
            plain_port: env_parse("PLAIN_PORT", 4568)?,
            tls_port: env_parse("TLS_PORT", 4567)?,
            tls_cert_path: std::env::var("TLS_CERT_PATH").ok().map(PathBuf::from),
            tls_key_path: std::env::var("TLS_KEY_PATH").ok().map(PathBuf::from),
            log_level: env_string("LOG_LEVEL", "info"),
        })
    }
}
