//! Data-plane handlers: the write path (PutRecord, PutRecords) and the read
//! path (GetShardIterator, GetRecords).
//!
//! ## Write path
//!
//! Routing picks the unique open shard whose hash-key range contains the
//! routed key: the explicit hash key when the caller set one, else MD5 of
//! the partition key. Admission then runs through the shard's token buckets
//! record-by-record: PutRecord surfaces a refusal as the top-level error,
//! PutRecords reports it per entry and keeps going, preserving request
//! order in the response.
//!
//! ## Read path
//!
//! Iterators are signed tokens resolved against the shard's records at read
//! time. GetRecords caps a response at min(Limit, 10000) records and 10 MiB
//! of payload and renews the iterator. Once a closed shard is exhausted it
//! returns a null NextShardIterator together with the child shards, so
//! resharding-aware clients can hop lineages.

use super::{readable_stream, OpCtx};
use crate::api::*;
use crate::scheduler::DelayedTransition;
use crate::store::RegionState;
use crate::token::{self, IteratorPosition, ShardIterator, TOKEN_TTL_MS};
use crate::validation::Validator;
use bytes::Bytes;
use kinesis_mock_core::record::MAX_DATA_BYTES;
use kinesis_mock_core::shard::partition_key_hash;
use kinesis_mock_core::{EncryptionType, KinesisError, Result, SequenceNumber};
use tracing::debug;

/// Most records a single GetRecords response may carry.
const GET_RECORDS_MAX: usize = 10_000;
/// Most payload bytes a single GetRecords response may carry (10 MiB).
const GET_RECORDS_MAX_BYTES: usize = 10 * 1024 * 1024;
/// Most entries a single PutRecords request may carry.
const PUT_RECORDS_MAX_ENTRIES: usize = 500;

fn encryption_name(encryption: EncryptionType) -> Option<String> {
    match encryption {
        EncryptionType::None => None,
        EncryptionType::Kms => Some("KMS".to_string()),
    }
}

/// Shape checks shared by PutRecord and each PutRecords entry. `prefix` is
/// empty for PutRecord and `Records.N.` for batch entries.
fn validate_entry(
    v: &mut Validator,
    prefix: &str,
    data: &Option<Bytes>,
    partition_key: &Option<String>,
    explicit_hash_key: &Option<String>,
) -> Option<u128> {
    match data {
        None => v.error(format!("{}Data is required", prefix)),
        Some(data) if data.len() > MAX_DATA_BYTES => v.error(format!(
            "{}Data must be at most {} bytes",
            prefix, MAX_DATA_BYTES
        )),
        Some(_) => {}
    }
    match partition_key {
        None => v.error(format!("{}PartitionKey is required", prefix)),
        Some(key) if key.is_empty() || key.len() > 256 => v.error(format!(
            "{}PartitionKey must be between 1 and 256 characters",
            prefix
        )),
        Some(_) => {}
    }
    v.hash_key(
        &format!("{}ExplicitHashKey", prefix),
        explicit_hash_key.as_deref(),
    )
}

pub fn put_record(
    state: &mut RegionState,
    req: &PutRecordRequest,
    ctx: &OpCtx,
) -> Result<(PutRecordResponse, Vec<DelayedTransition>)> {
    let mut v = Validator::new();
    let stream_name = v.required_name("StreamName", req.stream_name.as_deref());
    let explicit = validate_entry(&mut v, "", &req.data, &req.partition_key, &req.explicit_hash_key);
    if let Some(seq) = req.sequence_number_for_ordering.as_deref() {
        v.check(
            SequenceNumber::parse(seq).is_ok(),
            "SequenceNumberForOrdering is not a valid sequence number",
        );
    }
    v.finish()?;
    let data = req.data.clone().unwrap_or_default();
    let partition_key = req.partition_key.clone().unwrap_or_default();

    let stream = state.stream(&stream_name)?;
    stream.require_active()?;
    let encryption = stream.encryption_type;

    let hash_key = explicit.unwrap_or_else(|| partition_key_hash(&partition_key));
    let shard_id = stream
        .shard_for_hash_key(hash_key)
        .map(|s| s.shard_id.clone())
        .ok_or_else(|| {
            KinesisError::InternalFailure(format!(
                "no open shard owns hash key {} in stream {}",
                hash_key, stream_name
            ))
        })?;

    let payload = data.len() + partition_key.len();
    if !state
        .throttles
        .shard(&stream_name, &shard_id, ctx.now_ms)
        .try_write(payload, ctx.now_ms)
    {
        return Err(KinesisError::ProvisionedThroughputExceeded(format!(
            "Rate exceeded for shard {} in stream {} under account {}.",
            shard_id, stream_name, state.account_id
        )));
    }

    let account_id = state.account_id.clone();
    let shard = state
        .stream_mut(&stream_name)?
        .find_shard_mut(&shard_id)
        .ok_or_else(|| KinesisError::shard_not_found(&shard_id, &stream_name))?;
    let sequence_number = shard.append(data, partition_key, encryption, ctx.now_ms)?;
    debug!(stream = %stream_name, shard = %shard_id, account = %account_id, "put record");

    Ok((
        PutRecordResponse {
            shard_id,
            sequence_number: sequence_number.to_string(),
            encryption_type: encryption_name(encryption),
        },
        Vec::new(),
    ))
}

pub fn put_records(
    state: &mut RegionState,
    req: &PutRecordsRequest,
    ctx: &OpCtx,
) -> Result<(PutRecordsResponse, Vec<DelayedTransition>)> {
    let mut v = Validator::new();
    let stream_name = v.required_name("StreamName", req.stream_name.as_deref());
    let mut explicit_keys: Vec<Option<u128>> = Vec::new();
    match &req.records {
        None => v.error("Records is required"),
        Some(entries) if entries.is_empty() => v.error("Records must not be empty"),
        Some(entries) if entries.len() > PUT_RECORDS_MAX_ENTRIES => v.error(format!(
            "Records must have at most {} entries",
            PUT_RECORDS_MAX_ENTRIES
        )),
        Some(entries) => {
            for (i, entry) in entries.iter().enumerate() {
                explicit_keys.push(validate_entry(
                    &mut v,
                    &format!("Records.{}.", i),
                    &entry.data,
                    &entry.partition_key,
                    &entry.explicit_hash_key,
                ));
            }
        }
    }
    v.finish()?;
    let entries = req.records.as_deref().unwrap_or_default();

    let stream = state.stream(&stream_name)?;
    stream.require_active()?;
    let encryption = stream.encryption_type;

    // Route every entry up front against the stable topology, then admit
    // and append one at a time so per-entry throttling preserves order.
    let routed: Vec<(String, usize)> = entries
        .iter()
        .zip(&explicit_keys)
        .map(|(entry, explicit)| {
            let partition_key = entry.partition_key.as_deref().unwrap_or_default();
            let hash_key = explicit.unwrap_or_else(|| partition_key_hash(partition_key));
            let shard_id = stream
                .shard_for_hash_key(hash_key)
                .map(|s| s.shard_id.clone())
                .ok_or_else(|| {
                    KinesisError::InternalFailure(format!(
                        "no open shard owns hash key {} in stream {}",
                        hash_key, stream_name
                    ))
                })?;
            let payload =
                entry.data.as_ref().map(|d| d.len()).unwrap_or(0) + partition_key.len();
            Ok((shard_id, payload))
        })
        .collect::<Result<_>>()?;

    let RegionState {
        streams,
        throttles,
        account_id,
        ..
    } = state;
    let stream = streams
        .get_mut(&stream_name)
        .ok_or_else(|| KinesisError::stream_not_found(&stream_name, account_id))?;

    let mut results = Vec::with_capacity(entries.len());
    let mut failed = 0u32;
    for (entry, (shard_id, payload)) in entries.iter().zip(&routed) {
        if !throttles
            .shard(&stream_name, shard_id, ctx.now_ms)
            .try_write(*payload, ctx.now_ms)
        {
            failed += 1;
            results.push(PutRecordsResultEntry {
                sequence_number: None,
                shard_id: None,
                error_code: Some("ProvisionedThroughputExceededException".to_string()),
                error_message: Some(format!(
                    "Rate exceeded for shard {} in stream {} under account {}.",
                    shard_id, stream_name, account_id
                )),
            });
            continue;
        }
        let shard = stream
            .find_shard_mut(shard_id)
            .ok_or_else(|| KinesisError::shard_not_found(shard_id, &stream_name))?;
        let sequence_number = shard.append(
            entry.data.clone().unwrap_or_default(),
            entry.partition_key.clone().unwrap_or_default(),
            encryption,
            ctx.now_ms,
        )?;
        results.push(PutRecordsResultEntry {
            sequence_number: Some(sequence_number.to_string()),
            shard_id: Some(shard_id.clone()),
            error_code: None,
            error_message: None,
        });
    }
    debug!(
        stream = %stream_name,
        total = entries.len(),
        failed,
        "put records batch"
    );

    Ok((
        PutRecordsResponse {
            failed_record_count: failed,
            records: results,
            encryption_type: encryption_name(encryption),
        },
        Vec::new(),
    ))
}

pub fn get_shard_iterator(
    state: &RegionState,
    req: &GetShardIteratorRequest,
    ctx: &OpCtx,
) -> Result<GetShardIteratorResponse> {
    let mut v = Validator::new();
    let stream_name = v.required_name("StreamName", req.stream_name.as_deref());
    let shard_id = v.required_string("ShardId", req.shard_id.as_deref());
    let iterator_type = v.required_string("ShardIteratorType", req.shard_iterator_type.as_deref());
    match iterator_type.as_str() {
        "AT_SEQUENCE_NUMBER" | "AFTER_SEQUENCE_NUMBER" => v.check(
            req.starting_sequence_number.is_some(),
            "StartingSequenceNumber is required for sequence-based iterator types",
        ),
        "AT_TIMESTAMP" => v.check(
            req.timestamp.is_some(),
            "Timestamp is required for AT_TIMESTAMP",
        ),
        "TRIM_HORIZON" | "LATEST" | "" => {}
        other => v.error(format!("ShardIteratorType {} is not valid", other)),
    }
    v.finish()?;

    let stream = readable_stream(state, &stream_name)?;
    let shard = stream
        .find_shard(&shard_id)
        .ok_or_else(|| KinesisError::shard_not_found(&shard_id, &stream_name))?;

    let position = match iterator_type.as_str() {
        "TRIM_HORIZON" => IteratorPosition::TrimHorizon,
        "LATEST" => match shard.records.last() {
            Some(last) => IteratorPosition::AfterSequence(last.sequence_number),
            // Empty shard: everything still to come is "after latest".
            None => IteratorPosition::TrimHorizon,
        },
        "AT_TIMESTAMP" => IteratorPosition::AtTimestamp(
            req.timestamp
                .ok_or_else(|| KinesisError::InvalidArgument("Timestamp is required".to_string()))?,
        ),
        kind @ ("AT_SEQUENCE_NUMBER" | "AFTER_SEQUENCE_NUMBER") => {
            let raw = req
                .starting_sequence_number
                .as_deref()
                .ok_or_else(|| {
                    KinesisError::InvalidArgument("StartingSequenceNumber is required".to_string())
                })?;
            let seq = SequenceNumber::parse(raw).map_err(|e| {
                KinesisError::InvalidArgument(format!("StartingSequenceNumber: {}", e))
            })?;
            if seq.parts().shard_index != shard.index {
                return Err(KinesisError::InvalidArgument(format!(
                    "StartingSequenceNumber {} does not belong to shard {}",
                    raw, shard_id
                )));
            }
            if kind == "AT_SEQUENCE_NUMBER" {
                IteratorPosition::AtSequence(seq)
            } else {
                IteratorPosition::AfterSequence(seq)
            }
        }
        other => {
            return Err(KinesisError::InvalidArgument(format!(
                "ShardIteratorType {} is not valid",
                other
            )))
        }
    };

    Ok(GetShardIteratorResponse {
        shard_iterator: token::sign(&ShardIterator {
            stream_name,
            shard_id,
            position,
            issued_at_ms: ctx.now_ms,
        }),
    })
}

pub fn get_records(
    state: &mut RegionState,
    req: &GetRecordsRequest,
    ctx: &OpCtx,
) -> Result<(GetRecordsResponse, Vec<DelayedTransition>)> {
    let mut v = Validator::new();
    let raw_iterator = v.required_string("ShardIterator", req.shard_iterator.as_deref());
    v.range_i64("Limit", req.limit, 1, GET_RECORDS_MAX as i64);
    v.finish()?;
    let limit = req.limit.unwrap_or(GET_RECORDS_MAX as i64) as usize;

    let iterator: ShardIterator = token::verify(&raw_iterator)
        .map_err(|_| KinesisError::InvalidArgument("ShardIterator is invalid".to_string()))?;
    if ctx.now_ms - iterator.issued_at_ms > TOKEN_TTL_MS {
        return Err(KinesisError::ExpiredIterator(format!(
            "Iterator expired. Iterators are valid for {} seconds after issuance.",
            TOKEN_TTL_MS / 1000
        )));
    }

    // Reading consumes the shard's read quota, so this runs as a mutation.
    if !state
        .throttles
        .shard(&iterator.stream_name, &iterator.shard_id, ctx.now_ms)
        .try_read(ctx.now_ms)
    {
        return Err(KinesisError::ProvisionedThroughputExceeded(format!(
            "Rate exceeded for shard {} in stream {} under account {}.",
            iterator.shard_id, iterator.stream_name, state.account_id
        )));
    }

    let stream = readable_stream(state, &iterator.stream_name)?;
    let shard = stream
        .find_shard(&iterator.shard_id)
        .ok_or_else(|| KinesisError::shard_not_found(&iterator.shard_id, &iterator.stream_name))?;

    let start = match iterator.position {
        IteratorPosition::TrimHorizon => 0,
        IteratorPosition::AtSequence(seq) => shard.first_index_by_sequence(seq, true),
        IteratorPosition::AfterSequence(seq) => shard.first_index_by_sequence(seq, false),
        IteratorPosition::AtTimestamp(ts) => shard.first_index_by_timestamp(ts),
    };

    let mut records = Vec::new();
    let mut total_bytes = 0usize;
    for record in shard.records.iter().skip(start) {
        if records.len() >= limit {
            break;
        }
        if !records.is_empty() && total_bytes + record.data.len() > GET_RECORDS_MAX_BYTES {
            break;
        }
        total_bytes += record.data.len();
        records.push(RecordDto {
            sequence_number: record.sequence_number.to_string(),
            approximate_arrival_timestamp: record.approximate_arrival_timestamp_ms,
            data: record.data.clone(),
            partition_key: record.partition_key.clone(),
            encryption_type: match record.encryption_type {
                EncryptionType::None => None,
                EncryptionType::Kms => Some("KMS".to_string()),
            },
        });
    }

    let consumed_through = start + records.len();
    let exhausted_closed = !shard.is_open() && consumed_through >= shard.records.len();

    // Lag is distance from the shard's tip (the newest record it holds),
    // not from whatever the limit windowed into this response.
    let millis_behind_latest = match shard.records.last() {
        Some(tip) if consumed_through < shard.records.len() => {
            (ctx.now_ms - tip.approximate_arrival_timestamp_ms).max(0)
        }
        _ => 0,
    };

    let next_shard_iterator = if exhausted_closed {
        None
    } else {
        let position = match records.last() {
            Some(last) => IteratorPosition::AfterSequence(
                SequenceNumber::parse(&last.sequence_number)
                    .map_err(|e| KinesisError::InternalFailure(e.to_string()))?,
            ),
            None => iterator.position,
        };
        Some(token::sign(&ShardIterator {
            stream_name: iterator.stream_name.clone(),
            shard_id: iterator.shard_id.clone(),
            position,
            issued_at_ms: ctx.now_ms,
        }))
    };

    let child_shards = if exhausted_closed {
        Some(
            stream
                .child_shards_of(&iterator.shard_id)
                .into_iter()
                .map(ChildShardDto::from)
                .collect(),
        )
    } else {
        None
    };

    Ok((
        GetRecordsResponse {
            records,
            next_shard_iterator,
            millis_behind_latest,
            child_shards,
        },
        Vec::new(),
    ))
}
