//! Stream lifecycle handlers: create, delete, describe, list, capacity mode.

use super::{readable_stream, stream_name_from_arn, OpCtx};
use crate::api::*;
use crate::scheduler::{DelayedTransition, Transition};
use crate::store::RegionState;
use crate::validation::Validator;
use kinesis_mock_core::{KinesisError, Result, Stream, StreamMode, StreamStatus};
use tracing::info;

/// Default shard count for ON_DEMAND streams, which carry no ShardCount.
const ON_DEMAND_DEFAULT_SHARDS: u32 = 4;

fn parse_mode(details: &Option<StreamModeDetailsDto>, v: &mut Validator) -> StreamMode {
    match details.as_ref().map(|d| d.stream_mode.as_str()) {
        None | Some("PROVISIONED") => StreamMode::Provisioned,
        Some("ON_DEMAND") => StreamMode::OnDemand,
        Some(other) => {
            v.error(format!(
                "StreamMode must be PROVISIONED or ON_DEMAND, got {}",
                other
            ));
            StreamMode::Provisioned
        }
    }
}

pub fn create_stream(
    state: &mut RegionState,
    req: &CreateStreamRequest,
    ctx: &OpCtx,
) -> Result<(EmptyResponse, Vec<DelayedTransition>)> {
    let mut v = Validator::new();
    let stream_name = v.required_name("StreamName", req.stream_name.as_deref());
    let mode = parse_mode(&req.stream_mode_details, &mut v);
    if mode == StreamMode::Provisioned {
        v.required_i64("ShardCount", req.shard_count);
        v.range_i64("ShardCount", req.shard_count, 1, 10_000);
    }
    v.finish()?;

    if state.streams.contains_key(&stream_name) {
        return Err(KinesisError::ResourceInUse(format!(
            "Stream {} already exists under account {}.",
            stream_name, state.account_id
        )));
    }

    let shard_count = match mode {
        StreamMode::Provisioned => req.shard_count.unwrap_or(1) as u32,
        StreamMode::OnDemand => ON_DEMAND_DEFAULT_SHARDS,
    };
    let per_stream = ctx.config.per_stream_shard_limit(mode == StreamMode::OnDemand);
    if shard_count > per_stream {
        return Err(KinesisError::LimitExceeded(format!(
            "ShardCount {} exceeds the per-stream limit of {}.",
            shard_count, per_stream
        )));
    }
    if state.total_open_shards() + shard_count > ctx.config.shard_limit {
        return Err(KinesisError::LimitExceeded(format!(
            "Creating {} shard(s) would exceed the account shard limit of {}.",
            shard_count, ctx.config.shard_limit
        )));
    }
    if mode == StreamMode::OnDemand
        && state.on_demand_stream_count() >= ctx.config.on_demand_stream_count_limit
    {
        return Err(KinesisError::LimitExceeded(format!(
            "Account already has {} ON_DEMAND streams (limit {}).",
            state.on_demand_stream_count(),
            ctx.config.on_demand_stream_count_limit
        )));
    }

    let stream = Stream::new(
        &stream_name,
        &state.region,
        &state.account_id,
        shard_count,
        mode,
        ctx.now_ms,
    );
    info!(stream = %stream_name, region = %state.region, shards = shard_count, "creating stream");
    state.streams.insert(stream_name.clone(), stream);

    let transitions = vec![DelayedTransition {
        region: state.region.clone(),
        due_at_ms: ctx.now_ms + ctx.config.create_stream_duration_ms as i64,
        transition: Transition::StreamToActive { stream_name },
    }];
    Ok((EmptyResponse {}, transitions))
}

pub fn delete_stream(
    state: &mut RegionState,
    req: &DeleteStreamRequest,
    ctx: &OpCtx,
) -> Result<(EmptyResponse, Vec<DelayedTransition>)> {
    let mut v = Validator::new();
    let stream_name = v.required_name("StreamName", req.stream_name.as_deref());
    v.finish()?;

    let stream = state.stream(&stream_name)?;
    match stream.status {
        // Deleting twice is accepted; the first delete already scheduled
        // removal.
        StreamStatus::Deleting => return Ok((EmptyResponse {}, Vec::new())),
        StreamStatus::Creating => {
            return Err(KinesisError::stream_not_active(
                &stream_name,
                stream.status.as_str(),
            ))
        }
        StreamStatus::Active | StreamStatus::Updating => {}
    }
    if !stream.consumers.is_empty() && !req.enforce_consumer_deletion.unwrap_or(false) {
        return Err(KinesisError::ResourceInUse(format!(
            "Stream {} has registered consumers; set EnforceConsumerDeletion to delete it.",
            stream_name
        )));
    }

    info!(stream = %stream_name, region = %state.region, "deleting stream");
    state.stream_mut(&stream_name)?.status = StreamStatus::Deleting;

    let transitions = vec![DelayedTransition {
        region: state.region.clone(),
        due_at_ms: ctx.now_ms + ctx.config.delete_stream_duration_ms as i64,
        transition: Transition::RemoveStream { stream_name },
    }];
    Ok((EmptyResponse {}, transitions))
}

pub fn describe_stream(
    state: &RegionState,
    req: &DescribeStreamRequest,
) -> Result<DescribeStreamResponse> {
    let mut v = Validator::new();
    let stream_name = v.required_name("StreamName", req.stream_name.as_deref());
    v.range_i64("Limit", req.limit, 1, 10_000);
    v.finish()?;

    let stream = readable_stream(state, &stream_name)?;
    let limit = req.limit.unwrap_or(100) as usize;
    let start = match &req.exclusive_start_shard_id {
        Some(id) => stream
            .shards
            .iter()
            .position(|s| s.shard_id == *id)
            .map(|i| i + 1)
            .unwrap_or(stream.shards.len()),
        None => 0,
    };
    let shards: Vec<ShardDto> = stream
        .shards
        .iter()
        .skip(start)
        .take(limit)
        .map(ShardDto::from)
        .collect();
    let has_more_shards = start + shards.len() < stream.shards.len();

    Ok(DescribeStreamResponse {
        stream_description: StreamDescriptionDto {
            stream_name: stream.stream_name.clone(),
            stream_arn: stream.stream_arn.clone(),
            stream_status: stream.status.as_str().to_string(),
            stream_mode_details: stream_mode_details(stream),
            shards,
            has_more_shards,
            retention_period_hours: stream.retention_period_hours,
            stream_creation_timestamp: stream.created_at_ms,
            enhanced_monitoring: enhanced_monitoring(stream),
            encryption_type: encryption_type_name(stream),
            key_id: stream.key_id.clone(),
        },
    })
}

pub fn describe_stream_summary(
    state: &RegionState,
    req: &DescribeStreamSummaryRequest,
) -> Result<DescribeStreamSummaryResponse> {
    let mut v = Validator::new();
    let stream_name = v.required_name("StreamName", req.stream_name.as_deref());
    v.finish()?;

    // The summary is the one describe that still answers for a DELETING
    // stream (pre-init polls it through every status).
    let stream = state.stream(&stream_name)?;
    Ok(DescribeStreamSummaryResponse {
        stream_description_summary: StreamDescriptionSummaryDto {
            stream_name: stream.stream_name.clone(),
            stream_arn: stream.stream_arn.clone(),
            stream_status: stream.status.as_str().to_string(),
            stream_mode_details: stream_mode_details(stream),
            retention_period_hours: stream.retention_period_hours,
            stream_creation_timestamp: stream.created_at_ms,
            enhanced_monitoring: enhanced_monitoring(stream),
            encryption_type: encryption_type_name(stream),
            key_id: stream.key_id.clone(),
            open_shard_count: stream.open_shard_count(),
            consumer_count: stream.consumers.len() as u32,
        },
    })
}

pub fn list_streams(state: &RegionState, req: &ListStreamsRequest) -> Result<ListStreamsResponse> {
    let mut v = Validator::new();
    v.range_i64("Limit", req.limit, 1, 10_000);
    v.finish()?;

    let limit = req.limit.unwrap_or(100) as usize;
    // BTreeMap iteration is already name-ordered, which is the contract.
    let names: Vec<&String> = match &req.exclusive_start_stream_name {
        Some(start) => state
            .streams
            .keys()
            .filter(|name| name.as_str() > start.as_str())
            .collect(),
        None => state.streams.keys().collect(),
    };
    let has_more_streams = names.len() > limit;
    Ok(ListStreamsResponse {
        stream_names: names.into_iter().take(limit).cloned().collect(),
        has_more_streams,
    })
}

pub fn update_stream_mode(
    state: &mut RegionState,
    req: &UpdateStreamModeRequest,
    ctx: &OpCtx,
) -> Result<(EmptyResponse, Vec<DelayedTransition>)> {
    let mut v = Validator::new();
    let arn = v.required_string("StreamARN", req.stream_arn.as_deref());
    if req.stream_mode_details.is_none() {
        v.error("StreamModeDetails is required");
    }
    let target = parse_mode(&req.stream_mode_details, &mut v);
    v.finish()?;

    let stream_name = stream_name_from_arn(state, &arn)?;
    let stream = state.stream(&stream_name)?;
    stream.require_active()?;
    if target == StreamMode::OnDemand
        && stream.mode == StreamMode::Provisioned
        && state.on_demand_stream_count() >= ctx.config.on_demand_stream_count_limit
    {
        return Err(KinesisError::LimitExceeded(format!(
            "Account already has {} ON_DEMAND streams (limit {}).",
            state.on_demand_stream_count(),
            ctx.config.on_demand_stream_count_limit
        )));
    }

    let region = state.region.clone();
    let stream = state.stream_mut(&stream_name)?;
    stream.mode = target;
    stream.status = StreamStatus::Updating;
    info!(stream = %stream_name, mode = target.as_str(), "updating stream mode");

    Ok((EmptyResponse {}, vec![ctx.update_done(&region, &stream_name)]))
}
