//! Shard topology handlers: list, split, merge, uniform rescale.

use super::{readable_stream, OpCtx};
use crate::api::*;
use crate::scheduler::DelayedTransition;
use crate::store::RegionState;
use crate::token::{self, ShardListToken, TOKEN_TTL_MS};
use crate::validation::Validator;
use kinesis_mock_core::{KinesisError, Result, StreamMode, StreamStatus};
use tracing::info;

pub fn list_shards(
    state: &RegionState,
    req: &ListShardsRequest,
    ctx: &OpCtx,
) -> Result<ListShardsResponse> {
    let mut v = Validator::new();
    v.range_i64("MaxResults", req.max_results, 1, 10_000);
    v.check(
        req.stream_name.is_some() || req.next_token.is_some(),
        "either StreamName or NextToken is required",
    );
    v.check(
        !(req.stream_name.is_some() && req.next_token.is_some()),
        "StreamName and NextToken are mutually exclusive",
    );
    v.finish()?;

    // A token carries the whole cursor; fresh requests start from the
    // request members.
    let (stream_name, exclusive_start, max_results) = match &req.next_token {
        Some(next_token) => {
            let t: ShardListToken = token::verify(next_token)
                .map_err(|_| KinesisError::InvalidArgument("NextToken is invalid".to_string()))?;
            if ctx.now_ms - t.issued_at_ms > TOKEN_TTL_MS {
                return Err(KinesisError::ExpiredNextToken(
                    "NextToken has expired.".to_string(),
                ));
            }
            (t.stream_name, Some(t.exclusive_start_shard_id), t.max_results as usize)
        }
        None => (
            req.stream_name.clone().unwrap_or_default(),
            req.exclusive_start_shard_id.clone(),
            req.max_results.unwrap_or(1000) as usize,
        ),
    };

    let stream = readable_stream(state, &stream_name)?;
    let shards: Vec<&kinesis_mock_core::Shard> = match &exclusive_start {
        Some(start) => stream
            .shards
            .iter()
            .filter(|s| s.shard_id.as_str() > start.as_str())
            .collect(),
        None => stream.shards.iter().collect(),
    };

    let page: Vec<ShardDto> = shards.iter().take(max_results).map(|s| ShardDto::from(*s)).collect();
    let next_token = if shards.len() > page.len() {
        page.last().map(|last| {
            token::sign(&ShardListToken {
                stream_name: stream_name.clone(),
                exclusive_start_shard_id: last.shard_id.clone(),
                max_results: max_results as u32,
                issued_at_ms: ctx.now_ms,
            })
        })
    } else {
        None
    };

    Ok(ListShardsResponse {
        shards: page,
        next_token,
    })
}

pub fn split_shard(
    state: &mut RegionState,
    req: &SplitShardRequest,
    ctx: &OpCtx,
) -> Result<(EmptyResponse, Vec<DelayedTransition>)> {
    let mut v = Validator::new();
    let stream_name = v.required_name("StreamName", req.stream_name.as_deref());
    let shard_id = v.required_string("ShardToSplit", req.shard_to_split.as_deref());
    let new_starting_hash_key =
        v.required_hash_key("NewStartingHashKey", req.new_starting_hash_key.as_deref());
    v.finish()?;

    let stream = state.stream(&stream_name)?;
    stream.require_active()?;
    if state.total_open_shards() + 1 > ctx.config.shard_limit {
        return Err(KinesisError::LimitExceeded(format!(
            "Splitting would exceed the account shard limit of {}.",
            ctx.config.shard_limit
        )));
    }

    let region = state.region.clone();
    let stream = state.stream_mut(&stream_name)?;
    stream.split_shard(&shard_id, new_starting_hash_key, ctx.now_ms)?;
    stream.status = StreamStatus::Updating;
    info!(stream = %stream_name, shard = %shard_id, "split shard");

    Ok((EmptyResponse {}, vec![ctx.update_done(&region, &stream_name)]))
}

pub fn merge_shards(
    state: &mut RegionState,
    req: &MergeShardsRequest,
    ctx: &OpCtx,
) -> Result<(EmptyResponse, Vec<DelayedTransition>)> {
    let mut v = Validator::new();
    let stream_name = v.required_name("StreamName", req.stream_name.as_deref());
    let shard_to_merge = v.required_string("ShardToMerge", req.shard_to_merge.as_deref());
    let adjacent = v.required_string("AdjacentShardToMerge", req.adjacent_shard_to_merge.as_deref());
    v.finish()?;

    state.stream(&stream_name)?.require_active()?;

    let region = state.region.clone();
    let stream = state.stream_mut(&stream_name)?;
    stream.merge_shards(&shard_to_merge, &adjacent, ctx.now_ms)?;
    stream.status = StreamStatus::Updating;
    info!(stream = %stream_name, first = %shard_to_merge, second = %adjacent, "merged shards");

    Ok((EmptyResponse {}, vec![ctx.update_done(&region, &stream_name)]))
}

pub fn update_shard_count(
    state: &mut RegionState,
    req: &UpdateShardCountRequest,
    ctx: &OpCtx,
) -> Result<(UpdateShardCountResponse, Vec<DelayedTransition>)> {
    let mut v = Validator::new();
    let stream_name = v.required_name("StreamName", req.stream_name.as_deref());
    let target = v.required_i64("TargetShardCount", req.target_shard_count);
    v.range_i64("TargetShardCount", req.target_shard_count, 1, 10_000);
    if let Some(scaling) = req.scaling_type.as_deref() {
        v.check(
            scaling == "UNIFORM_SCALING",
            "ScalingType must be UNIFORM_SCALING",
        );
    }
    v.finish()?;
    let target = target as u32;

    let stream = state.stream(&stream_name)?;
    stream.require_active()?;
    if stream.mode != StreamMode::Provisioned {
        return Err(KinesisError::InvalidArgument(format!(
            "UpdateShardCount requires a PROVISIONED stream; {} is ON_DEMAND.",
            stream_name
        )));
    }
    let current = stream.open_shard_count();
    // Uniform scaling may at most halve or double.
    let floor = current.div_ceil(2).max(1);
    let ceiling = current.saturating_mul(2);
    if target < floor || target > ceiling {
        return Err(KinesisError::InvalidArgument(format!(
            "TargetShardCount {} is outside [{}, {}] for a stream of {} shards.",
            target, floor, ceiling, current
        )));
    }
    if state.total_open_shards() - current + target > ctx.config.shard_limit {
        return Err(KinesisError::LimitExceeded(format!(
            "Scaling to {} shards would exceed the account shard limit of {}.",
            target, ctx.config.shard_limit
        )));
    }

    let region = state.region.clone();
    let stream = state.stream_mut(&stream_name)?;
    stream.rebalance_to(target, ctx.now_ms)?;
    stream.status = StreamStatus::Updating;
    info!(stream = %stream_name, from = current, to = target, "updating shard count");

    Ok((
        UpdateShardCountResponse {
            stream_name: stream_name.clone(),
            current_shard_count: current,
            target_shard_count: target,
        },
        vec![ctx.update_done(&region, &stream_name)],
    ))
}
