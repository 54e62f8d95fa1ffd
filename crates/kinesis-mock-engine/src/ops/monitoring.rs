//! Enhanced-monitoring toggles and account limits.
//!
//! The emulator never emits CloudWatch metrics; it only tracks which
//! shard-level metrics a stream has enabled so that the control-plane
//! round-trip behaves like the real service.

use super::OpCtx;
use crate::api::*;
use crate::scheduler::DelayedTransition;
use crate::store::RegionState;
use crate::validation::Validator;
use kinesis_mock_core::{Result, ShardLevelMetric};
use std::collections::BTreeSet;

/// Parse the request's metric names, expanding the pseudo-metric ALL.
fn parse_metrics(req: &EnhancedMonitoringRequest) -> Result<(String, BTreeSet<ShardLevelMetric>)> {
    let mut v = Validator::new();
    let stream_name = v.required_name("StreamName", req.stream_name.as_deref());
    let mut metrics = BTreeSet::new();
    match &req.shard_level_metrics {
        None => v.error("ShardLevelMetrics is required"),
        Some(names) if names.is_empty() => v.error("ShardLevelMetrics must not be empty"),
        Some(names) => {
            for name in names {
                if name == "ALL" {
                    metrics.extend(ShardLevelMetric::ALL);
                } else {
                    match ShardLevelMetric::from_name(name) {
                        Some(metric) => {
                            metrics.insert(metric);
                        }
                        None => v.error(format!("{} is not a shard-level metric", name)),
                    }
                }
            }
        }
    }
    v.finish()?;
    Ok((stream_name, metrics))
}

fn metric_names(metrics: &BTreeSet<ShardLevelMetric>) -> Vec<String> {
    metrics.iter().map(|m| m.as_str().to_string()).collect()
}

pub fn enable_enhanced_monitoring(
    state: &mut RegionState,
    req: &EnhancedMonitoringRequest,
    _ctx: &OpCtx,
) -> Result<(EnhancedMonitoringResponse, Vec<DelayedTransition>)> {
    let (stream_name, requested) = parse_metrics(req)?;
    let stream = state.stream_mut(&stream_name)?;
    stream.require_active()?;

    let current = metric_names(&stream.enhanced_metrics);
    stream.enhanced_metrics.extend(requested);
    Ok((
        EnhancedMonitoringResponse {
            stream_name,
            current_shard_level_metrics: current,
            desired_shard_level_metrics: metric_names(&stream.enhanced_metrics),
        },
        Vec::new(),
    ))
}

pub fn disable_enhanced_monitoring(
    state: &mut RegionState,
    req: &EnhancedMonitoringRequest,
    _ctx: &OpCtx,
) -> Result<(EnhancedMonitoringResponse, Vec<DelayedTransition>)> {
    let (stream_name, requested) = parse_metrics(req)?;
    let stream = state.stream_mut(&stream_name)?;
    stream.require_active()?;

    let current = metric_names(&stream.enhanced_metrics);
    for metric in requested {
        stream.enhanced_metrics.remove(&metric);
    }
    Ok((
        EnhancedMonitoringResponse {
            stream_name,
            current_shard_level_metrics: current,
            desired_shard_level_metrics: metric_names(&stream.enhanced_metrics),
        },
        Vec::new(),
    ))
}

pub fn describe_limits(state: &RegionState, ctx: &OpCtx) -> Result<DescribeLimitsResponse> {
    Ok(DescribeLimitsResponse {
        shard_limit: ctx.config.shard_limit,
        open_shard_count: state.total_open_shards(),
        on_demand_stream_count: state.on_demand_stream_count(),
        on_demand_stream_count_limit: ctx.config.on_demand_stream_count_limit,
    })
}
