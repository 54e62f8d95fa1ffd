//! Retention-period handlers. Increase must actually increase and decrease
//! must actually decrease; both propagate through UPDATING. Already-stored
//! records are not purged here; the scheduler's retention sweep applies the
//! new cutoff on its next pass.

use super::OpCtx;
use crate::api::*;
use crate::scheduler::DelayedTransition;
use crate::store::RegionState;
use crate::validation::Validator;
use kinesis_mock_core::stream::{MAX_RETENTION_HOURS, MIN_RETENTION_HOURS};
use kinesis_mock_core::{KinesisError, Result, StreamStatus};
use tracing::info;

fn validated_hours(req: &RetentionPeriodRequest) -> Result<(String, u32)> {
    let mut v = Validator::new();
    let stream_name = v.required_name("StreamName", req.stream_name.as_deref());
    let hours = v.required_i64("RetentionPeriodHours", req.retention_period_hours);
    v.range_i64(
        "RetentionPeriodHours",
        req.retention_period_hours,
        MIN_RETENTION_HOURS as i64,
        MAX_RETENTION_HOURS as i64,
    );
    v.finish()?;
    Ok((stream_name, hours as u32))
}

pub fn increase_stream_retention_period(
    state: &mut RegionState,
    req: &RetentionPeriodRequest,
    ctx: &OpCtx,
) -> Result<(EmptyResponse, Vec<DelayedTransition>)> {
    let (stream_name, hours) = validated_hours(req)?;

    let stream = state.stream(&stream_name)?;
    stream.require_active()?;
    if hours <= stream.retention_period_hours {
        return Err(KinesisError::InvalidArgument(format!(
            "Requested retention of {} hours does not increase the current {} hours.",
            hours, stream.retention_period_hours
        )));
    }

    let region = state.region.clone();
    let stream = state.stream_mut(&stream_name)?;
    stream.retention_period_hours = hours;
    stream.status = StreamStatus::Updating;
    info!(stream = %stream_name, hours, "increased retention period");

    Ok((EmptyResponse {}, vec![ctx.update_done(&region, &stream_name)]))
}

pub fn decrease_stream_retention_period(
    state: &mut RegionState,
    req: &RetentionPeriodRequest,
    ctx: &OpCtx,
) -> Result<(EmptyResponse, Vec<DelayedTransition>)> {
    let (stream_name, hours) = validated_hours(req)?;

    let stream = state.stream(&stream_name)?;
    stream.require_active()?;
    if hours >= stream.retention_period_hours {
        return Err(KinesisError::InvalidArgument(format!(
            "Requested retention of {} hours does not decrease the current {} hours.",
            hours, stream.retention_period_hours
        )));
    }

    let region = state.region.clone();
    let stream = state.stream_mut(&stream_name)?;
    stream.retention_period_hours = hours;
    stream.status = StreamStatus::Updating;
    info!(stream = %stream_name, hours, "decreased retention period");

    Ok((EmptyResponse {}, vec![ctx.update_done(&region, &stream_name)]))
}
