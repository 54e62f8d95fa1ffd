//! Request Handlers
//!
//! One module per resource family, mirroring the API surface:
//!
//! - [`streams`]: Create/Delete/Describe/List, stream mode
//! - [`shards`]: ListShards, SplitShard, MergeShards, UpdateShardCount
//! - [`records`]: PutRecord(s), GetShardIterator, GetRecords
//! - [`tags`]: Add/Remove/ListTagsForStream
//! - [`consumers`]: Register/Deregister/Describe/ListStreamConsumers
//! - [`retention`]: Increase/DecreaseStreamRetentionPeriod
//! - [`encryption`]: Start/StopStreamEncryption
//! - [`monitoring`]: enhanced monitoring, DescribeLimits
//!
//! Every handler follows the same discipline: validate the decoded request
//! (collecting shape errors), check preconditions against the region state,
//! apply the mutation atomically, and hand back any delayed transitions for
//! the scheduler. Handlers never sleep and never do I/O; the coordinator
//! owns locks and timing.

pub mod consumers;
pub mod encryption;
pub mod monitoring;
pub mod records;
pub mod retention;
pub mod shards;
pub mod streams;
pub mod tags;

use crate::config::EngineConfig;
use crate::scheduler::{DelayedTransition, Transition};
use crate::store::RegionState;
use kinesis_mock_core::{KinesisError, Result, Stream, StreamStatus};

/// Per-invocation context: configuration plus the clock reading taken once
/// at dispatch, so a handler sees a single consistent "now".
#[derive(Debug, Clone, Copy)]
pub struct OpCtx<'a> {
    pub config: &'a EngineConfig,
    pub now_ms: i64,
}

impl<'a> OpCtx<'a> {
    /// Schedule the UPDATING → ACTIVE flip for a propagating mutation.
    fn update_done(&self, region: &str, stream_name: &str) -> DelayedTransition {
        DelayedTransition {
            region: region.to_string(),
            due_at_ms: self.now_ms + self.config.update_stream_duration_ms as i64,
            transition: Transition::StreamToActive {
                stream_name: stream_name.to_string(),
            },
        }
    }
}

/// Stream lookup for read-path operations: a DELETING stream is already
/// invisible to describes/reads (DescribeStreamSummary is the exception and
/// uses `RegionState::stream` directly).
fn readable_stream<'s>(state: &'s RegionState, stream_name: &str) -> Result<&'s Stream> {
    let stream = state.stream(stream_name)?;
    if stream.status == StreamStatus::Deleting {
        return Err(KinesisError::stream_not_found(
            stream_name,
            &state.account_id,
        ));
    }
    Ok(stream)
}

/// Resolve a stream name from a StreamARN, insisting the ARN points into
/// this region and account.
fn stream_name_from_arn(state: &RegionState, arn: &str) -> Result<String> {
    let parsed = kinesis_mock_core::arn::StreamArn::parse(arn)?;
    if parsed.region != state.region || parsed.account_id != state.account_id {
        return Err(KinesisError::InvalidArgument(format!(
            "StreamARN {} does not belong to account {} in {}",
            arn, state.account_id, state.region
        )));
    }
    Ok(parsed.stream_name)
}
