//! Enhanced fan-out consumer registration handlers.
//!
//! Consumers have their own small lifecycle (CREATING → ACTIVE → DELETING →
//! gone) driven by the same scheduler as streams. A consumer is addressed
//! either by its ConsumerARN or by the (StreamARN, ConsumerName) pair.

use super::{readable_stream, stream_name_from_arn, OpCtx};
use crate::api::*;
use crate::scheduler::{DelayedTransition, Transition};
use crate::store::RegionState;
use crate::token::{self, ConsumerListToken, TOKEN_TTL_MS};
use crate::validation::Validator;
use kinesis_mock_core::arn::ConsumerArn;
use kinesis_mock_core::stream::MAX_CONSUMERS_PER_STREAM;
use kinesis_mock_core::{Consumer, ConsumerStatus, KinesisError, Result};
use tracing::info;

pub fn register_stream_consumer(
    state: &mut RegionState,
    req: &RegisterStreamConsumerRequest,
    ctx: &OpCtx,
) -> Result<(RegisterStreamConsumerResponse, Vec<DelayedTransition>)> {
    let mut v = Validator::new();
    let arn = v.required_string("StreamARN", req.stream_arn.as_deref());
    let consumer_name = v.required_name("ConsumerName", req.consumer_name.as_deref());
    v.finish()?;

    let stream_name = stream_name_from_arn(state, &arn)?;
    let stream = readable_stream(state, &stream_name)?;
    stream.require_active()?;
    if stream.consumers.len() >= MAX_CONSUMERS_PER_STREAM {
        return Err(KinesisError::LimitExceeded(format!(
            "Stream {} already has {} registered consumers.",
            stream_name, MAX_CONSUMERS_PER_STREAM
        )));
    }
    if stream.consumers.contains_key(&consumer_name) {
        return Err(KinesisError::ResourceInUse(format!(
            "Consumer {} already exists on stream {}.",
            consumer_name, stream_name
        )));
    }

    let consumer = Consumer {
        consumer_name: consumer_name.clone(),
        consumer_arn: format!("{}/consumer/{}:{}", arn, consumer_name, ctx.now_ms / 1000),
        consumer_status: ConsumerStatus::Creating,
        consumer_creation_timestamp_ms: ctx.now_ms,
    };
    let dto = ConsumerDto::from(&consumer);
    info!(stream = %stream_name, consumer = %consumer_name, "registering consumer");
    state
        .stream_mut(&stream_name)?
        .consumers
        .insert(consumer_name.clone(), consumer);

    let transitions = vec![DelayedTransition {
        region: state.region.clone(),
        due_at_ms: ctx.now_ms + ctx.config.update_stream_duration_ms as i64,
        transition: Transition::ConsumerToActive {
            stream_name,
            consumer_name,
        },
    }];
    Ok((RegisterStreamConsumerResponse { consumer: dto }, transitions))
}

/// Resolve the (stream, consumer) pair from whichever addressing the request
/// used.
fn resolve_consumer(
    state: &RegionState,
    consumer_arn: &Option<String>,
    stream_arn: &Option<String>,
    consumer_name: &Option<String>,
) -> Result<(String, String)> {
    if let Some(arn) = consumer_arn {
        let parsed = ConsumerArn::parse(arn)?;
        if parsed.stream.region != state.region || parsed.stream.account_id != state.account_id {
            return Err(KinesisError::InvalidArgument(format!(
                "ConsumerARN {} does not belong to account {} in {}",
                arn, state.account_id, state.region
            )));
        }
        return Ok((parsed.stream.stream_name, parsed.consumer_name));
    }
    match (stream_arn, consumer_name) {
        (Some(arn), Some(name)) => {
            Ok((stream_name_from_arn(state, arn)?, name.clone()))
        }
        _ => Err(KinesisError::InvalidArgument(
            "Provide either ConsumerARN or both StreamARN and ConsumerName.".to_string(),
        )),
    }
}

pub fn deregister_stream_consumer(
    state: &mut RegionState,
    req: &DeregisterStreamConsumerRequest,
    ctx: &OpCtx,
) -> Result<(EmptyResponse, Vec<DelayedTransition>)> {
    let (stream_name, consumer_name) =
        resolve_consumer(state, &req.consumer_arn, &req.stream_arn, &req.consumer_name)?;

    let stream = readable_stream(state, &stream_name)?;
    let consumer = stream
        .consumers
        .get(&consumer_name)
        .ok_or_else(|| KinesisError::consumer_not_found(&consumer_name, &stream_name))?;
    if consumer.consumer_status != ConsumerStatus::Active {
        return Err(KinesisError::ResourceInUse(format!(
            "Consumer {} is in status {}, which does not allow deregistration.",
            consumer_name,
            consumer.consumer_status.as_str()
        )));
    }

    info!(stream = %stream_name, consumer = %consumer_name, "deregistering consumer");
    state
        .stream_mut(&stream_name)?
        .consumers
        .get_mut(&consumer_name)
        .ok_or_else(|| KinesisError::consumer_not_found(&consumer_name, &stream_name))?
        .consumer_status = ConsumerStatus::Deleting;

    let transitions = vec![DelayedTransition {
        region: state.region.clone(),
        due_at_ms: ctx.now_ms + ctx.config.update_stream_duration_ms as i64,
        transition: Transition::RemoveConsumer {
            stream_name,
            consumer_name,
        },
    }];
    Ok((EmptyResponse {}, transitions))
}

pub fn describe_stream_consumer(
    state: &RegionState,
    req: &DescribeStreamConsumerRequest,
) -> Result<DescribeStreamConsumerResponse> {
    let (stream_name, consumer_name) =
        resolve_consumer(state, &req.consumer_arn, &req.stream_arn, &req.consumer_name)?;

    let stream = readable_stream(state, &stream_name)?;
    let consumer = stream
        .consumers
        .get(&consumer_name)
        .ok_or_else(|| KinesisError::consumer_not_found(&consumer_name, &stream_name))?;
    Ok(DescribeStreamConsumerResponse {
        consumer_description: ConsumerDescriptionDto {
            consumer_name: consumer.consumer_name.clone(),
            consumer_arn: consumer.consumer_arn.clone(),
            consumer_status: consumer.consumer_status.as_str().to_string(),
            consumer_creation_timestamp: consumer.consumer_creation_timestamp_ms,
            stream_arn: stream.stream_arn.clone(),
        },
    })
}

pub fn list_stream_consumers(
    state: &RegionState,
    req: &ListStreamConsumersRequest,
    ctx: &OpCtx,
) -> Result<ListStreamConsumersResponse> {
    let mut v = Validator::new();
    v.range_i64("MaxResults", req.max_results, 1, 10_000);
    v.check(
        req.stream_arn.is_some() || req.next_token.is_some(),
        "either StreamARN or NextToken is required",
    );
    v.finish()?;

    let (stream_name, exclusive_start, max_results) = match &req.next_token {
        Some(next_token) => {
            let t: ConsumerListToken = token::verify(next_token)
                .map_err(|_| KinesisError::InvalidArgument("NextToken is invalid".to_string()))?;
            if ctx.now_ms - t.issued_at_ms > TOKEN_TTL_MS {
                return Err(KinesisError::ExpiredNextToken(
                    "NextToken has expired.".to_string(),
                ));
            }
            (t.stream_name, Some(t.exclusive_start_consumer), t.max_results as usize)
        }
        None => {
            let arn = req.stream_arn.as_deref().unwrap_or_default();
            (
                stream_name_from_arn(state, arn)?,
                None,
                req.max_results.unwrap_or(100) as usize,
            )
        }
    };

    let stream = readable_stream(state, &stream_name)?;
    let consumers: Vec<&Consumer> = stream
        .consumers
        .iter()
        .filter(|(name, _)| match &exclusive_start {
            Some(start) => name.as_str() > start.as_str(),
            None => true,
        })
        .map(|(_, c)| c)
        .collect();

    let page: Vec<ConsumerDto> = consumers
        .iter()
        .take(max_results)
        .map(|c| ConsumerDto::from(*c))
        .collect();
    let next_token = if consumers.len() > page.len() {
        page.last().map(|last| {
            token::sign(&ConsumerListToken {
                stream_name: stream_name.clone(),
                exclusive_start_consumer: last.consumer_name.clone(),
                max_results: max_results as u32,
                issued_at_ms: ctx.now_ms,
            })
        })
    } else {
        None
    };

    Ok(ListStreamConsumersResponse {
        consumers: page,
        next_token,
    })
}
