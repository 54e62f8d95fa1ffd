//! Tag handlers. AddTagsToStream is idempotent: re-adding a key overwrites
//! its value and reports success either way.

use super::OpCtx;
use crate::api::*;
use crate::scheduler::DelayedTransition;
use crate::store::RegionState;
use crate::validation::{is_valid_tag_text, Validator};
use kinesis_mock_core::stream::MAX_TAGS_PER_STREAM;
use kinesis_mock_core::{KinesisError, Result};

/// Most tags a single Add/Remove call may carry.
const MAX_TAGS_PER_CALL: usize = 10;

pub fn add_tags_to_stream(
    state: &mut RegionState,
    req: &AddTagsToStreamRequest,
    _ctx: &OpCtx,
) -> Result<(EmptyResponse, Vec<DelayedTransition>)> {
    let mut v = Validator::new();
    let stream_name = v.required_name("StreamName", req.stream_name.as_deref());
    match &req.tags {
        None => v.error("Tags is required"),
        Some(tags) if tags.is_empty() => v.error("Tags must not be empty"),
        Some(tags) if tags.len() > MAX_TAGS_PER_CALL => v.error(format!(
            "Tags must have at most {} entries per call",
            MAX_TAGS_PER_CALL
        )),
        Some(tags) => {
            for (key, value) in tags {
                v.check(
                    !key.is_empty() && key.len() <= 128 && is_valid_tag_text(key),
                    format!("tag key {:?} is not valid", key),
                );
                v.check(
                    value.len() <= 256 && is_valid_tag_text(value),
                    format!("tag value for key {:?} is not valid", key),
                );
            }
        }
    }
    v.finish()?;
    let tags = req.tags.clone().unwrap_or_default();

    let stream = state.stream_mut(&stream_name)?;
    stream.require_active()?;

    let new_keys = tags.keys().filter(|k| !stream.tags.contains_key(*k)).count();
    if stream.tags.len() + new_keys > MAX_TAGS_PER_STREAM {
        return Err(KinesisError::LimitExceeded(format!(
            "Stream {} cannot hold more than {} tags.",
            stream_name, MAX_TAGS_PER_STREAM
        )));
    }
    stream.tags.extend(tags);
    Ok((EmptyResponse {}, Vec::new()))
}

pub fn remove_tags_from_stream(
    state: &mut RegionState,
    req: &RemoveTagsFromStreamRequest,
    _ctx: &OpCtx,
) -> Result<(EmptyResponse, Vec<DelayedTransition>)> {
    let mut v = Validator::new();
    let stream_name = v.required_name("StreamName", req.stream_name.as_deref());
    match &req.tag_keys {
        None => v.error("TagKeys is required"),
        Some(keys) if keys.is_empty() => v.error("TagKeys must not be empty"),
        Some(keys) if keys.len() > MAX_TAGS_PER_CALL => v.error(format!(
            "TagKeys must have at most {} entries per call",
            MAX_TAGS_PER_CALL
        )),
        Some(_) => {}
    }
    v.finish()?;

    let stream = state.stream_mut(&stream_name)?;
    stream.require_active()?;
    for key in req.tag_keys.as_deref().unwrap_or_default() {
        stream.tags.remove(key);
    }
    Ok((EmptyResponse {}, Vec::new()))
}

pub fn list_tags_for_stream(
    state: &RegionState,
    req: &ListTagsForStreamRequest,
) -> Result<ListTagsForStreamResponse> {
    let mut v = Validator::new();
    let stream_name = v.required_name("StreamName", req.stream_name.as_deref());
    v.range_i64("Limit", req.limit, 1, MAX_TAGS_PER_STREAM as i64);
    v.finish()?;

    let stream = state.stream(&stream_name)?;
    let limit = req.limit.unwrap_or(MAX_TAGS_PER_STREAM as i64) as usize;
    let tags: Vec<TagDto> = stream
        .tags
        .iter()
        .filter(|(key, _)| match &req.exclusive_start_tag_key {
            Some(start) => key.as_str() > start.as_str(),
            None => true,
        })
        .map(|(key, value)| TagDto {
            key: key.clone(),
            value: value.clone(),
        })
        .collect();
    let has_more_tags = tags.len() > limit;
    Ok(ListTagsForStreamResponse {
        tags: tags.into_iter().take(limit).collect(),
        has_more_tags,
    })
}
