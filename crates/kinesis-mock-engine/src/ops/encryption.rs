//! Server-side encryption handlers. The emulator stores the key id and
//! stamps the encryption type onto records as they arrive; it never talks to
//! KMS, but it validates the request shape the same way the service does.

use super::OpCtx;
use crate::api::*;
use crate::scheduler::DelayedTransition;
use crate::store::RegionState;
use crate::validation::Validator;
use kinesis_mock_core::{EncryptionType, KinesisError, Result, StreamStatus};
use tracing::info;

fn validated(req: &StreamEncryptionRequest) -> Result<(String, String)> {
    let mut v = Validator::new();
    let stream_name = v.required_name("StreamName", req.stream_name.as_deref());
    let encryption_type = v.required_string("EncryptionType", req.encryption_type.as_deref());
    if !encryption_type.is_empty() && encryption_type != "KMS" {
        v.error("EncryptionType must be KMS");
    }
    let key_id = v.required_string("KeyId", req.key_id.as_deref());
    if key_id.len() > 2048 {
        v.error("KeyId must be at most 2048 characters");
    }
    v.finish()?;
    Ok((stream_name, key_id))
}

pub fn start_stream_encryption(
    state: &mut RegionState,
    req: &StreamEncryptionRequest,
    ctx: &OpCtx,
) -> Result<(EmptyResponse, Vec<DelayedTransition>)> {
    let (stream_name, key_id) = validated(req)?;

    let stream = state.stream(&stream_name)?;
    stream.require_active()?;
    if stream.encryption_type == EncryptionType::Kms {
        return Err(KinesisError::ResourceInUse(format!(
            "Stream {} already has encryption enabled.",
            stream_name
        )));
    }

    let region = state.region.clone();
    let stream = state.stream_mut(&stream_name)?;
    stream.encryption_type = EncryptionType::Kms;
    stream.key_id = Some(key_id);
    stream.status = StreamStatus::Updating;
    info!(stream = %stream_name, "starting stream encryption");

    Ok((EmptyResponse {}, vec![ctx.update_done(&region, &stream_name)]))
}

pub fn stop_stream_encryption(
    state: &mut RegionState,
    req: &StreamEncryptionRequest,
    ctx: &OpCtx,
) -> Result<(EmptyResponse, Vec<DelayedTransition>)> {
    let (stream_name, key_id) = validated(req)?;

    let stream = state.stream(&stream_name)?;
    stream.require_active()?;
    if stream.encryption_type != EncryptionType::Kms {
        return Err(KinesisError::InvalidArgument(format!(
            "Stream {} does not have encryption enabled.",
            stream_name
        )));
    }
    if stream.key_id.as_deref() != Some(key_id.as_str()) {
        return Err(KinesisError::InvalidArgument(
            "KeyId does not match the key the stream is encrypted with.".to_string(),
        ));
    }

    let region = state.region.clone();
    let stream = state.stream_mut(&stream_name)?;
    stream.encryption_type = EncryptionType::None;
    stream.key_id = None;
    stream.status = StreamStatus::Updating;
    info!(stream = %stream_name, "stopping stream encryption");

    Ok((EmptyResponse {}, vec![ctx.update_done(&region, &stream_name)]))
}
