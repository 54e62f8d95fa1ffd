//! Wire Codec
//!
//! The service speaks two encodings, negotiated by Content-Type:
//! `application/x-amz-json-1.1` and `application/x-amz-cbor-1.1`. A response
//! always echoes the request's encoding, including error bodies, which carry
//! the AWS shape `{ "__type": "<ErrorCode>", "message": "..." }`.
//!
//! The region comes from the SigV4 `Authorization` header's credential
//! scope (`Credential=<key>/<date>/<region>/kinesis/aws4_request`) unless an
//! `X-Amz-Region` override is present; absent both, the configured default
//! region applies.

use kinesis_mock_core::KinesisError;
use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    Json,
    Cbor,
}

impl WireFormat {
    /// Negotiate from a Content-Type header; JSON when absent or unknown.
    pub fn from_content_type(content_type: Option<&str>) -> WireFormat {
        match content_type {
            Some(ct) if ct.starts_with("application/x-amz-cbor-1.1") => WireFormat::Cbor,
            _ => WireFormat::Json,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            WireFormat::Json => "application/x-amz-json-1.1",
            WireFormat::Cbor => "application/x-amz-cbor-1.1",
        }
    }
}

/// Decode a request body. An empty body decodes like `{}` so operations
/// without members (DescribeLimits) accept it.
pub fn decode<T: DeserializeOwned>(format: WireFormat, body: &[u8]) -> Result<T, KinesisError> {
    let effective: &[u8] = if body.is_empty() { b"{}" } else { body };
    match format {
        WireFormat::Json => serde_json::from_slice(effective).map_err(|e| {
            KinesisError::InvalidArgument(format!("unable to parse JSON request body: {}", e))
        }),
        WireFormat::Cbor => {
            if body.is_empty() {
                // CBOR has no `{}` literal; decode the empty map instead.
                ciborium::from_reader(&[0xa0u8][..])
            } else {
                ciborium::from_reader(body)
            }
            .map_err(|e| {
                KinesisError::InvalidArgument(format!("unable to parse CBOR request body: {}", e))
            })
        }
    }
}

/// Encode a response body.
pub fn encode<T: Serialize>(format: WireFormat, value: &T) -> Result<Vec<u8>, KinesisError> {
    match format {
        WireFormat::Json => serde_json::to_vec(value)
            .map_err(|e| KinesisError::InternalFailure(format!("response encoding failed: {}", e))),
        WireFormat::Cbor => {
            let mut out = Vec::new();
            ciborium::into_writer(value, &mut out).map_err(|e| {
                KinesisError::InternalFailure(format!("response encoding failed: {}", e))
            })?;
            Ok(out)
        }
    }
}

/// The AWS error body.
#[derive(Debug, Serialize, serde::Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "__type")]
    pub error_type: String,
    pub message: String,
}

/// Render an error in the request's encoding. Falls back to raw JSON if the
/// encoder itself fails, so a client always sees a body.
pub fn error_body(format: WireFormat, error: &KinesisError) -> Vec<u8> {
    let body = ErrorBody {
        error_type: error.error_code().to_string(),
        message: error.to_string(),
    };
    encode(format, &body).unwrap_or_else(|_| {
        format!(
            "{{\"__type\":\"{}\",\"message\":\"internal error\"}}",
            error.error_code()
        )
        .into_bytes()
    })
}

/// Pull the region out of a SigV4 Authorization header.
pub fn region_from_authorization(header: &str) -> Option<String> {
    // AWS4-HMAC-SHA256 Credential=AKIA.../20131202/us-east-1/kinesis/aws4_request, ...
    let credential = header
        .split(|c| c == ' ' || c == ',')
        .find_map(|part| part.strip_prefix("Credential="))?;
    let region = credential.split('/').nth(2)?;
    if region.is_empty() {
        None
    } else {
        Some(region.to_string())
    }
}
