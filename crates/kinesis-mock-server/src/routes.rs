//! HTTP Routing
//!
//! The entire API hangs off one route: `POST /` with the operation named by
//! the `X-Amz-Target: Kinesis_20131202.<OperationName>` header, exactly like
//! the real endpoint. The body is JSON or CBOR per Content-Type, the region
//! comes from the SigV4 credential scope (or an `X-Amz-Region` override),
//! and every response carries an `x-amzn-RequestId` for correlation.
//!
//! `GET /healthcheck` answers liveness probes.

use crate::wire::{self, WireFormat};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use kinesis_mock_core::KinesisError;
use kinesis_mock_engine::Cache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

const TARGET_PREFIX: &str = "Kinesis_20131202.";

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<Cache>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", post(handle_api))
        .route("/healthcheck", get(healthcheck))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn next_request_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    format!("{:016x}", COUNTER.fetch_add(1, Ordering::Relaxed))
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn handle_api(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let format = WireFormat::from_content_type(
        headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
    );
    let region: Option<String> = header_str(&headers, "x-amz-region")
        .map(str::to_string)
        .or_else(|| {
            headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(wire::region_from_authorization)
        });
    let request_id = next_request_id();

    let result = dispatch(&state, format, region.as_deref(), &headers, &body).await;
    let (status, bytes) = match result {
        Ok(bytes) => (StatusCode::OK, bytes),
        Err(error) => {
            warn!(
                request_id = %request_id,
                code = error.error_code(),
                message = %error,
                "request failed"
            );
            (
                StatusCode::from_u16(error.http_status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                wire::error_body(format, &error),
            )
        }
    };

    (
        status,
        [
            (CONTENT_TYPE, format.content_type().to_string()),
            (
                axum::http::HeaderName::from_static("x-amzn-requestid"),
                request_id,
            ),
        ],
        bytes,
    )
        .into_response()
}

/// Decode the request, run the operation, encode the response.
async fn call<Req, Resp, Fut>(
    format: WireFormat,
    body: &[u8],
    f: impl FnOnce(Req) -> Fut,
) -> Result<Vec<u8>, KinesisError>
where
    Req: DeserializeOwned,
    Resp: Serialize,
    Fut: Future<Output = Result<Resp, KinesisError>>,
{
    let request: Req = wire::decode(format, body)?;
    let response = f(request).await?;
    wire::encode(format, &response)
}

async fn dispatch(
    state: &AppState,
    format: WireFormat,
    region: Option<&str>,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Vec<u8>, KinesisError> {
    let target = header_str(headers, "x-amz-target").ok_or_else(|| {
        KinesisError::InvalidArgument("missing X-Amz-Target header".to_string())
    })?;
    let op = target.strip_prefix(TARGET_PREFIX).ok_or_else(|| {
        KinesisError::InvalidArgument(format!("unsupported target {}", target))
    })?;
    debug!(op, region = region.unwrap_or("<default>"), "dispatching");

    let cache = &state.cache;
    match op {
        "CreateStream" => {
            call(format, body, |req| async move {
                cache.create_stream(region, &req).await
            })
            .await
        }
        "DeleteStream" => {
            call(format, body, |req| async move {
                cache.delete_stream(region, &req).await
            })
            .await
        }
        "DescribeStream" => {
            call(format, body, |req| async move {
                cache.describe_stream(region, &req).await
            })
            .await
        }
        "DescribeStreamSummary" => {
            call(format, body, |req| async move {
                cache.describe_stream_summary(region, &req).await
            })
            .await
        }
        "ListStreams" => {
            call(format, body, |req| async move {
                cache.list_streams(region, &req).await
            })
            .await
        }
        "ListShards" => {
            call(format, body, |req| async move {
                cache.list_shards(region, &req).await
            })
            .await
        }
        "SplitShard" => {
            call(format, body, |req| async move {
                cache.split_shard(region, &req).await
            })
            .await
        }
        "MergeShards" => {
            call(format, body, |req| async move {
                cache.merge_shards(region, &req).await
            })
            .await
        }
        "UpdateShardCount" => {
            call(format, body, |req| async move {
                cache.update_shard_count(region, &req).await
            })
            .await
        }
        "UpdateStreamMode" => {
            call(format, body, |req| async move {
                cache.update_stream_mode(region, &req).await
            })
            .await
        }
        "IncreaseStreamRetentionPeriod" => {
            call(format, body, |req| async move {
                cache.increase_stream_retention_period(region, &req).await
            })
            .await
        }
        "DecreaseStreamRetentionPeriod" => {
            call(format, body, |req| async move {
                cache.decrease_stream_retention_period(region, &req).await
            })
            .await
        }
        "AddTagsToStream" => {
            call(format, body, |req| async move {
                cache.add_tags_to_stream(region, &req).await
            })
            .await
        }
        "RemoveTagsFromStream" => {
            call(format, body, |req| async move {
                cache.remove_tags_from_stream(region, &req).await
            })
            .await
        }
        "ListTagsForStream" => {
            call(format, body, |req| async move {
                cache.list_tags_for_stream(region, &req).await
            })
            .await
        }
        "StartStreamEncryption" => {
            call(format, body, |req| async move {
                cache.start_stream_encryption(region, &req).await
            })
            .await
        }
        "StopStreamEncryption" => {
            call(format, body, |req| async move {
                cache.stop_stream_encryption(region, &req).await
            })
            .await
        }
        "PutRecord" => {
            call(format, body, |req| async move {
                cache.put_record(region, &req).await
            })
            .await
        }
        "PutRecords" => {
            call(format, body, |req| async move {
                cache.put_records(region, &req).await
            })
            .await
        }
        "GetShardIterator" => {
            call(format, body, |req| async move {
                cache.get_shard_iterator(region, &req).await
            })
            .await
        }
        "GetRecords" => {
            call(format, body, |req| async move {
                cache.get_records(region, &req).await
            })
            .await
        }
        "RegisterStreamConsumer" => {
            call(format, body, |req| async move {
                cache.register_stream_consumer(region, &req).await
            })
            .await
        }
        "DeregisterStreamConsumer" => {
            call(format, body, |req| async move {
                cache.deregister_stream_consumer(region, &req).await
            })
            .await
        }
        "DescribeStreamConsumer" => {
            call(format, body, |req| async move {
                cache.describe_stream_consumer(region, &req).await
            })
            .await
        }
        "ListStreamConsumers" => {
            call(format, body, |req| async move {
                cache.list_stream_consumers(region, &req).await
            })
            .await
        }
        "EnableEnhancedMonitoring" => {
            call(format, body, |req| async move {
                cache.enable_enhanced_monitoring(region, &req).await
            })
            .await
        }
        "DisableEnhancedMonitoring" => {
            call(format, body, |req| async move {
                cache.disable_enhanced_monitoring(region, &req).await
            })
            .await
        }
        "DescribeLimits" => {
            call(format, body, |req| async move {
                cache.describe_limits(region, &req).await
            })
            .await
        }
        "SubscribeToShard" => Err(cache.subscribe_to_shard()),
        other => Err(KinesisError::InvalidArgument(format!(
            "unknown operation {}",
            other
        ))),
    }
}
