//! End-to-end engine tests: the full create → reshard → read/write → delete
//! lifecycle driven through the coordinator with a manual clock, so every
//! delayed transition fires exactly when the test says time has passed.

use bytes::Bytes;
use kinesis_mock_core::SequenceNumber;
use kinesis_mock_engine::api::*;
use kinesis_mock_engine::{Cache, Clock, EngineConfig, ManualClock, Snapshot};
use std::sync::Arc;
use std::time::Duration;

const T0: i64 = 1_700_000_000_000;
const MAX_HASH: u128 = u128::MAX;
const MIDPOINT: u128 = 1u128 << 127;

fn setup() -> (Arc<Cache>, Arc<ManualClock>) {
    let clock = ManualClock::new(T0);
    let cache = Cache::new(EngineConfig::default(), clock.clone());
    (cache, clock)
}

async fn create_provisioned(cache: &Cache, name: &str, shards: i64) {
    cache
        .create_stream(
            None,
            &CreateStreamRequest {
                stream_name: Some(name.to_string()),
                shard_count: Some(shards),
                stream_mode_details: None,
            },
        )
        .await
        .unwrap();
}

/// Create a stream and run the clock past the create delay so it is ACTIVE.
async fn create_active(cache: &Cache, clock: &ManualClock, name: &str, shards: i64) {
    create_provisioned(cache, name, shards).await;
    clock.advance(Duration::from_millis(501));
    cache.fire_due().await;
}

async fn status_of(cache: &Cache, name: &str) -> String {
    cache
        .describe_stream_summary(
            None,
            &DescribeStreamSummaryRequest {
                stream_name: Some(name.to_string()),
            },
        )
        .await
        .unwrap()
        .stream_description_summary
        .stream_status
}

async fn shards_of(cache: &Cache, name: &str) -> Vec<ShardDto> {
    cache
        .describe_stream(
            None,
            &DescribeStreamRequest {
                stream_name: Some(name.to_string()),
                limit: Some(10_000),
                exclusive_start_shard_id: None,
            },
        )
        .await
        .unwrap()
        .stream_description
        .shards
}

fn open_shards(shards: &[ShardDto]) -> Vec<&ShardDto> {
    shards
        .iter()
        .filter(|s| s.sequence_number_range.ending_sequence_number.is_none())
        .collect()
}

async fn iterator_for(cache: &Cache, stream: &str, shard_id: &str, kind: &str) -> String {
    cache
        .get_shard_iterator(
            None,
            &GetShardIteratorRequest {
                stream_name: Some(stream.to_string()),
                shard_id: Some(shard_id.to_string()),
                shard_iterator_type: Some(kind.to_string()),
                starting_sequence_number: None,
                timestamp: None,
            },
        )
        .await
        .unwrap()
        .shard_iterator
}

// -------------------------------------------------------------------
// Scenario 1: create → CREATING → ACTIVE with a full-range shard
// -------------------------------------------------------------------

#[tokio::test]
async fn test_create_stream_becomes_active_after_delay() {
    let (cache, clock) = setup();
    create_provisioned(&cache, "s1", 1).await;

    assert_eq!(status_of(&cache, "s1").await, "CREATING");

    // Not yet due.
    clock.advance(Duration::from_millis(499));
    cache.fire_due().await;
    assert_eq!(status_of(&cache, "s1").await, "CREATING");

    clock.advance(Duration::from_millis(2));
    cache.fire_due().await;
    assert_eq!(status_of(&cache, "s1").await, "ACTIVE");

    let shards = shards_of(&cache, "s1").await;
    assert_eq!(shards.len(), 1);
    assert_eq!(shards[0].hash_key_range.starting_hash_key, "0");
    assert_eq!(shards[0].hash_key_range.ending_hash_key, MAX_HASH.to_string());
    assert!(shards[0].sequence_number_range.ending_sequence_number.is_none());
}

#[tokio::test]
async fn test_mutations_rejected_while_creating() {
    let (cache, _clock) = setup();
    create_provisioned(&cache, "s1", 1).await;

    let err = cache
        .put_record(
            None,
            &PutRecordRequest {
                stream_name: Some("s1".to_string()),
                data: Some(Bytes::from("x")),
                partition_key: Some("pk".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "ResourceInUseException");
}

// -------------------------------------------------------------------
// Scenario 2: put/get round-trip with a decodable sequence number
// -------------------------------------------------------------------

#[tokio::test]
async fn test_put_then_get_roundtrip() {
    let (cache, clock) = setup();
    create_active(&cache, &clock, "s1", 1).await;

    let put = cache
        .put_record(
            None,
            &PutRecordRequest {
                stream_name: Some("s1".to_string()),
                data: Some(Bytes::from("hello")),
                partition_key: Some("pk1".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(put.shard_id, "shardId-000000000000");

    let parts = SequenceNumber::parse(&put.sequence_number).unwrap().parts();
    assert_eq!(parts.shard_index, 0);
    assert_eq!(parts.byte_offset, 0);
    assert_eq!(parts.sub_sequence, 0);

    let iterator = iterator_for(&cache, "s1", "shardId-000000000000", "TRIM_HORIZON").await;
    let got = cache
        .get_records(
            None,
            &GetRecordsRequest {
                shard_iterator: Some(iterator),
                limit: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(got.records.len(), 1);
    assert_eq!(got.records[0].data, Bytes::from("hello"));
    assert_eq!(got.records[0].partition_key, "pk1");
    assert_eq!(got.records[0].sequence_number, put.sequence_number);
    assert_eq!(got.millis_behind_latest, 0);
    assert!(got.next_shard_iterator.is_some());
    assert!(got.child_shards.is_none());
}

#[tokio::test]
async fn test_get_records_reports_lag_against_the_shard_tip() {
    let (cache, clock) = setup();
    create_active(&cache, &clock, "s1", 1).await;

    // Two records a second apart. A limited read that only returns the
    // older one is still lagging by the distance to the *newest* record.
    for i in 0..2 {
        cache
            .put_record(
                None,
                &PutRecordRequest {
                    stream_name: Some("s1".to_string()),
                    data: Some(Bytes::from(format!("r{}", i))),
                    partition_key: Some("pk".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        if i == 0 {
            clock.advance(Duration::from_secs(1));
        }
    }
    let tip_at = clock.now_ms();
    clock.advance(Duration::from_secs(5));

    let iterator = iterator_for(&cache, "s1", "shardId-000000000000", "TRIM_HORIZON").await;
    let first = cache
        .get_records(
            None,
            &GetRecordsRequest {
                shard_iterator: Some(iterator),
                limit: Some(1),
            },
        )
        .await
        .unwrap();
    assert_eq!(first.records.len(), 1);
    assert_eq!(first.records[0].data, Bytes::from("r0"));
    assert_eq!(first.millis_behind_latest, clock.now_ms() - tip_at);

    let rest = cache
        .get_records(
            None,
            &GetRecordsRequest {
                shard_iterator: first.next_shard_iterator,
                limit: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(rest.records.len(), 1);
    assert_eq!(rest.millis_behind_latest, 0);
}

#[tokio::test]
async fn test_latest_iterator_sees_only_later_records() {
    let (cache, clock) = setup();
    create_active(&cache, &clock, "s1", 1).await;

    cache
        .put_record(
            None,
            &PutRecordRequest {
                stream_name: Some("s1".to_string()),
                data: Some(Bytes::from("before")),
                partition_key: Some("pk".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let iterator = iterator_for(&cache, "s1", "shardId-000000000000", "LATEST").await;

    cache
        .put_record(
            None,
            &PutRecordRequest {
                stream_name: Some("s1".to_string()),
                data: Some(Bytes::from("after")),
                partition_key: Some("pk".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let got = cache
        .get_records(
            None,
            &GetRecordsRequest {
                shard_iterator: Some(iterator),
                limit: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(got.records.len(), 1);
    assert_eq!(got.records[0].data, Bytes::from("after"));
}

// -------------------------------------------------------------------
// Scenario 3 & 4: split and merge geometry through the API
// -------------------------------------------------------------------

#[tokio::test]
async fn test_split_then_merge_full_cycle() {
    let (cache, clock) = setup();
    create_active(&cache, &clock, "s1", 1).await;

    cache
        .split_shard(
            None,
            &SplitShardRequest {
                stream_name: Some("s1".to_string()),
                shard_to_split: Some("shardId-000000000000".to_string()),
                new_starting_hash_key: Some(MIDPOINT.to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(status_of(&cache, "s1").await, "UPDATING");

    clock.advance(Duration::from_millis(501));
    cache.fire_due().await;
    assert_eq!(status_of(&cache, "s1").await, "ACTIVE");

    let shards = shards_of(&cache, "s1").await;
    let open = open_shards(&shards);
    assert_eq!(open.len(), 2);
    assert_eq!(open[0].hash_key_range.starting_hash_key, "0");
    assert_eq!(
        open[0].hash_key_range.ending_hash_key,
        (MIDPOINT - 1).to_string()
    );
    assert_eq!(open[1].hash_key_range.starting_hash_key, MIDPOINT.to_string());
    assert_eq!(open[1].hash_key_range.ending_hash_key, MAX_HASH.to_string());
    for child in &open {
        assert_eq!(
            child.parent_shard_id.as_deref(),
            Some("shardId-000000000000")
        );
    }
    let parent = shards
        .iter()
        .find(|s| s.shard_id == "shardId-000000000000")
        .unwrap();
    assert!(parent.sequence_number_range.ending_sequence_number.is_some());

    // Merge the two children back together.
    let (left, right) = (open[0].shard_id.clone(), open[1].shard_id.clone());
    cache
        .merge_shards(
            None,
            &MergeShardsRequest {
                stream_name: Some("s1".to_string()),
                shard_to_merge: Some(left.clone()),
                adjacent_shard_to_merge: Some(right.clone()),
            },
        )
        .await
        .unwrap();
    clock.advance(Duration::from_millis(501));
    cache.fire_due().await;
    assert_eq!(status_of(&cache, "s1").await, "ACTIVE");

    let shards = shards_of(&cache, "s1").await;
    let open = open_shards(&shards);
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].hash_key_range.starting_hash_key, "0");
    assert_eq!(open[0].hash_key_range.ending_hash_key, MAX_HASH.to_string());
    assert_eq!(open[0].parent_shard_id.as_deref(), Some(left.as_str()));
    assert_eq!(
        open[0].adjacent_parent_shard_id.as_deref(),
        Some(right.as_str())
    );
}

#[tokio::test]
async fn test_closed_parent_hands_readers_to_children() {
    let (cache, clock) = setup();
    create_active(&cache, &clock, "s1", 1).await;

    cache
        .put_record(
            None,
            &PutRecordRequest {
                stream_name: Some("s1".to_string()),
                data: Some(Bytes::from("pre-split")),
                partition_key: Some("pk".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    cache
        .split_shard(
            None,
            &SplitShardRequest {
                stream_name: Some("s1".to_string()),
                shard_to_split: Some("shardId-000000000000".to_string()),
                new_starting_hash_key: Some(MIDPOINT.to_string()),
            },
        )
        .await
        .unwrap();
    clock.advance(Duration::from_millis(501));
    cache.fire_due().await;

    // Drain the closed parent: records still there, then exhaustion hands
    // over the children and a null next iterator.
    let iterator = iterator_for(&cache, "s1", "shardId-000000000000", "TRIM_HORIZON").await;
    let got = cache
        .get_records(
            None,
            &GetRecordsRequest {
                shard_iterator: Some(iterator),
                limit: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(got.records.len(), 1);
    assert!(got.next_shard_iterator.is_none());
    let children = got.child_shards.unwrap();
    assert_eq!(children.len(), 2);
    for child in &children {
        assert_eq!(child.parent_shards, vec!["shardId-000000000000".to_string()]);
    }
}

// -------------------------------------------------------------------
// Scenario 5: iterator expiry
// -------------------------------------------------------------------

#[tokio::test]
async fn test_iterator_expires_after_300_seconds() {
    let (cache, clock) = setup();
    create_active(&cache, &clock, "s1", 1).await;

    let iterator = iterator_for(&cache, "s1", "shardId-000000000000", "TRIM_HORIZON").await;

    clock.advance(Duration::from_secs(301));
    let err = cache
        .get_records(
            None,
            &GetRecordsRequest {
                shard_iterator: Some(iterator),
                limit: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "ExpiredIteratorException");
}

#[tokio::test]
async fn test_iterator_still_valid_just_before_expiry() {
    let (cache, clock) = setup();
    create_active(&cache, &clock, "s1", 1).await;

    let iterator = iterator_for(&cache, "s1", "shardId-000000000000", "TRIM_HORIZON").await;
    clock.advance(Duration::from_secs(299));
    assert!(cache
        .get_records(
            None,
            &GetRecordsRequest {
                shard_iterator: Some(iterator),
                limit: None,
            },
        )
        .await
        .is_ok());
}

// -------------------------------------------------------------------
// Scenario 6: PutRecords quota partial failure
// -------------------------------------------------------------------

#[tokio::test]
async fn test_put_records_partial_throughput_failure() {
    let (cache, clock) = setup();
    create_active(&cache, &clock, "s1", 1).await;

    let entries: Vec<PutRecordsRequestEntry> = (0..600)
        .map(|_| PutRecordsRequestEntry {
            data: Some(Bytes::from(vec![7u8; 2048])),
            partition_key: Some("pk".to_string()),
            explicit_hash_key: None,
        })
        .collect();
    // 500 entries per call, so send 500 + 100 inside the same second.
    let mut results = Vec::new();
    for batch in entries.chunks(500) {
        let response = cache
            .put_records(
                None,
                &PutRecordsRequest {
                    stream_name: Some("s1".to_string()),
                    records: Some(batch.to_vec()),
                },
            )
            .await
            .unwrap();
        results.extend(response.records);
    }

    let successful: Vec<_> = results.iter().filter(|r| r.sequence_number.is_some()).collect();
    let failed: Vec<_> = results.iter().filter(|r| r.error_code.is_some()).collect();
    assert!(!successful.is_empty());
    assert!(!failed.is_empty());
    assert_eq!(successful.len() + failed.len(), 600);
    assert!(successful.len() * 2048 <= 1024 * 1024);
    for failure in failed {
        assert_eq!(
            failure.error_code.as_deref(),
            Some("ProvisionedThroughputExceededException")
        );
        assert!(failure.error_message.is_some());
        assert!(failure.sequence_number.is_none());
    }

    // A second later the bucket has refilled.
    clock.advance(Duration::from_secs(1));
    let retry = cache
        .put_records(
            None,
            &PutRecordsRequest {
                stream_name: Some("s1".to_string()),
                records: Some(vec![PutRecordsRequestEntry {
                    data: Some(Bytes::from(vec![7u8; 2048])),
                    partition_key: Some("pk".to_string()),
                    explicit_hash_key: None,
                }]),
            },
        )
        .await
        .unwrap();
    assert_eq!(retry.failed_record_count, 0);
}

#[tokio::test]
async fn test_put_records_preserves_request_order() {
    let (cache, clock) = setup();
    create_active(&cache, &clock, "s1", 1).await;

    let response = cache
        .put_records(
            None,
            &PutRecordsRequest {
                stream_name: Some("s1".to_string()),
                records: Some(
                    (0..10)
                        .map(|i| PutRecordsRequestEntry {
                            data: Some(Bytes::from(format!("r{}", i))),
                            partition_key: Some("pk".to_string()),
                            explicit_hash_key: None,
                        })
                        .collect(),
                ),
            },
        )
        .await
        .unwrap();
    assert_eq!(response.failed_record_count, 0);
    let seqs: Vec<SequenceNumber> = response
        .records
        .iter()
        .map(|r| SequenceNumber::parse(r.sequence_number.as_deref().unwrap()).unwrap())
        .collect();
    for pair in seqs.windows(2) {
        assert!(pair[0] < pair[1]);
    }
}

// -------------------------------------------------------------------
// Delete lifecycle & idempotence
// -------------------------------------------------------------------

#[tokio::test]
async fn test_delete_stream_lifecycle_and_double_delete() {
    let (cache, clock) = setup();
    create_active(&cache, &clock, "s1", 1).await;

    cache
        .delete_stream(
            None,
            &DeleteStreamRequest {
                stream_name: Some("s1".to_string()),
                enforce_consumer_deletion: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(status_of(&cache, "s1").await, "DELETING");

    // Second delete while DELETING is a no-op, not an error.
    cache
        .delete_stream(
            None,
            &DeleteStreamRequest {
                stream_name: Some("s1".to_string()),
                enforce_consumer_deletion: None,
            },
        )
        .await
        .unwrap();

    clock.advance(Duration::from_millis(501));
    cache.fire_due().await;
    let err = cache
        .describe_stream_summary(
            None,
            &DescribeStreamSummaryRequest {
                stream_name: Some("s1".to_string()),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "ResourceNotFoundException");
}

#[tokio::test]
async fn test_add_tags_is_idempotent() {
    let (cache, clock) = setup();
    create_active(&cache, &clock, "s1", 1).await;

    let tags: std::collections::BTreeMap<String, String> =
        [("env".to_string(), "prod".to_string())].into_iter().collect();
    for _ in 0..2 {
        cache
            .add_tags_to_stream(
                None,
                &AddTagsToStreamRequest {
                    stream_name: Some("s1".to_string()),
                    tags: Some(tags.clone()),
                },
            )
            .await
            .unwrap();
    }
    let listed = cache
        .list_tags_for_stream(
            None,
            &ListTagsForStreamRequest {
                stream_name: Some("s1".to_string()),
                exclusive_start_tag_key: None,
                limit: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(listed.tags.len(), 1);
    assert_eq!(listed.tags[0].key, "env");
    assert!(!listed.has_more_tags);
}

// -------------------------------------------------------------------
// UpdateShardCount
// -------------------------------------------------------------------

#[tokio::test]
async fn test_update_shard_count_even_rebalance() {
    let (cache, clock) = setup();
    create_active(&cache, &clock, "s1", 2).await;

    let response = cache
        .update_shard_count(
            None,
            &UpdateShardCountRequest {
                stream_name: Some("s1".to_string()),
                target_shard_count: Some(4),
                scaling_type: Some("UNIFORM_SCALING".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(response.current_shard_count, 2);
    assert_eq!(response.target_shard_count, 4);

    clock.advance(Duration::from_millis(501));
    cache.fire_due().await;

    let shards = shards_of(&cache, "s1").await;
    let open = open_shards(&shards);
    assert_eq!(open.len(), 4);
    // Even tiling, in order, covering everything.
    assert_eq!(open[0].hash_key_range.starting_hash_key, "0");
    assert_eq!(
        open.last().unwrap().hash_key_range.ending_hash_key,
        MAX_HASH.to_string()
    );
    for pair in open.windows(2) {
        let left_end: u128 = pair[0].hash_key_range.ending_hash_key.parse().unwrap();
        let right_start: u128 = pair[1].hash_key_range.starting_hash_key.parse().unwrap();
        assert_eq!(left_end + 1, right_start);
    }
}

#[tokio::test]
async fn test_update_shard_count_rejects_more_than_double() {
    let (cache, clock) = setup();
    create_active(&cache, &clock, "s1", 2).await;

    let err = cache
        .update_shard_count(
            None,
            &UpdateShardCountRequest {
                stream_name: Some("s1".to_string()),
                target_shard_count: Some(5),
                scaling_type: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "InvalidArgumentException");
}

#[tokio::test]
async fn test_update_shard_count_lineage_walk_covers_new_tiling() {
    // Thirds rescaled into halves: every new shard straddles a former
    // boundary, so a reader finishing any original shard must still be able
    // to follow ChildShards all the way into the new tiling.
    let (cache, clock) = setup();
    create_active(&cache, &clock, "s1", 3).await;

    cache
        .update_shard_count(
            None,
            &UpdateShardCountRequest {
                stream_name: Some("s1".to_string()),
                target_shard_count: Some(2),
                scaling_type: Some("UNIFORM_SCALING".to_string()),
            },
        )
        .await
        .unwrap();
    clock.advance(Duration::from_millis(501));
    cache.fire_due().await;

    let shards = shards_of(&cache, "s1").await;
    let open: std::collections::BTreeSet<String> = open_shards(&shards)
        .iter()
        .map(|s| s.shard_id.clone())
        .collect();
    assert_eq!(open.len(), 2);

    let originals = [
        "shardId-000000000000",
        "shardId-000000000001",
        "shardId-000000000002",
    ];
    let mut reached = std::collections::BTreeSet::new();
    let mut seen = std::collections::BTreeSet::new();
    let mut frontier: Vec<String> = originals.iter().map(|s| s.to_string()).collect();
    while let Some(shard_id) = frontier.pop() {
        if !seen.insert(shard_id.clone()) {
            continue;
        }
        let iterator = iterator_for(&cache, "s1", &shard_id, "TRIM_HORIZON").await;
        let got = cache
            .get_records(
                None,
                &GetRecordsRequest {
                    shard_iterator: Some(iterator),
                    limit: None,
                },
            )
            .await
            .unwrap();
        match got.child_shards {
            // A closed, exhausted shard must hand the reader somewhere.
            Some(children) => {
                assert!(!children.is_empty(), "{} is a dead end", shard_id);
                frontier.extend(children.iter().map(|c| c.shard_id.clone()));
            }
            None => {
                assert!(got.next_shard_iterator.is_some());
                reached.insert(shard_id);
            }
        }
    }
    assert_eq!(reached, open);
}

// -------------------------------------------------------------------
// Consumers
// -------------------------------------------------------------------

#[tokio::test]
async fn test_consumer_register_activate_deregister() {
    let (cache, clock) = setup();
    create_active(&cache, &clock, "s1", 1).await;
    let stream_arn = "arn:aws:kinesis:us-east-1:000000000000:stream/s1";

    let registered = cache
        .register_stream_consumer(
            None,
            &RegisterStreamConsumerRequest {
                stream_arn: Some(stream_arn.to_string()),
                consumer_name: Some("app".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(registered.consumer.consumer_status, "CREATING");
    assert!(registered.consumer.consumer_arn.contains("/consumer/app:"));

    clock.advance(Duration::from_millis(501));
    cache.fire_due().await;

    let described = cache
        .describe_stream_consumer(
            None,
            &DescribeStreamConsumerRequest {
                consumer_arn: Some(registered.consumer.consumer_arn.clone()),
                stream_arn: None,
                consumer_name: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(described.consumer_description.consumer_status, "ACTIVE");

    cache
        .deregister_stream_consumer(
            None,
            &DeregisterStreamConsumerRequest {
                consumer_arn: None,
                stream_arn: Some(stream_arn.to_string()),
                consumer_name: Some("app".to_string()),
            },
        )
        .await
        .unwrap();
    clock.advance(Duration::from_millis(501));
    cache.fire_due().await;

    let listed = cache
        .list_stream_consumers(
            None,
            &ListStreamConsumersRequest {
                stream_arn: Some(stream_arn.to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(listed.consumers.is_empty());
}

#[tokio::test]
async fn test_consumer_name_collision_rejected() {
    let (cache, clock) = setup();
    create_active(&cache, &clock, "s1", 1).await;
    let stream_arn = "arn:aws:kinesis:us-east-1:000000000000:stream/s1";

    for expected in ["ok", "ResourceInUseException"] {
        let result = cache
            .register_stream_consumer(
                None,
                &RegisterStreamConsumerRequest {
                    stream_arn: Some(stream_arn.to_string()),
                    consumer_name: Some("app".to_string()),
                },
            )
            .await;
        match result {
            Ok(_) => assert_eq!(expected, "ok"),
            Err(e) => assert_eq!(e.error_code(), expected),
        }
    }
}

// -------------------------------------------------------------------
// Pagination tokens
// -------------------------------------------------------------------

#[tokio::test]
async fn test_list_shards_pagination_and_token_expiry() {
    let (cache, clock) = setup();
    create_active(&cache, &clock, "s1", 5).await;

    let first = cache
        .list_shards(
            None,
            &ListShardsRequest {
                stream_name: Some("s1".to_string()),
                max_results: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(first.shards.len(), 2);
    let token = first.next_token.unwrap();

    let second = cache
        .list_shards(
            None,
            &ListShardsRequest {
                next_token: Some(token.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(second.shards.len(), 2);
    assert_ne!(first.shards[0].shard_id, second.shards[0].shard_id);

    clock.advance(Duration::from_secs(301));
    let err = cache
        .list_shards(
            None,
            &ListShardsRequest {
                next_token: Some(token),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "ExpiredNextTokenException");
}

// -------------------------------------------------------------------
// Regions are isolated
// -------------------------------------------------------------------

#[tokio::test]
async fn test_regions_do_not_share_streams() {
    let (cache, clock) = setup();
    create_active(&cache, &clock, "s1", 1).await;

    let err = cache
        .describe_stream_summary(
            Some("eu-west-1"),
            &DescribeStreamSummaryRequest {
                stream_name: Some("s1".to_string()),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "ResourceNotFoundException");

    // Same name can exist independently per region.
    cache
        .create_stream(
            Some("eu-west-1"),
            &CreateStreamRequest {
                stream_name: Some("s1".to_string()),
                shard_count: Some(2),
                stream_mode_details: None,
            },
        )
        .await
        .unwrap();
    let listed = cache
        .list_streams(Some("eu-west-1"), &ListStreamsRequest::default())
        .await
        .unwrap();
    assert_eq!(listed.stream_names, vec!["s1".to_string()]);
}

// -------------------------------------------------------------------
// Snapshot / restore
// -------------------------------------------------------------------

#[tokio::test]
async fn test_snapshot_restore_is_equivalent() {
    let (cache, clock) = setup();
    create_active(&cache, &clock, "s1", 2).await;
    cache
        .put_record(
            None,
            &PutRecordRequest {
                stream_name: Some("s1".to_string()),
                data: Some(Bytes::from("persisted")),
                partition_key: Some("pk".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    // Leave a pending transition in the queue to prove it survives.
    create_provisioned(&cache, "s2", 1).await;

    let snapshot = cache.snapshot().await;
    let bytes = snapshot.to_bytes().unwrap();

    let restored_cache = Cache::restore(
        EngineConfig::default(),
        clock.clone(),
        Snapshot::from_bytes(&bytes).unwrap(),
    );

    // Bit-equivalent state model after a round trip.
    let again = restored_cache.snapshot().await.to_bytes().unwrap();
    assert_eq!(bytes, again);

    // The pending CREATING → ACTIVE transition still fires.
    clock.advance(Duration::from_millis(501));
    restored_cache.fire_due().await;
    assert_eq!(status_of(&restored_cache, "s2").await, "ACTIVE");

    // Stored records are readable.
    let shards = shards_of(&restored_cache, "s1").await;
    let iterator = iterator_for(&restored_cache, "s1", &shards[0].shard_id, "TRIM_HORIZON").await;
    let got = restored_cache
        .get_records(
            None,
            &GetRecordsRequest {
                shard_iterator: Some(iterator),
                limit: None,
            },
        )
        .await
        .unwrap();
    let other = iterator_for(&restored_cache, "s1", &shards[1].shard_id, "TRIM_HORIZON").await;
    let got_other = restored_cache
        .get_records(
            None,
            &GetRecordsRequest {
                shard_iterator: Some(other),
                limit: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(got.records.len() + got_other.records.len(), 1);
}

// -------------------------------------------------------------------
// Validation collects every failure
// -------------------------------------------------------------------

#[tokio::test]
async fn test_validation_reports_all_fields_at_once() {
    let (cache, _clock) = setup();
    let err = cache
        .create_stream(None, &CreateStreamRequest::default())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "ValidationException");
    let message = err.to_string();
    assert!(message.contains("StreamName"));
    assert!(message.contains("ShardCount"));
}

// -------------------------------------------------------------------
// Retention GC
// -------------------------------------------------------------------

#[tokio::test]
async fn test_retention_sweep_purges_old_records() {
    let (cache, clock) = setup();
    create_active(&cache, &clock, "s1", 1).await;

    cache
        .put_record(
            None,
            &PutRecordRequest {
                stream_name: Some("s1".to_string()),
                data: Some(Bytes::from("doomed")),
                partition_key: Some("pk".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Sail past the 24h retention plus a sweep interval.
    clock.advance(Duration::from_secs(25 * 3600));
    cache.fire_due().await;

    let iterator = iterator_for(&cache, "s1", "shardId-000000000000", "TRIM_HORIZON").await;
    let got = cache
        .get_records(
            None,
            &GetRecordsRequest {
                shard_iterator: Some(iterator),
                limit: None,
            },
        )
        .await
        .unwrap();
    assert!(got.records.is_empty());
}

// -------------------------------------------------------------------
// Limits
// -------------------------------------------------------------------

#[tokio::test]
async fn test_account_shard_limit_enforced() {
    let (cache, _clock) = setup();
    let err = cache
        .create_stream(
            None,
            &CreateStreamRequest {
                stream_name: Some("too-big".to_string()),
                shard_count: Some(51),
                stream_mode_details: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "LimitExceededException");

    // 30 + 30 also trips the account-wide limit of 50.
    create_provisioned(&cache, "first", 30).await;
    let err = cache
        .create_stream(
            None,
            &CreateStreamRequest {
                stream_name: Some("second".to_string()),
                shard_count: Some(30),
                stream_mode_details: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "LimitExceededException");
}

#[tokio::test]
async fn test_consumer_limit_is_twenty() {
    let (cache, clock) = setup();
    create_active(&cache, &clock, "s1", 1).await;
    let stream_arn = "arn:aws:kinesis:us-east-1:000000000000:stream/s1";

    for i in 0..20 {
        cache
            .register_stream_consumer(
                None,
                &RegisterStreamConsumerRequest {
                    stream_arn: Some(stream_arn.to_string()),
                    consumer_name: Some(format!("consumer-{}", i)),
                },
            )
            .await
            .unwrap();
    }
    let err = cache
        .register_stream_consumer(
            None,
            &RegisterStreamConsumerRequest {
                stream_arn: Some(stream_arn.to_string()),
                consumer_name: Some("one-too-many".to_string()),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "LimitExceededException");
}

#[tokio::test]
async fn test_describe_limits_tracks_open_shards() {
    let (cache, clock) = setup();
    create_active(&cache, &clock, "s1", 3).await;

    let limits = cache
        .describe_limits(None, &DescribeLimitsRequest::default())
        .await
        .unwrap();
    assert_eq!(limits.shard_limit, 50);
    assert_eq!(limits.open_shard_count, 3);
    assert_eq!(limits.on_demand_stream_count, 0);
    assert_eq!(limits.on_demand_stream_count_limit, 10);
}

// -------------------------------------------------------------------
// Enhanced monitoring
// -------------------------------------------------------------------

#[tokio::test]
async fn test_enhanced_monitoring_roundtrip() {
    let (cache, clock) = setup();
    create_active(&cache, &clock, "s1", 1).await;

    let enabled = cache
        .enable_enhanced_monitoring(
            None,
            &EnhancedMonitoringRequest {
                stream_name: Some("s1".to_string()),
                shard_level_metrics: Some(vec!["ALL".to_string()]),
            },
        )
        .await
        .unwrap();
    assert!(enabled.current_shard_level_metrics.is_empty());
    assert_eq!(enabled.desired_shard_level_metrics.len(), 7);

    let disabled = cache
        .disable_enhanced_monitoring(
            None,
            &EnhancedMonitoringRequest {
                stream_name: Some("s1".to_string()),
                shard_level_metrics: Some(vec!["IncomingBytes".to_string()]),
            },
        )
        .await
        .unwrap();
    assert_eq!(disabled.current_shard_level_metrics.len(), 7);
    assert_eq!(disabled.desired_shard_level_metrics.len(), 6);
    assert!(!disabled
        .desired_shard_level_metrics
        .contains(&"IncomingBytes".to_string()));
}

#[tokio::test]
async fn test_enhanced_monitoring_rejects_unknown_metric() {
    let (cache, clock) = setup();
    create_active(&cache, &clock, "s1", 1).await;

    let err = cache
        .enable_enhanced_monitoring(
            None,
            &EnhancedMonitoringRequest {
                stream_name: Some("s1".to_string()),
                shard_level_metrics: Some(vec!["BytesPerParsec".to_string()]),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "ValidationException");
}
