use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use serial_test::serial;

use corpsite::cache::{
    CacheConfig, CacheTag, ChangeConsumer, ChangeEvent, ChangeOperation, ChangeQueue,
    InvalidationRouter, Subject, TagCache,
};
use corpsite::infra::memory::StaticDivisions;

const HOUR: Duration = Duration::from_secs(3600);

#[test]
#[serial]
fn store_counters_track_hits_misses_and_evictions() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        let config = CacheConfig {
            capacity: 1,
            ..Default::default()
        };
        let cache: TagCache<String> = TagCache::new(&config);

        assert!(cache.get("home").is_none());
        cache
            .tagged(&[CacheTag::Clients])
            .put("home", "v1".to_string(), HOUR);
        assert!(cache.get("home").is_some());
        cache
            .tagged(&[CacheTag::Clients])
            .put("about", "v1".to_string(), HOUR);
        assert_eq!(cache.flush_tag(&CacheTag::Clients), 1);
    });

    let counters: HashMap<String, u64> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter_map(|(key, _, _, value)| match value {
            DebugValue::Counter(count) => Some((key.key().name().to_string(), count)),
            _ => None,
        })
        .collect();

    assert_eq!(counters.get("corpsite_cache_hit_total"), Some(&1));
    assert_eq!(counters.get("corpsite_cache_miss_total"), Some(&1));
    assert_eq!(counters.get("corpsite_cache_evict_total"), Some(&1));
    assert_eq!(counters.get("corpsite_cache_tag_flush_total"), Some(&1));
}

#[tokio::test]
#[serial]
async fn invalidation_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let config = CacheConfig::default();
    let cache: Arc<TagCache<String>> = Arc::new(TagCache::new(&config));
    let router = Arc::new(InvalidationRouter::new(
        Arc::new(StaticDivisions::from_pairs([(7, "acme")])),
        cache.clone(),
    ));
    let consumer = ChangeConsumer::new(config, Arc::new(ChangeQueue::new()), router);

    cache
        .tagged(&[CacheTag::Milestones])
        .put("about:history", "timeline".to_string(), HOUR);
    consumer.queue().publish(ChangeEvent::new(
        1,
        ChangeOperation::Created,
        Subject::Milestone,
    ));
    let tags = consumer.consume().await;
    assert!(tags.contains(&CacheTag::Milestones));

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "corpsite_cache_tags_invalidated_total",
        "corpsite_cache_tag_flush_total",
        "corpsite_cache_change_queue_len",
        "corpsite_cache_invalidate_ms",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
