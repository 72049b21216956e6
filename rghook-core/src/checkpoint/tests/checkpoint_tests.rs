use super::*;
use crate::reader_group::{CheckpointCompletion, InMemoryReaderGroup};
use proptest::prelude::*;
use std::sync::Mutex;
use tokio::time::Instant;

/// Reader group that parks every request until the test settles it.
#[derive(Default)]
struct ScriptedReaderGroup {
    requested: Mutex<Vec<String>>,
    promises: Mutex<Vec<CheckpointPromise>>,
    resets: Mutex<Vec<ReaderCheckpoint>>,
    reset_error: Option<String>,
}

impl ScriptedReaderGroup {
    fn failing_reset(message: &str) -> Self {
        Self {
            reset_error: Some(message.to_string()),
            ..Self::default()
        }
    }

    fn take_promise(&self, name: &str) -> CheckpointPromise {
        let mut promises = self.promises.lock().unwrap();
        let idx = promises.iter().position(|p| p.name() == name).unwrap();
        promises.remove(idx)
    }
}

impl ReaderGroup for ScriptedReaderGroup {
    fn group_name(&self) -> &str {
        "scripted-rg"
    }

    fn initiate_checkpoint(&self, name: &str, _executor: &Handle) -> PendingCheckpoint {
        let (promise, pending) = checkpoint_promise(name);
        self.requested.lock().unwrap().push(name.to_string());
        self.promises.lock().unwrap().push(promise);
        pending
    }

    fn reset_readers_to_checkpoint(&self, checkpoint: &ReaderCheckpoint) -> anyhow::Result<()> {
        self.resets.lock().unwrap().push(checkpoint.clone());
        match &self.reset_error {
            Some(message) => Err(anyhow!(message.clone())),
            None => Ok(()),
        }
    }
}

fn token(name: &str) -> ReaderCheckpoint {
    ReaderCheckpoint::new("scripted-rg", name, vec![1, 2, 3])
}

fn hook_with<G: ReaderGroup>(group: Arc<G>, timeout: Duration) -> ReaderCheckpointHook<G> {
    ReaderCheckpointHook::new(HookConfig::new("orders-source").with_trigger_timeout(timeout), group)
        .unwrap()
}

// --- name codec ---

#[test]
fn test_checkpoint_name_format() {
    assert_eq!(create_checkpoint_name(42), "PVG-CHK-42");
    assert_eq!(create_checkpoint_name(0), "PVG-CHK-0");
}

#[test]
fn test_parse_checkpoint_id_roundtrip_extremes() {
    for id in [0, 1, 7, u64::MAX] {
        assert_eq!(parse_checkpoint_id(&create_checkpoint_name(id)).unwrap(), id);
    }
}

#[test]
fn test_parse_checkpoint_id_rejects_malformed_names() {
    for name in [
        "",
        "42",
        "CHK-42",
        "pvg-chk-42",
        "PVG-CHK-",
        "PVG-CHK-abc",
        "PVG-CHK-4x2",
        "PVG-CHK- 42",
        "PVG-CHK-+42",
        "PVG-CHK--42",
        "PVG-CHK-18446744073709551616",
    ] {
        let err = parse_checkpoint_id(name).unwrap_err();
        assert!(
            matches!(err, HookError::InvalidFormat { .. }),
            "expected InvalidFormat for {name:?}, got {err}"
        );
    }
}

proptest! {
    #[test]
    fn prop_parse_inverts_create(id in any::<u64>()) {
        let name = create_checkpoint_name(id);
        prop_assert!(name.starts_with(CHECKPOINT_NAME_PREFIX));
        prop_assert_eq!(parse_checkpoint_id(&name).unwrap(), id);
    }

    #[test]
    fn prop_parse_rejects_names_without_prefix(name in "[a-zA-Z0-9-]{0,24}") {
        prop_assume!(!name.starts_with(CHECKPOINT_NAME_PREFIX));
        prop_assert!(parse_checkpoint_id(&name).is_err());
    }
}

// --- token codec ---

#[test]
fn test_serializer_preserves_token_bytes() {
    let serializer = CheckpointSerializer::new();
    let original = ReaderCheckpoint::new("orders-rg", "PVG-CHK-9", vec![0, 255, 7, 0]);

    let bytes = serializer.serialize(&original).unwrap();
    assert_eq!(bytes, original.to_bytes().unwrap());
    let decoded = serializer
        .deserialize(CheckpointSerializer::VERSION, &bytes)
        .unwrap();
    assert_eq!(decoded, original);
    assert_eq!(decoded.checkpoint_id().unwrap(), 9);
}

#[test]
fn test_serializer_rejects_unknown_version() {
    let serializer = CheckpointSerializer::new();
    let bytes = serializer.serialize(&token("PVG-CHK-1")).unwrap();
    let err = serializer.deserialize(2, &bytes).unwrap_err();
    assert!(matches!(err, HookError::UnsupportedVersion { version: 2 }));
}

#[test]
fn test_serializer_rejects_truncated_bytes() {
    let serializer = CheckpointSerializer::new();
    let bytes = serializer.serialize(&token("PVG-CHK-1")).unwrap();
    let err = serializer
        .deserialize(CheckpointSerializer::VERSION, &bytes[..bytes.len() - 2])
        .unwrap_err();
    assert!(matches!(err, HookError::Serialization(_)), "unexpected: {err}");
}

#[test]
fn test_versioned_frame_carries_version() {
    let serializer = CheckpointSerializer::new();
    let framed = serializer.serialize_with_version(&token("PVG-CHK-5")).unwrap();
    assert_eq!(&framed[..4], &1u32.to_be_bytes());
    assert_eq!(
        serializer.deserialize_with_version(&framed).unwrap(),
        token("PVG-CHK-5")
    );
    assert!(matches!(
        serializer.deserialize_with_version(&[0, 0]),
        Err(HookError::Serialization(_))
    ));
}

// --- promise ---

#[tokio::test]
async fn test_promise_failure_is_passed_through_unchanged() {
    let (promise, pending) = checkpoint_promise("PVG-CHK-1");
    assert!(promise.fail(anyhow!("segment store unreachable")));

    let err = pending.await.unwrap_err();
    assert!(matches!(err, HookError::Collaborator(_)));
    assert_eq!(err.to_string(), "segment store unreachable");
}

#[tokio::test]
async fn test_dropped_promise_fails_pending() {
    let (promise, pending) = checkpoint_promise("PVG-CHK-2");
    drop(promise);
    let err = pending.await.unwrap_err();
    assert!(err.to_string().contains("PVG-CHK-2"));
}

#[tokio::test]
async fn test_completion_after_consumer_left_is_not_delivered() {
    let (mut promise, pending) = checkpoint_promise("PVG-CHK-3");
    drop(pending);
    assert!(promise.is_abandoned());
    promise.cancelled().await;
    assert!(!promise.is_cancel_requested());
    assert!(!promise.complete(token("PVG-CHK-3")));
}

#[tokio::test]
async fn test_cancel_request_is_signalled_once() {
    let (mut promise, pending) = checkpoint_promise("PVG-CHK-4");
    assert!(!promise.is_cancel_requested());
    assert!(pending.request_cancel());
    assert!(!pending.request_cancel());
    promise.cancelled().await;
    assert!(promise.is_cancel_requested());
}

// --- governor ---

#[tokio::test(start_paused = true)]
async fn test_governor_propagates_completion_and_disposes_timer() {
    let timers = TimerService::start(&Handle::current());
    let governor = TimeoutGovernor::arm(&timers, "PVG-CHK-1", Duration::from_secs(5)).unwrap();
    assert_eq!(governor.name(), "PVG-CHK-1");
    assert_eq!(governor.timeout(), Duration::from_secs(5));
    let (promise, pending) = checkpoint_promise("PVG-CHK-1");
    promise.complete(token("PVG-CHK-1"));

    let checkpoint = governor.govern(pending).await.unwrap();
    assert_eq!(checkpoint, token("PVG-CHK-1"));
    let stats = timers.stats();
    assert_eq!((stats.registered, stats.disposed, stats.pending), (1, 1, 0));
}

#[tokio::test(start_paused = true)]
async fn test_governor_times_out_and_requests_cancel_once() {
    let timers = TimerService::start(&Handle::current());
    let governor = TimeoutGovernor::arm(&timers, "PVG-CHK-2", Duration::from_millis(100)).unwrap();
    let (promise, pending) = checkpoint_promise("PVG-CHK-2");

    let start = Instant::now();
    let err = governor.govern(pending).await.unwrap_err();
    assert!(start.elapsed() >= Duration::from_millis(100));
    match err {
        HookError::Timeout { name, timeout } => {
            assert_eq!(name, "PVG-CHK-2");
            assert_eq!(timeout, Duration::from_millis(100));
        }
        other => panic!("expected timeout, got {other}"),
    }
    assert!(promise.is_cancel_requested());
    assert!(!promise.complete(token("PVG-CHK-2")));
    assert_eq!(timers.stats().disposed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_governor_prefers_completion_when_both_ready() {
    let timers = TimerService::start(&Handle::current());
    let governor = TimeoutGovernor::arm(&timers, "PVG-CHK-3", Duration::from_millis(10)).unwrap();
    let (promise, pending) = checkpoint_promise("PVG-CHK-3");
    promise.complete(token("PVG-CHK-3"));
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(governor.govern(pending).await.is_ok());
    assert_eq!(timers.stats().disposed, 1);
}

#[tokio::test]
async fn test_governor_reports_shutdown() {
    let timers = TimerService::start(&Handle::current());
    let governor = TimeoutGovernor::arm(&timers, "PVG-CHK-4", Duration::from_secs(60)).unwrap();
    let (promise, pending) = checkpoint_promise("PVG-CHK-4");

    let task = tokio::spawn(governor.govern(pending));
    tokio::task::yield_now().await;
    timers.shutdown();

    assert!(matches!(task.await.unwrap(), Err(HookError::ShutDown)));
    assert!(promise.is_cancel_requested());
    assert_eq!(timers.stats().disposed, 1);
}

// --- hook ---

#[tokio::test]
async fn test_hook_identifier_is_reader_name() {
    let hook = hook_with(Arc::new(ScriptedReaderGroup::default()), Duration::from_secs(1));
    assert_eq!(hook.identifier(), "orders-source");
    assert_eq!(MasterTriggerRestoreHook::identifier(&hook), "orders-source");
    assert_eq!(hook.trigger_timeout(), Duration::from_secs(1));
    assert_eq!(hook.reader_group().group_name(), "scripted-rg");
}

#[test]
fn test_hook_requires_runtime() {
    let err = ReaderCheckpointHook::new(
        HookConfig::new("orders-source"),
        Arc::new(ScriptedReaderGroup::default()),
    )
    .unwrap_err();
    assert!(matches!(err, HookError::Runtime(_)));
}

#[tokio::test]
async fn test_hook_rejects_invalid_config() {
    let err = ReaderCheckpointHook::new(
        HookConfig::new(""),
        Arc::new(ScriptedReaderGroup::default()),
    )
    .unwrap_err();
    assert!(matches!(err, HookError::InvalidConfig(_)));
}

#[tokio::test]
async fn test_hook_rejects_unbounded_timeout_without_panicking() {
    let group = Arc::new(ScriptedReaderGroup::default());
    let err = ReaderCheckpointHook::new(
        HookConfig::new("orders-source").with_trigger_timeout(Duration::MAX),
        Arc::clone(&group),
    )
    .unwrap_err();
    assert!(matches!(err, HookError::InvalidConfig(_)), "unexpected: {err}");
    assert!(group.requested.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_trigger_requests_encoded_name() {
    let group = Arc::new(ScriptedReaderGroup::default());
    let hook = hook_with(Arc::clone(&group), Duration::from_secs(5));

    let future = hook.trigger(42, 1_000, &Handle::current());
    assert_eq!(*group.requested.lock().unwrap(), vec!["PVG-CHK-42".to_string()]);

    group.take_promise("PVG-CHK-42").complete(token("PVG-CHK-42"));
    assert_eq!(future.await.unwrap(), token("PVG-CHK-42"));
    let stats = hook.timer_stats();
    assert_eq!((stats.registered, stats.disposed), (1, 1));
}

#[tokio::test]
async fn test_trigger_failure_is_propagated_unchanged() {
    let group = Arc::new(ScriptedReaderGroup::default());
    let hook = hook_with(Arc::clone(&group), Duration::from_secs(5));

    let future = hook.trigger(3, 0, &Handle::current());
    group
        .take_promise("PVG-CHK-3")
        .fail(anyhow!("reader group sealed"));

    let err = future.await.unwrap_err();
    assert!(matches!(err, HookError::Collaborator(_)));
    assert_eq!(err.to_string(), "reader group sealed");
    assert_eq!(hook.timer_stats().outstanding(), 0);
}

#[tokio::test]
async fn test_concurrent_triggers_are_independent() {
    let group = Arc::new(ScriptedReaderGroup::default());
    let hook = hook_with(Arc::clone(&group), Duration::from_secs(5));

    let first = hook.trigger(1, 0, &Handle::current());
    let second = hook.trigger(2, 0, &Handle::current());
    assert_eq!(hook.timer_stats().pending, 2);

    // Settling the second leaves the first armed.
    group.take_promise("PVG-CHK-2").complete(token("PVG-CHK-2"));
    assert_eq!(second.await.unwrap().name(), "PVG-CHK-2");
    let stats = hook.timer_stats();
    assert_eq!((stats.disposed, stats.pending), (1, 1));

    group.take_promise("PVG-CHK-1").complete(token("PVG-CHK-1"));
    assert_eq!(first.await.unwrap().name(), "PVG-CHK-1");
    assert_eq!(hook.timer_stats().disposed, 2);
}

#[tokio::test]
async fn test_restore_without_checkpoint_is_noop() {
    let group = Arc::new(ScriptedReaderGroup::default());
    let hook = hook_with(Arc::clone(&group), Duration::from_secs(1));

    hook.restore(5, None).unwrap();
    assert!(group.resets.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_restore_forwards_checkpoint_once() {
    let group = Arc::new(ScriptedReaderGroup::default());
    let hook = hook_with(Arc::clone(&group), Duration::from_secs(1));

    hook.restore(5, Some(token("PVG-CHK-5"))).unwrap();
    assert_eq!(*group.resets.lock().unwrap(), vec![token("PVG-CHK-5")]);
}

#[tokio::test]
async fn test_restore_failure_is_propagated() {
    let group = Arc::new(ScriptedReaderGroup::failing_reset("readers offline"));
    let hook = hook_with(Arc::clone(&group), Duration::from_secs(1));

    let err = hook.restore(6, Some(token("PVG-CHK-6"))).unwrap_err();
    assert_eq!(err.to_string(), "readers offline");
    assert_eq!(group.resets.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_trigger_after_shutdown_fails_without_calling_group() {
    let group = Arc::new(ScriptedReaderGroup::default());
    let hook = hook_with(Arc::clone(&group), Duration::from_secs(1));
    hook.shutdown();
    assert!(hook.is_shut_down());

    let err = hook.trigger(8, 0, &Handle::current()).await.unwrap_err();
    assert!(matches!(err, HookError::ShutDown));
    assert!(group.requested.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_shutdown_fails_in_flight_trigger() {
    let group = Arc::new(ScriptedReaderGroup::default());
    let hook = hook_with(Arc::clone(&group), Duration::from_secs(60));

    let future = hook.trigger(9, 0, &Handle::current());
    tokio::task::yield_now().await;
    hook.shutdown();

    assert!(matches!(future.await, Err(HookError::ShutDown)));
    assert!(group.take_promise("PVG-CHK-9").is_cancel_requested());
    assert_eq!(hook.timer_stats().outstanding(), 0);
}

#[tokio::test]
async fn test_master_hook_serializer_matches_token_codec() {
    let group = Arc::new(InMemoryReaderGroup::new("orders-rg").with_reader("r0", 3));
    let hook = hook_with(Arc::clone(&group), Duration::from_secs(1));

    let checkpoint = hook
        .trigger_checkpoint(11, 0, &Handle::current())
        .await
        .unwrap();
    let serializer = hook.create_checkpoint_data_serializer();
    let bytes = serializer.serialize(&checkpoint).unwrap();
    assert_eq!(bytes, hook.token_serializer().serialize(&checkpoint).unwrap());

    let restored = serializer.deserialize(serializer.version(), &bytes).unwrap();
    hook.restore_checkpoint(11, Some(restored)).unwrap();
    assert_eq!(group.stats().resets, 1);
}

#[tokio::test(start_paused = true)]
async fn test_late_result_from_stubborn_group_is_discarded() {
    let group = Arc::new(
        InMemoryReaderGroup::new("orders-rg")
            .with_completion(CheckpointCompletion::After(Duration::from_millis(300)))
            .ignoring_cancellation(),
    );
    let hook = hook_with(Arc::clone(&group), Duration::from_millis(100));

    let err = hook.trigger(12, 0, &Handle::current()).await.unwrap_err();
    assert!(err.is_timeout());

    tokio::time::sleep(Duration::from_millis(300)).await;
    let stats = group.stats();
    assert_eq!(stats.cancellations_observed, 0);
    assert_eq!(stats.late_results_discarded, 1);
}
