use super::*;

/// Capability a job's checkpoint coordinator drives for every registered hook.
///
/// The coordinator decides when to trigger and restore and persists whatever
/// [`trigger_checkpoint`](Self::trigger_checkpoint) produces, using the
/// serializer returned by
/// [`create_checkpoint_data_serializer`](Self::create_checkpoint_data_serializer).
pub trait MasterTriggerRestoreHook: Send + Sync {
    type Checkpoint: Send + 'static;

    /// Stable identifier used to match this hook's state on restore.
    fn identifier(&self) -> &str;

    /// Start checkpoint `checkpoint_id`. Completion is delivered on `executor`.
    fn trigger_checkpoint(
        &self,
        checkpoint_id: CheckpointId,
        timestamp: EventTime,
        executor: &Handle,
    ) -> TriggerFuture<Self::Checkpoint>;

    /// Reset to `checkpoint`, or do nothing when the checkpoint carried no
    /// state for this hook.
    fn restore_checkpoint(
        &self,
        checkpoint_id: CheckpointId,
        checkpoint: Option<Self::Checkpoint>,
    ) -> HookResult<()>;

    fn create_checkpoint_data_serializer(&self) -> Box<dyn VersionedSerializer<Self::Checkpoint>>;
}

/// Coordinator-facing handle for one triggered checkpoint.
///
/// The governed trigger runs as a task on the coordinator's executor; this
/// future resolves with its outcome. Dropping it does not stop the trigger,
/// whose timer entry is still released when it settles.
#[derive(Debug)]
pub struct TriggerFuture<T> {
    inner: TriggerInner<T>,
}

#[derive(Debug)]
enum TriggerInner<T> {
    Spawned(JoinHandle<HookResult<T>>),
    Failed(Option<HookError>),
}

impl<T: Send + 'static> TriggerFuture<T> {
    pub(crate) fn spawn_on<F>(executor: &Handle, task: F) -> Self
    where
        F: Future<Output = HookResult<T>> + Send + 'static,
    {
        Self {
            inner: TriggerInner::Spawned(executor.spawn(task)),
        }
    }
}

impl<T> TriggerFuture<T> {
    pub(crate) fn failed(error: HookError) -> Self {
        Self {
            inner: TriggerInner::Failed(Some(error)),
        }
    }
}

impl<T> Future for TriggerFuture<T> {
    type Output = HookResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.inner {
            TriggerInner::Spawned(handle) => match std::task::ready!(Pin::new(handle).poll(cx)) {
                Ok(outcome) => Poll::Ready(outcome),
                Err(join_err) => Poll::Ready(Err(HookError::Runtime(format!(
                    "checkpoint completion task failed: {join_err}"
                )))),
            },
            TriggerInner::Failed(error) => Poll::Ready(Err(error.take().unwrap_or_else(|| {
                HookError::Runtime("trigger future polled after completion".to_string())
            }))),
        }
    }
}
