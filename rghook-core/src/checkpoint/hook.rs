use super::*;

/// Hook run by the job's checkpoint coordinator that triggers and restores
/// checkpoints on a reader group.
///
/// Configuration is fixed at construction and may be read concurrently by any
/// number of in-flight triggers. The hook owns one [`TimerService`] for the
/// trigger deadlines; it is stopped by [`shutdown`](Self::shutdown) or when
/// the hook is dropped.
pub struct ReaderCheckpointHook<G: ReaderGroup> {
    /// Logical operator name, distinct from the reader group's runtime name.
    reader_name: String,
    trigger_timeout: Duration,
    reader_group: Arc<G>,
    serializer: CheckpointSerializer,
    timers: TimerService,
}

impl<G: ReaderGroup> ReaderCheckpointHook<G> {
    /// Build a hook whose timer service runs on the current tokio runtime.
    pub fn new(config: HookConfig, reader_group: Arc<G>) -> HookResult<Self> {
        let runtime = Handle::try_current().map_err(|e| HookError::Runtime(e.to_string()))?;
        Self::with_runtime(config, reader_group, &runtime)
    }

    pub fn with_runtime(
        config: HookConfig,
        reader_group: Arc<G>,
        runtime: &Handle,
    ) -> HookResult<Self> {
        config.validate()?;
        debug!(
            reader = %config.reader_name,
            reader_group = %reader_group.group_name(),
            timeout_ms = config.trigger_timeout.as_millis() as u64,
            "reader checkpoint hook created"
        );
        Ok(Self {
            reader_name: config.reader_name,
            trigger_timeout: config.trigger_timeout,
            reader_group,
            serializer: CheckpointSerializer::new(),
            timers: TimerService::start(runtime),
        })
    }

    pub fn identifier(&self) -> &str {
        &self.reader_name
    }

    pub fn trigger_timeout(&self) -> Duration {
        self.trigger_timeout
    }

    pub fn reader_group(&self) -> &Arc<G> {
        &self.reader_group
    }

    /// Ask the reader group for checkpoint `checkpoint_id`, bounded by the
    /// trigger timeout.
    ///
    /// The returned future resolves on `executor` with the produced token,
    /// [`HookError::Timeout`], or the reader group's own error.
    pub fn trigger(
        &self,
        checkpoint_id: CheckpointId,
        timestamp: EventTime,
        executor: &Handle,
    ) -> TriggerFuture<ReaderCheckpoint> {
        let name = create_checkpoint_name(checkpoint_id);

        let armed = TimeoutGovernor::arm(&self.timers, name.clone(), self.trigger_timeout);
        let governor = match armed {
            Ok(governor) => governor,
            Err(err) => return TriggerFuture::failed(err),
        };

        debug!(
            reader = %self.reader_name,
            checkpoint = %name,
            timestamp,
            "triggering reader group checkpoint"
        );
        let pending = self.reader_group.initiate_checkpoint(&name, executor);

        let reader = self.reader_name.clone();
        TriggerFuture::spawn_on(executor, async move {
            let outcome = governor.govern(pending).await;
            match &outcome {
                Ok(checkpoint) => info!(
                    reader = %reader,
                    checkpoint = %name,
                    state_bytes = checkpoint.state().len(),
                    "reader group checkpoint completed"
                ),
                Err(err) if err.is_timeout() => {}
                Err(err) => warn!(
                    reader = %reader,
                    checkpoint = %name,
                    error = %err,
                    "reader group checkpoint failed"
                ),
            }
            outcome
        })
    }

    /// Reposition every reader in the group to `checkpoint`.
    ///
    /// `None` means the restored checkpoint holds no state for this hook, for
    /// example because the reader was added after it was taken; that is not an
    /// error and the reader group is left untouched.
    pub fn restore(
        &self,
        checkpoint_id: CheckpointId,
        checkpoint: Option<ReaderCheckpoint>,
    ) -> HookResult<()> {
        let Some(checkpoint) = checkpoint else {
            debug!(
                reader = %self.reader_name,
                checkpoint_id,
                "no reader group state in checkpoint; nothing to restore"
            );
            return Ok(());
        };

        self.reader_group
            .reset_readers_to_checkpoint(&checkpoint)
            .map_err(HookError::Collaborator)?;
        info!(
            reader = %self.reader_name,
            checkpoint_id,
            checkpoint = %checkpoint.name(),
            "readers reset to checkpoint"
        );
        Ok(())
    }

    pub fn token_serializer(&self) -> &CheckpointSerializer {
        &self.serializer
    }

    /// Stop the timer service. Pending triggers fail with
    /// [`HookError::ShutDown`], as does every later trigger. Idempotent.
    pub fn shutdown(&self) {
        self.timers.shutdown();
    }

    pub fn is_shut_down(&self) -> bool {
        self.timers.is_shut_down()
    }

    pub fn timer_stats(&self) -> TimerStats {
        self.timers.stats()
    }
}

impl<G: ReaderGroup> MasterTriggerRestoreHook for ReaderCheckpointHook<G> {
    type Checkpoint = ReaderCheckpoint;

    fn identifier(&self) -> &str {
        ReaderCheckpointHook::identifier(self)
    }

    fn trigger_checkpoint(
        &self,
        checkpoint_id: CheckpointId,
        timestamp: EventTime,
        executor: &Handle,
    ) -> TriggerFuture<ReaderCheckpoint> {
        self.trigger(checkpoint_id, timestamp, executor)
    }

    fn restore_checkpoint(
        &self,
        checkpoint_id: CheckpointId,
        checkpoint: Option<ReaderCheckpoint>,
    ) -> HookResult<()> {
        self.restore(checkpoint_id, checkpoint)
    }

    fn create_checkpoint_data_serializer(&self) -> Box<dyn VersionedSerializer<ReaderCheckpoint>> {
        Box::new(self.serializer)
    }
}

impl<G: ReaderGroup> std::fmt::Debug for ReaderCheckpointHook<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderCheckpointHook")
            .field("reader_name", &self.reader_name)
            .field("reader_group", &self.reader_group.group_name())
            .field("trigger_timeout", &self.trigger_timeout)
            .field("timers", &self.timers)
            .finish()
    }
}
