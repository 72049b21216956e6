use super::*;

/// How [`InMemoryReaderGroup`] settles checkpoint requests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CheckpointCompletion {
    /// Complete before `initiate_checkpoint` returns.
    #[default]
    Immediate,
    /// Complete after the given delay.
    After(Duration),
    /// Never complete; only a cancellation ends the request.
    Never,
    /// Fail with the given message.
    Fail(String),
}

/// Counters of the work a reader group has done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReaderGroupStats {
    pub checkpoints_initiated: u64,
    pub resets: u64,
    pub cancellations_observed: u64,
    pub late_results_discarded: u64,
}

#[derive(Debug, Default)]
struct Counters {
    initiated: AtomicU64,
    resets: AtomicU64,
    cancellations: AtomicU64,
    late_discarded: AtomicU64,
}

/// Reader group living in the current process.
///
/// Reader positions are plain offsets. A checkpoint snapshots all of them under
/// one lock at request time and encodes them into the token state.
#[derive(Debug)]
pub struct InMemoryReaderGroup {
    group_name: String,
    positions: Mutex<BTreeMap<String, u64>>,
    completion: Mutex<CheckpointCompletion>,
    honor_cancellation: bool,
    counters: Arc<Counters>,
}

impl InMemoryReaderGroup {
    pub fn new(group_name: impl Into<String>) -> Self {
        Self {
            group_name: group_name.into(),
            positions: Mutex::new(BTreeMap::new()),
            completion: Mutex::new(CheckpointCompletion::default()),
            honor_cancellation: true,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn with_reader(self, reader: impl Into<String>, position: u64) -> Self {
        if let Ok(mut positions) = self.positions.lock() {
            positions.insert(reader.into(), position);
        }
        self
    }

    pub fn with_completion(self, completion: CheckpointCompletion) -> Self {
        if let Ok(mut current) = self.completion.lock() {
            *current = completion;
        }
        self
    }

    /// Keep producing after a cancellation request, so the result arrives late.
    pub fn ignoring_cancellation(mut self) -> Self {
        self.honor_cancellation = false;
        self
    }

    pub fn set_completion(&self, completion: CheckpointCompletion) -> Result<()> {
        *self
            .completion
            .lock()
            .map_err(|_| anyhow!("completion lock poisoned"))? = completion;
        Ok(())
    }

    /// Move `reader` forward by `records`, adding it at 0 if unknown.
    pub fn advance(&self, reader: &str, records: u64) -> Result<u64> {
        let mut positions = self
            .positions
            .lock()
            .map_err(|_| anyhow!("reader positions lock poisoned"))?;
        let position = positions.entry(reader.to_string()).or_insert(0);
        *position += records;
        Ok(*position)
    }

    pub fn positions(&self) -> Result<BTreeMap<String, u64>> {
        Ok(self
            .positions
            .lock()
            .map_err(|_| anyhow!("reader positions lock poisoned"))?
            .clone())
    }

    pub fn stats(&self) -> ReaderGroupStats {
        ReaderGroupStats {
            checkpoints_initiated: self.counters.initiated.load(Ordering::Relaxed),
            resets: self.counters.resets.load(Ordering::Relaxed),
            cancellations_observed: self.counters.cancellations.load(Ordering::Relaxed),
            late_results_discarded: self.counters.late_discarded.load(Ordering::Relaxed),
        }
    }

    fn snapshot(&self, name: &str) -> Result<ReaderCheckpoint> {
        let positions = self
            .positions
            .lock()
            .map_err(|_| anyhow!("reader positions lock poisoned"))?;
        let state = bincode::serialize(&*positions).context("encoding reader positions")?;
        Ok(ReaderCheckpoint::new(self.group_name.clone(), name, state))
    }

    fn completion(&self) -> Result<CheckpointCompletion> {
        Ok(self
            .completion
            .lock()
            .map_err(|_| anyhow!("completion lock poisoned"))?
            .clone())
    }
}

impl ReaderGroup for InMemoryReaderGroup {
    fn group_name(&self) -> &str {
        &self.group_name
    }

    fn initiate_checkpoint(&self, name: &str, executor: &Handle) -> PendingCheckpoint {
        let (mut promise, pending) = checkpoint_promise(name);
        self.counters.initiated.fetch_add(1, Ordering::Relaxed);

        let completion = match self.completion() {
            Ok(completion) => completion,
            Err(err) => {
                promise.fail(err);
                return pending;
            }
        };
        let snapshot = self.snapshot(name);
        let counters = Arc::clone(&self.counters);
        let honor_cancellation = self.honor_cancellation;

        match completion {
            CheckpointCompletion::Immediate => {
                settle(promise, snapshot, &counters);
            }
            CheckpointCompletion::After(delay) => {
                executor.spawn(async move {
                    tokio::select! {
                        _ = promise.cancelled(), if honor_cancellation => {
                            if promise.is_cancel_requested() {
                                counters.cancellations.fetch_add(1, Ordering::Relaxed);
                            }
                            debug!(checkpoint = %promise.name(), "delayed request released");
                        }
                        _ = tokio::time::sleep(delay) => settle(promise, snapshot, &counters),
                    }
                });
            }
            CheckpointCompletion::Never => {
                executor.spawn(async move {
                    promise.cancelled().await;
                    if promise.is_cancel_requested() {
                        counters.cancellations.fetch_add(1, Ordering::Relaxed);
                    }
                    debug!(checkpoint = %promise.name(), "stalled checkpoint request released");
                });
            }
            CheckpointCompletion::Fail(message) => {
                promise.fail(anyhow!(message));
            }
        }
        pending
    }

    fn reset_readers_to_checkpoint(&self, checkpoint: &ReaderCheckpoint) -> Result<()> {
        if checkpoint.reader_group() != self.group_name {
            bail!(
                "checkpoint '{}' belongs to reader group '{}', not '{}'",
                checkpoint.name(),
                checkpoint.reader_group(),
                self.group_name
            );
        }
        let restored: BTreeMap<String, u64> = bincode::deserialize(checkpoint.state())
            .with_context(|| format!("decoding reader positions of '{}'", checkpoint.name()))?;

        *self
            .positions
            .lock()
            .map_err(|_| anyhow!("reader positions lock poisoned"))? = restored;
        self.counters.resets.fetch_add(1, Ordering::Relaxed);
        debug!(reader_group = %self.group_name, checkpoint = %checkpoint.name(), "readers reset");
        Ok(())
    }
}

fn settle(
    promise: CheckpointPromise,
    snapshot: Result<ReaderCheckpoint>,
    counters: &Counters,
) {
    let delivered = match snapshot {
        Ok(checkpoint) => promise.complete(checkpoint),
        Err(err) => promise.fail(err),
    };
    if !delivered {
        counters.late_discarded.fetch_add(1, Ordering::Relaxed);
    }
}
