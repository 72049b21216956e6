use super::*;

type Outcome = anyhow::Result<ReaderCheckpoint>;

/// Create a linked promise/pending pair for one checkpoint request.
///
/// The reader group keeps the [`CheckpointPromise`] and settles it once the
/// checkpoint is produced; the hook awaits the [`PendingCheckpoint`].
pub fn checkpoint_promise(name: impl Into<String>) -> (CheckpointPromise, PendingCheckpoint) {
    let name = name.into();
    let (tx, rx) = oneshot::channel();
    let cancel = CancellationToken::new();
    let promise = CheckpointPromise {
        name: name.clone(),
        tx,
        cancel: cancel.clone(),
    };
    let pending = PendingCheckpoint {
        name,
        rx,
        cancel,
        cancel_requested: AtomicBool::new(false),
    };
    (promise, pending)
}

/// Producer side of a checkpoint request.
#[derive(Debug)]
pub struct CheckpointPromise {
    name: String,
    tx: oneshot::Sender<Outcome>,
    cancel: CancellationToken,
}

impl CheckpointPromise {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deliver the produced checkpoint.
    ///
    /// Returns `false` when nobody is waiting any more (the trigger already
    /// timed out or was dropped); the checkpoint is then discarded.
    pub fn complete(self, checkpoint: ReaderCheckpoint) -> bool {
        self.settle(Ok(checkpoint))
    }

    /// Deliver a production failure. Same delivery semantics as [`complete`](Self::complete).
    pub fn fail(self, error: anyhow::Error) -> bool {
        self.settle(Err(error))
    }

    fn settle(self, outcome: Outcome) -> bool {
        let Self { name, tx, .. } = self;
        match tx.send(outcome) {
            Ok(()) => true,
            Err(outcome) => {
                warn!(
                    checkpoint = %name,
                    succeeded = outcome.is_ok(),
                    "discarding late checkpoint result; the trigger already settled"
                );
                false
            }
        }
    }

    /// Whether the consumer asked for the production to stop.
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether the consumer is gone.
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the consumer requested cancellation or went away.
    pub async fn cancelled(&mut self) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = self.tx.closed() => {}
        }
    }
}

/// Consumer side of a checkpoint request.
///
/// Resolves to the produced checkpoint, to the reader group's error as-is, or
/// to a collaborator error when the promise is dropped without being settled.
#[derive(Debug)]
pub struct PendingCheckpoint {
    name: String,
    rx: oneshot::Receiver<Outcome>,
    cancel: CancellationToken,
    cancel_requested: AtomicBool,
}

impl PendingCheckpoint {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask the producer to stop. Advisory: the producer may ignore it.
    ///
    /// Returns `true` only for the first request.
    pub fn request_cancel(&self) -> bool {
        if self.cancel_requested.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.cancel.cancel();
        true
    }
}

impl Future for PendingCheckpoint {
    type Output = HookResult<ReaderCheckpoint>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(Ok(checkpoint))) => Poll::Ready(Ok(checkpoint)),
            Poll::Ready(Ok(Err(error))) => Poll::Ready(Err(HookError::Collaborator(error))),
            Poll::Ready(Err(_)) => Poll::Ready(Err(HookError::Collaborator(anyhow!(
                "reader group dropped checkpoint '{}' without completing it",
                this.name
            )))),
        }
    }
}
