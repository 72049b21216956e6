use super::*;

/// Identifier of one registered timer entry.
pub type TimerId = u64;

/// Deadline-ordered timer entries.
///
/// Entries are sorted by deadline in a `BTreeMap`, so the driver can find the
/// next wake-up and drain everything that is due with a range scan.
///
/// # Invariant
/// Every id in `timers` has exactly one sender in `senders`, and vice versa.
#[derive(Debug, Default)]
struct TimerQueue {
    timers: BTreeMap<Instant, BTreeSet<TimerId>>,
    senders: HashMap<TimerId, (Instant, oneshot::Sender<()>)>,
    closed: bool,
}

impl TimerQueue {
    fn register(&mut self, id: TimerId, deadline: Instant, tx: oneshot::Sender<()>) -> bool {
        if self.closed {
            return false;
        }
        self.timers.entry(deadline).or_default().insert(id);
        self.senders.insert(id, (deadline, tx));
        true
    }

    /// Remove an entry. No-op if it already fired or was never registered.
    fn delete(&mut self, id: TimerId) -> bool {
        let Some((deadline, _tx)) = self.senders.remove(&id) else {
            return false;
        };
        if let Some(ids) = self.timers.get_mut(&deadline) {
            ids.remove(&id);
            if ids.is_empty() {
                self.timers.remove(&deadline);
            }
        }
        true
    }

    /// Remove and return the senders of all entries with `deadline <= now`,
    /// in ascending deadline order.
    fn drain_due(&mut self, now: Instant) -> Vec<oneshot::Sender<()>> {
        let due: Vec<Instant> = self.timers.range(..=now).map(|(at, _)| *at).collect();

        let mut fired = Vec::new();
        for deadline in due {
            if let Some(ids) = self.timers.remove(&deadline) {
                for id in ids {
                    if let Some((_, tx)) = self.senders.remove(&id) {
                        fired.push(tx);
                    }
                }
            }
        }
        fired
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.timers.keys().next().copied()
    }

    fn len(&self) -> usize {
        self.senders.len()
    }

    /// Drop every entry and refuse new ones. Dropping a sender wakes its
    /// waiter with a closed-channel error.
    fn close(&mut self) {
        self.closed = true;
        self.timers.clear();
        self.senders.clear();
    }
}

/// State shared between the service, its driver task and outstanding handles.
struct Shared {
    queue: Mutex<TimerQueue>,
    next_id: AtomicU64,
    wake: Notify,
    shutdown: CancellationToken,
    registered: AtomicU64,
    disposed: AtomicU64,
}

impl Shared {
    fn queue(&self) -> HookResult<MutexGuard<'_, TimerQueue>> {
        self.queue
            .lock()
            .map_err(|_| HookError::Runtime("timer queue lock poisoned".to_string()))
    }

    fn fire_due(&self, now: Instant) -> HookResult<()> {
        let fired = self.queue()?.drain_due(now);
        for tx in fired {
            // The receiver is gone when its governor settled at the same instant.
            let _ = tx.send(());
        }
        Ok(())
    }

    fn close(&self) {
        self.shutdown.cancel();
        if let Ok(mut queue) = self.queue() {
            queue.close();
        }
    }
}

/// Counters describing the timer entries a service has handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimerStats {
    /// Entries ever registered.
    pub registered: u64,
    /// Entries disposed by their handle.
    pub disposed: u64,
    /// Entries still waiting for their deadline.
    pub pending: usize,
}

impl TimerStats {
    /// Handles that have not been disposed yet.
    pub fn outstanding(&self) -> u64 {
        self.registered.saturating_sub(self.disposed)
    }
}

/// One cancellable timer service shared by every trigger call of a hook.
///
/// A single driver task sleeps until the earliest deadline and signals the
/// entries that are due. Callers register one entry per request through
/// [`TimerService::schedule`] and release it with [`TimerHandle::dispose`].
pub struct TimerService {
    shared: Arc<Shared>,
}

impl TimerService {
    /// Spawn the driver task on `runtime` and return the running service.
    pub fn start(runtime: &Handle) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(TimerQueue::default()),
            next_id: AtomicU64::new(1),
            wake: Notify::new(),
            shutdown: CancellationToken::new(),
            registered: AtomicU64::new(0),
            disposed: AtomicU64::new(0),
        });
        runtime.spawn(drive(Arc::clone(&shared)));
        Self { shared }
    }

    /// Register an entry that fires `delay` from now.
    pub fn schedule(&self, delay: Duration) -> HookResult<TimerHandle> {
        let deadline = Instant::now().checked_add(delay).ok_or_else(|| {
            HookError::InvalidConfig(format!(
                "timer delay of {}s is out of range",
                delay.as_secs()
            ))
        })?;
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        if !self.shared.queue()?.register(id, deadline, tx) {
            return Err(HookError::ShutDown);
        }
        self.shared.registered.fetch_add(1, Ordering::Relaxed);
        self.shared.wake.notify_one();
        trace!(timer_id = id, delay_ms = delay.as_millis() as u64, "timer registered");

        Ok(TimerHandle {
            id,
            deadline,
            fired: rx,
            shared: Arc::clone(&self.shared),
            disposed: false,
        })
    }

    /// Stop the driver and release every pending entry.
    ///
    /// Waiters on released entries observe [`HookError::ShutDown`]. Idempotent.
    pub fn shutdown(&self) {
        if !self.shared.shutdown.is_cancelled() {
            debug!("timer service shutting down");
        }
        self.shared.close();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }

    pub fn stats(&self) -> TimerStats {
        TimerStats {
            registered: self.shared.registered.load(Ordering::Relaxed),
            disposed: self.shared.disposed.load(Ordering::Relaxed),
            pending: self.shared.queue().map(|q| q.len()).unwrap_or(0),
        }
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        self.shared.close();
    }
}

impl std::fmt::Debug for TimerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerService")
            .field("stats", &self.stats())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

async fn drive(shared: Arc<Shared>) {
    loop {
        let next = match shared.queue() {
            Ok(queue) => queue.next_deadline(),
            Err(_) => break,
        };
        let sleep = async move {
            match next {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            // A new entry may have moved the earliest deadline forward.
            _ = shared.wake.notified() => {}
            _ = sleep => {
                if shared.fire_due(Instant::now()).is_err() {
                    break;
                }
            }
        }
    }
    shared.close();
    debug!("timer service driver stopped");
}

/// A registered timer entry owned by exactly one request.
///
/// The entry is deregistered exactly once: by [`TimerHandle::dispose`], or on
/// drop if the owner never disposed it.
pub struct TimerHandle {
    id: TimerId,
    deadline: Instant,
    fired: oneshot::Receiver<()>,
    shared: Arc<Shared>,
    disposed: bool,
}

impl TimerHandle {
    pub fn id(&self) -> TimerId {
        self.id
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Wait for the deadline.
    ///
    /// Fails with [`HookError::ShutDown`] when the service stops first.
    /// Must not be awaited again after it has returned.
    pub async fn fired(&mut self) -> HookResult<()> {
        (&mut self.fired).await.map_err(|_| HookError::ShutDown)
    }

    /// Deregister the entry.
    pub fn dispose(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if let Ok(mut queue) = self.shared.queue() {
            queue.delete(self.id);
        }
        self.shared.disposed.fetch_add(1, Ordering::Relaxed);
        trace!(timer_id = self.id, "timer disposed");
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("id", &self.id)
            .field("deadline", &self.deadline)
            .field("disposed", &self.disposed)
            .finish()
    }
}
