use super::*;

/// Bounds how long a single trigger may stay pending.
///
/// Each trigger arms its own governor, which owns one entry in the hook's
/// [`TimerService`]. The entry is released exactly once on whichever path
/// settles the trigger; a governor is consumed by [`govern`](Self::govern)
/// and can't be reused.
#[derive(Debug)]
pub struct TimeoutGovernor {
    name: String,
    timeout: Duration,
    timer: TimerHandle,
}

impl TimeoutGovernor {
    /// Register the deadline for checkpoint `name`.
    pub fn arm(
        timers: &TimerService,
        name: impl Into<String>,
        timeout: Duration,
    ) -> HookResult<Self> {
        let timer = timers.schedule(timeout)?;
        Ok(Self {
            name: name.into(),
            timeout,
            timer,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Race `pending` against the deadline.
    ///
    /// If production settles first its outcome is returned unchanged. If the
    /// deadline passes first, cancellation is requested without waiting for it
    /// to take effect and the trigger fails with [`HookError::Timeout`]. When
    /// both are ready at once, the produced outcome wins.
    pub async fn govern(self, mut pending: PendingCheckpoint) -> HookResult<ReaderCheckpoint> {
        let Self {
            name,
            timeout,
            mut timer,
        } = self;

        let outcome = tokio::select! {
            biased;
            result = &mut pending => result,
            fired = timer.fired() => {
                pending.request_cancel();
                match fired {
                    Ok(()) => {
                        warn!(
                            checkpoint = %name,
                            timeout_ms = timeout.as_millis() as u64,
                            "checkpoint did not complete in time; cancellation requested"
                        );
                        Err(HookError::Timeout { name, timeout })
                    }
                    Err(err) => Err(err),
                }
            }
        };

        timer.dispose();
        outcome
    }
}
