//! The reader group the hook checkpoints, and an in-process implementation.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use tokio::runtime::Handle;
use tracing::debug;

use crate::checkpoint::{
    CheckpointPromise, PendingCheckpoint, ReaderCheckpoint, checkpoint_promise,
};

mod memory;

pub use memory::*;

/// A group of stream readers whose combined read position can be captured and
/// restored as one unit.
///
/// How the group produces a consistent snapshot across its readers is up to
/// the implementation; the hook only starts the request and applies results.
pub trait ReaderGroup: Send + Sync + 'static {
    /// Runtime name of the group. Tokens produced by this group carry it.
    fn group_name(&self) -> &str;

    /// Start producing checkpoint `name`.
    ///
    /// `executor` is the coordinator's executor and may be used to run any
    /// background work. The request may receive an advisory cancellation
    /// through its promise; honoring it is optional.
    fn initiate_checkpoint(&self, name: &str, executor: &Handle) -> PendingCheckpoint;

    /// Reposition every reader to `checkpoint`, atomically with respect to the
    /// group.
    fn reset_readers_to_checkpoint(&self, checkpoint: &ReaderCheckpoint) -> Result<()>;
}

#[cfg(test)]
#[path = "tests/reader_group_tests.rs"]
mod tests;
