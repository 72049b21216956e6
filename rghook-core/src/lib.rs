//! # rghook core
//!
//! Checkpoint hook that lets a job's checkpoint coordinator snapshot and
//! restore a group of stream readers as one unit.
//!
//! - [`checkpoint`] — the hook itself: [`ReaderCheckpointHook`](checkpoint::ReaderCheckpointHook),
//!   checkpoint naming, the [`ReaderCheckpoint`](checkpoint::ReaderCheckpoint) token and its
//!   serializer, and the [`TimeoutGovernor`](checkpoint::TimeoutGovernor) bounding each trigger.
//! - [`reader_group`] — the [`ReaderGroup`](reader_group::ReaderGroup) the hook drives, plus an
//!   in-process implementation.
//! - [`time`] — the shared [`TimerService`](time::TimerService) backing trigger deadlines.
//! - [`config`], [`error`], [`types`] — settings, error taxonomy and identifiers.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod reader_group;
pub mod time;
pub mod types;

pub use checkpoint::{ReaderCheckpoint, ReaderCheckpointHook};
pub use config::HookConfig;
pub use error::{HookError, HookResult};
