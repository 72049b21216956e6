//! Checkpoint hook: trigger and restore reader-group checkpoints on behalf of
//! the job's checkpoint coordinator.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::HookConfig;
use crate::error::{HookError, HookResult};
use crate::reader_group::ReaderGroup;
use crate::time::{TimerHandle, TimerService, TimerStats};
use crate::types::{CheckpointId, EventTime};

mod governor;
mod hook;
mod master;
mod name;
mod promise;
mod serializer;
mod token;

pub use governor::*;
pub use hook::*;
pub use master::*;
pub use name::*;
pub use promise::*;
pub use serializer::*;
pub use token::*;

#[cfg(test)]
#[path = "tests/checkpoint_tests.rs"]
mod tests;
