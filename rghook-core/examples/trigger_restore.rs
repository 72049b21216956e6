//! Trigger and restore example
//!
//! This example plays the role of a job's checkpoint coordinator:
//! - Triggers a checkpoint on an in-process reader group
//! - Persists the token through the hook's serializer
//! - Lets the readers move on, then restores them from the stored bytes
//! - Shows a trigger timing out against a reader group that never answers
//!
//! Run with `RUST_LOG=debug` to see the hook's events.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rghook_core::checkpoint::{MasterTriggerRestoreHook, VersionedSerializer};
use rghook_core::reader_group::{CheckpointCompletion, InMemoryReaderGroup};
use rghook_core::{HookConfig, ReaderCheckpointHook};
use tokio::runtime::Handle;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let group = Arc::new(
        InMemoryReaderGroup::new("clicks-rg-7f3a")
            .with_reader("reader-0", 1_000)
            .with_reader("reader-1", 2_500)
            .with_completion(CheckpointCompletion::After(Duration::from_millis(25))),
    );
    let hook = ReaderCheckpointHook::new(
        HookConfig::new("clicks-source").with_trigger_timeout(Duration::from_millis(500)),
        Arc::clone(&group),
    )?;

    let checkpoint = hook.trigger_checkpoint(1, 0, &Handle::current()).await?;
    let serializer = hook.create_checkpoint_data_serializer();
    let stored = serializer.serialize_with_version(&checkpoint)?;
    println!("checkpoint {checkpoint} stored as {} bytes", stored.len());

    group.advance("reader-0", 300)?;
    group.advance("reader-1", 120)?;
    println!("positions after reading on: {:?}", group.positions()?);

    hook.restore_checkpoint(1, Some(serializer.deserialize_with_version(&stored)?))?;
    println!("positions after restore:    {:?}", group.positions()?);

    group.set_completion(CheckpointCompletion::Never)?;
    match hook.trigger(2, 0, &Handle::current()).await {
        Ok(checkpoint) => println!("unexpected checkpoint {checkpoint}"),
        Err(err) => println!("second trigger failed: {err}"),
    }
    println!("timer stats: {:?}", hook.timer_stats());

    hook.shutdown();
    Ok(())
}
