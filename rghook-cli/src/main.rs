use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use rghook_core::checkpoint::{
    CheckpointSerializer, MasterTriggerRestoreHook, VersionedSerializer, create_checkpoint_name,
    parse_checkpoint_id,
};
use rghook_core::reader_group::{CheckpointCompletion, InMemoryReaderGroup};
use rghook_core::{HookConfig, ReaderCheckpointHook};
use tokio::runtime::Handle;

mod logging;

use logging::{LogFormat, init_logging};

#[derive(Parser, Debug)]
#[command(name = "rghook")]
#[command(about = "Reader group checkpoint hook CLI", long_about = None)]
struct Cli {
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Trigger, persist and restore a checkpoint on an in-process reader group.
    Demo {
        #[arg(long, default_value = "reader")]
        reader_name: String,
        #[arg(long, default_value = "demo-rg")]
        group: String,
        #[arg(long, default_value_t = 2)]
        readers: usize,
        #[arg(long, default_value_t = 1)]
        checkpoint_id: u64,
        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,
        #[arg(long, default_value_t = 0)]
        completion_delay_ms: u64,
        /// Never complete the checkpoint, so the trigger times out.
        #[arg(long)]
        stall: bool,
        /// Write the versioned checkpoint bytes to this file.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Convert between checkpoint ids and checkpoint names.
    Name {
        #[command(subcommand)]
        command: NameCommand,
    },
    /// Decode a checkpoint file written by `demo --out`.
    Inspect { path: PathBuf },
}

#[derive(Subcommand, Debug)]
enum NameCommand {
    Encode { checkpoint_id: u64 },
    Decode { name: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format)?;

    match cli.command {
        Commands::Demo {
            reader_name,
            group,
            readers,
            checkpoint_id,
            timeout_ms,
            completion_delay_ms,
            stall,
            out,
        } => {
            if readers == 0 {
                bail!("--readers must be greater than 0");
            }
            let completion = if stall {
                CheckpointCompletion::Never
            } else if completion_delay_ms > 0 {
                CheckpointCompletion::After(Duration::from_millis(completion_delay_ms))
            } else {
                CheckpointCompletion::Immediate
            };
            let reader_group = (0..readers).fold(
                InMemoryReaderGroup::new(group).with_completion(completion),
                |rg, i| rg.with_reader(format!("reader-{i}"), (i as u64 + 1) * 100),
            );
            let reader_group = Arc::new(reader_group);

            let config = HookConfig::new(reader_name)
                .with_trigger_timeout(Duration::from_millis(timeout_ms));
            let hook = ReaderCheckpointHook::new(config, Arc::clone(&reader_group))?;
            println!("hook identifier: {}", hook.identifier());

            let checkpoint = match hook
                .trigger_checkpoint(checkpoint_id, current_unix_millis(), &Handle::current())
                .await
            {
                Ok(checkpoint) => checkpoint,
                Err(err) => {
                    println!("trigger failed: {err}");
                    println!("timer stats: {:?}", hook.timer_stats());
                    hook.shutdown();
                    return Err(err.into());
                }
            };
            println!("checkpoint: {checkpoint}");

            let serializer = hook.create_checkpoint_data_serializer();
            let stored = serializer.serialize_with_version(&checkpoint)?;
            if let Some(path) = out {
                std::fs::write(&path, &stored)
                    .with_context(|| format!("writing checkpoint to {}", path.display()))?;
                println!("wrote {} bytes to {}", stored.len(), path.display());
            }

            for i in 0..readers {
                reader_group.advance(&format!("reader-{i}"), 10 * (i as u64 + 1))?;
            }
            println!("positions before restore: {:?}", reader_group.positions()?);

            let restored = serializer.deserialize_with_version(&stored)?;
            hook.restore_checkpoint(checkpoint_id, Some(restored))?;
            println!("positions after restore:  {:?}", reader_group.positions()?);
            println!("timer stats: {:?}", hook.timer_stats());
            hook.shutdown();
        }
        Commands::Name { command } => match command {
            NameCommand::Encode { checkpoint_id } => {
                println!("{}", create_checkpoint_name(checkpoint_id));
            }
            NameCommand::Decode { name } => {
                println!("{}", parse_checkpoint_id(&name)?);
            }
        },
        Commands::Inspect { path } => {
            let framed = std::fs::read(&path)
                .with_context(|| format!("reading checkpoint from {}", path.display()))?;
            let checkpoint = CheckpointSerializer::new().deserialize_with_version(&framed)?;
            println!("name:         {}", checkpoint.name());
            println!("reader group: {}", checkpoint.reader_group());
            println!("id:           {}", checkpoint.checkpoint_id()?);
            println!("state bytes:  {}", checkpoint.state().len());
        }
    }
    Ok(())
}

fn current_unix_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
