//! Debug Console host runner
//!
//! Binds the console driver against an in-process device registry, with
//! stdin as debug input and stderr as debug output, then echoes
//! everything read from the device back through its write path.
//!
//! Usage:
//!   debug-console [--config console.toml] [--limit N] [--no-echo]

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dddk_runtime::{
    BindContext, DeviceOps, DeviceRegistry, DeviceState, Driver, DriverMetadata,
    HostDebugChannel,
};
use debug_console::{ConsoleConfig, ConsoleDriver};

#[derive(Parser, Debug)]
#[command(name = "debug-console")]
#[command(about = "Relay the debug channel through the buffered console device")]
struct Args {
    /// Console config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop after relaying this many bytes
    #[arg(long)]
    limit: Option<u64>,

    /// Print relayed bytes to stdout instead of echoing them to the debug output
    #[arg(long)]
    no_echo: bool,
}

/// Bytes drained from the device per read
const CHUNK: usize = 64;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ConsoleConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => ConsoleConfig::default(),
    };

    log::info!(
        "{} driver v{}: device={} reader={} policy={:?}",
        ConsoleDriver::driver_name(),
        ConsoleDriver::driver_version(),
        config.device_name,
        config.reader_name,
        config.reader_policy
    );

    let registry = Arc::new(DeviceRegistry::new());
    let parent = registry.root("misc");
    let channel = Arc::new(HostDebugChannel::new().context("Failed to open debug input")?);
    let ctx = BindContext::new(registry.clone(), parent, channel.clone());

    let driver = ConsoleDriver::new(config);
    let console = driver
        .bind(&ctx)
        .context("Failed to bind console")?;

    let mut buf = [0u8; CHUNK];
    let mut relayed: u64 = 0;
    let stdout = std::io::stdout();

    loop {
        if args.limit.is_some_and(|limit| relayed >= limit) {
            break;
        }

        if !console
            .device()
            .wait_for(DeviceState::READABLE, Duration::from_millis(200))
        {
            if channel.at_eof() && console.pending() == 0 {
                break;
            }
            continue;
        }

        let n = match console.read(&mut buf, 0) {
            Ok(n) => n,
            Err(err) if err.is_should_wait() => continue,
            Err(err) => return Err(err).context("Console read failed"),
        };
        relayed += n as u64;

        if args.no_echo {
            let mut out = stdout.lock();
            out.write_all(&buf[..n]).context("Failed to write stdout")?;
            out.flush().context("Failed to flush stdout")?;
        } else {
            console.write(&buf[..n], 0).context("Console write failed")?;
        }
    }

    log::info!(
        "Relayed {} bytes ({} dropped on overflow)",
        relayed,
        console.dropped_bytes()
    );
    console.release();
    Ok(())
}
