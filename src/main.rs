//! # Hygrolog Application Entry Point
//!
//! Wires the external collaborators together: command-line options, the
//! serial transport, the shutdown signal flag and stderr logging. All data
//! processing lives in the library; this binary only configures and runs
//! the reconstruction loop against standard output.

// Test modules
#[cfg(test)]
mod tests;

use anyhow::Context;
use clap::Parser;
use hygrolog_lib::config::Config;
use hygrolog_lib::reconstruct::StreamReconstructor;
use hygrolog_lib::serial::SerialSource;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Log temperature and relative humidity from a serial sensor device.
#[derive(Parser, Debug)]
#[command(name = "hygrolog", version, about)]
struct Cli {
    /// Serial device the sensor is attached to (e.g. /dev/ttyUSB0)
    device: String,

    /// Output format string. Allows the same directives as strftime plus
    /// %vC (temperature in degrees Celsius), %vF (temperature in degrees
    /// Fahrenheit) and %vH (relative humidity in percent); the format
    /// modifiers of printf's %f can be applied to the %v directives.
    #[arg(short = 'f', long = "format")]
    format: Option<String>,

    /// Update interval in seconds
    #[arg(short = 'i', long = "interval")]
    interval: Option<u64>,

    /// Display time in UTC instead of local time
    #[arg(short = 'u', long = "utc")]
    utc: bool,

    /// Increase verbosity (repeatable)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Map repeated `-v` flags to a log level: errors only by default, one
/// step more per flag.
fn verbosity_level(count: u8) -> log::LevelFilter {
    match count {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Warn,
        2 => log::LevelFilter::Info,
        3 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// Merge the optional config file with command-line overrides.
fn effective_config(cli: &Cli) -> Config {
    let mut config = Config::load();
    if let Some(format) = &cli.format {
        config.template = format.clone();
    }
    if let Some(interval) = cli.interval {
        config.interval_secs = interval;
    }
    if cli.utc {
        config.utc = true;
    }
    config
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(verbosity_level(cli.verbose))
        .init();

    let config = effective_config(&cli);
    config.validate()?;

    // The loop polls this flag once per bounded-timeout read, so shutdown
    // latency is bounded by the read timeout.
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            log::info!("received signal, finishing current operation");
            shutdown.store(true, Ordering::Relaxed);
        })
        .context("failed to install signal handler")?;
    }

    let mut source = SerialSource::open(&cli.device)
        .with_context(|| format!("failed to connect to remote device via {}", cli.device))?;

    let stdout = io::stdout();
    let mut reconstructor = StreamReconstructor::new(&config, stdout.lock());
    reconstructor.run(&mut source, &shutdown)?;
    Ok(())
}
