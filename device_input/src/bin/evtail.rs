// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words evtail evdev

//! Prints the events of an input device, like `tail -f` for evdev.
//!
//! ```text
//! evtail /dev/input/event3 --no-grab --mode pull --count 20
//! ```

use clap::{Parser, ValueEnum};
use miette::IntoDiagnostic;
use r3bl_device_input::{DeviceId, DeviceRegistry, DisplayPreference, DispatchQueue,
                        EventConsumer, InputEvent, TracingConfig, WriterConfig,
                        try_initialize_logging_global};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing_core::LevelFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Attach a consumer, events arrive in batches on a dispatch queue.
    Push,
    /// Pull events one at a time from an async iterator.
    Pull,
}

/// More info: <https://docs.rs/clap/latest/clap/_derive/_tutorial/chapter_2/index.html>
#[derive(Debug, Parser)]
#[command(bin_name = "evtail")]
#[command(about = "Print the events of a Linux input device")]
#[command(version)]
#[command(next_line_help = true)]
struct CliArgs {
    /// Path of the device, e.g. `/dev/input/event3`.
    device: PathBuf,

    #[arg(long, help = "Don't take exclusive access of the device")]
    no_grab: bool,

    #[arg(long, value_enum, default_value_t = Mode::Pull)]
    mode: Mode,

    #[arg(long, short = 'n', help = "Exit after this many events")]
    count: Option<usize>,

    #[arg(long, default_value_t = tracing::Level::INFO)]
    log_level: tracing::Level,

    #[arg(long, help = "Also write logs to this file")]
    log_file: Option<String>,
}

// The `tokio::main` macro calls `.expect()` when building the runtime.
#[tokio::main]
#[allow(clippy::unwrap_in_result)]
async fn main() -> miette::Result<()> {
    let args = CliArgs::parse();

    let writer_config = match args.log_file.clone() {
        Some(file) => WriterConfig::DisplayAndFile(DisplayPreference::Stderr, file),
        None => WriterConfig::Display(DisplayPreference::Stderr),
    };
    try_initialize_logging_global(TracingConfig {
        writer_config,
        level_filter: LevelFilter::from_level(args.log_level),
    })?;

    let device = DeviceId::new(&args.device).with_grab(!args.no_grab);
    let limit = args.count.unwrap_or(usize::MAX);

    match args.mode {
        Mode::Push => run_push(device, limit).await,
        Mode::Pull => run_pull(device, limit).await,
    }
}

async fn run_pull(device: DeviceId, limit: usize) -> miette::Result<()> {
    let mut events = DeviceRegistry::global().events(device);

    let token = events.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let mut printed = 0;
    while printed < limit
        && let Some(event) = events.next().await?
    {
        println!("{}", format_event(&event));
        printed += 1;
    }

    events.finish().await?;
    Ok(())
}

async fn run_push(device: DeviceId, limit: usize) -> miette::Result<()> {
    let registry = DeviceRegistry::global();
    let (sender, mut receiver) = mpsc::unbounded_channel::<InputEvent>();

    let queue = DispatchQueue::on_runtime("evtail", &tokio::runtime::Handle::current());
    let consumer = EventConsumer::new(queue, move |_, events| {
        for event in events {
            drop(sender.send(*event));
        }
    });
    let handle = registry.attach(&device, consumer)?;

    let mut printed = 0;
    while printed < limit {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.into_diagnostic()?;
                break;
            }
            event = receiver.recv() => {
                let Some(event) = event else { break };
                println!("{}", format_event(&event));
                printed += 1;
            }
        }
    }

    handle.detach()?;
    Ok(())
}

fn format_event(event: &InputEvent) -> String {
    let character = event
        .code
        .character()
        .map(|it| format!(" '{it}'"))
        .unwrap_or_default();
    format!(
        "{} {} {} {}{character}",
        event.timestamp.format("%H:%M:%S%.6f"),
        event.kind,
        event.code,
        event.value
    )
}
