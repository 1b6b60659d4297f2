use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use audio_arbiter::config::ArbiterConfig;
use audio_arbiter::coordinator::{ArbiterEvent, ArbiterSnapshot, ArbitrationCoordinator};
use audio_arbiter::engine::{StubEngineBackend, SystemTimeSource};
use audio_arbiter::session::{SessionEvent, StubSessionBackend};
use audio_arbiter::telemetry::{self, TelemetrySnapshot};
use audio_arbiter::{EvictionReason, EvictionSignal};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Parser, Debug)]
#[command(
    name = "arbiter_cli",
    about = "Deterministic arbitration walkthroughs against stub backends"
)]
struct Cli {
    /// Override the configuration file (defaults to arbiter_config.json)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Claim the engine for each owner in turn, then release the last one
    Handoff {
        #[arg(long, value_delimiter = ',', default_value = "metronome,tuner")]
        owners: Vec<String>,
    },
    /// Apply device route changes against a single owner
    RouteChange {
        #[arg(long, default_value = "metronome")]
        owner: String,
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
    /// Walk one interruption episode from begin to resume
    Interruption {
        #[arg(long, default_value = "metronome")]
        owner: String,
    },
    /// Print the arbiter and telemetry snapshots
    Snapshot {
        #[arg(long)]
        owner: Option<String>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match cli.config {
        Some(path) => ArbiterConfig::load_from_file(path),
        None => ArbiterConfig::load(),
    };
    let coordinator = new_coordinator(config);

    match cli.command {
        Commands::Handoff { owners } => run_handoff(&coordinator, &owners),
        Commands::RouteChange { owner, count } => run_route_change(&coordinator, &owner, count),
        Commands::Interruption { owner } => run_interruption(&coordinator, &owner),
        Commands::Snapshot { owner } => run_snapshot(&coordinator, owner.as_deref()),
    }
}

fn new_coordinator(config: ArbiterConfig) -> ArbitrationCoordinator {
    ArbitrationCoordinator::with_parts(
        config,
        Arc::new(StubSessionBackend::new()),
        Arc::new(StubEngineBackend::new()),
        Arc::new(SystemTimeSource::default()),
    )
}

fn run_handoff(coordinator: &ArbitrationCoordinator, owners: &[String]) -> Result<ExitCode> {
    let mut events_rx = coordinator.telemetry_receiver();

    let mut signals: Vec<(String, EvictionSignal)> = Vec::new();
    for owner in owners {
        let signal = coordinator.claim(owner.as_str())?;
        signals.push((owner.clone(), signal));
    }

    for (owner, signal) in &mut signals {
        emit_notice(owner, signal)?;
    }

    if let Some(owner) = owners.last() {
        coordinator.release(owner.as_str());
    }

    drain_events(&mut events_rx)?;
    emit_snapshot("settled", coordinator.snapshot())?;
    Ok(ExitCode::from(0))
}

fn run_route_change(
    coordinator: &ArbitrationCoordinator,
    owner: &str,
    count: u32,
) -> Result<ExitCode> {
    let mut events_rx = coordinator.telemetry_receiver();
    let mut signal = coordinator.claim(owner)?;

    for _ in 0..count {
        coordinator.dispatch_event(SessionEvent::RouteChanged);
        emit_notice(owner, &mut signal)?;
    }

    drain_events(&mut events_rx)?;
    emit_snapshot("settled", coordinator.snapshot())?;
    Ok(ExitCode::from(0))
}

fn run_interruption(coordinator: &ArbitrationCoordinator, owner: &str) -> Result<ExitCode> {
    let mut events_rx = coordinator.telemetry_receiver();
    let mut signal = coordinator.claim(owner)?;

    coordinator.dispatch_event(SessionEvent::InterruptionBegan);
    emit_snapshot("interrupted", coordinator.snapshot())?;

    coordinator.dispatch_event(SessionEvent::InterruptionEnded);
    emit_notice(owner, &mut signal)?;

    drain_events(&mut events_rx)?;
    emit_snapshot("settled", coordinator.snapshot())?;
    Ok(ExitCode::from(0))
}

fn run_snapshot(coordinator: &ArbitrationCoordinator, owner: Option<&str>) -> Result<ExitCode> {
    if let Some(owner) = owner {
        coordinator.claim(owner)?;
    }

    let report = SnapshotReport {
        arbiter: coordinator.snapshot(),
        telemetry: telemetry::hub().snapshot(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::from(0))
}

fn emit_notice(owner: &str, signal: &mut EvictionSignal) -> Result<()> {
    while let Some(notice) = signal.try_notice() {
        let line = NoticeLine {
            owner,
            reason: notice.reason,
            failure: notice.failure.map(|err| err.to_string()),
        };
        println!("{}", serde_json::to_string(&line)?);
    }
    Ok(())
}

fn drain_events(events_rx: &mut broadcast::Receiver<ArbiterEvent>) -> Result<()> {
    while let Ok(event) = events_rx.try_recv() {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}

fn emit_snapshot(phase: &str, snapshot: ArbiterSnapshot) -> Result<()> {
    let line = PhaseLine { phase, snapshot };
    println!("{}", serde_json::to_string_pretty(&line)?);
    Ok(())
}

#[derive(Serialize)]
struct NoticeLine<'a> {
    owner: &'a str,
    reason: EvictionReason,
    failure: Option<String>,
}

#[derive(Serialize)]
struct PhaseLine<'a> {
    phase: &'a str,
    snapshot: ArbiterSnapshot,
}

#[derive(Serialize)]
struct SnapshotReport {
    arbiter: ArbiterSnapshot,
    telemetry: TelemetrySnapshot,
}
