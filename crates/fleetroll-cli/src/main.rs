//! fleetroll: sequential rolling updates for a NixOS k3s fleet
//!
//! Pushes configuration to each host in order, reboots when the kernel
//! changed, waits for the host and its cluster node to recover, and stops at
//! the first failure.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use eyre::bail;
use tracing_subscriber::EnvFilter;

use fleetroll_core::{
    FleetOrchestrator, FleetSummary, KubectlCluster, NixosRebuild, RebootPolicy, RolloutConfig,
    RolloutMode, SshRunnerFactory, TokioClock, select_hosts,
};
use fleetroll_exec::LocalRunner;

mod config;

use config::FleetFile;

#[derive(Parser)]
#[command(name = "fleetroll")]
#[command(about = "Sequential rolling NixOS updates across a k3s fleet", long_about = None)]
struct Cli {
    /// Verify SSH, node health and configuration builds without deploying
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Reboot every host, even without a kernel change
    #[arg(long)]
    reboot: bool,

    /// Never reboot, even when a kernel change is detected
    #[arg(long)]
    no_reboot: bool,

    /// Only process the named hosts (configured order is preserved)
    #[arg(long, value_name = "NAME", num_args = 1..)]
    hosts: Vec<String>,

    /// Path to the fleet configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Flake reference to deploy from, overriding the configuration file
    #[arg(long, value_name = "REF")]
    flake: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Validated here rather than through clap so every startup error shares
    // the same exit status
    let reboot_policy = match (cli.reboot, cli.no_reboot) {
        (true, true) => bail!("--reboot and --no-reboot are mutually exclusive"),
        (true, false) => RebootPolicy::Forced,
        (false, true) => RebootPolicy::Suppressed,
        (false, false) => RebootPolicy::Auto,
    };

    let file = match cli.config {
        Some(ref path) => FleetFile::load(path)?,
        None => FleetFile::load_default()?,
    };

    if file.hosts.is_empty() {
        bail!("fleet configuration contains no hosts");
    }

    let hosts = select_hosts(&file.hosts, &cli.hosts).map_err(|e| eyre::eyre!(e.to_string()))?;

    let mode = if cli.dry_run {
        RolloutMode::DryRun
    } else {
        RolloutMode::Deploy
    };
    let timing = file.timing.to_timing();
    let flake = cli.flake.unwrap_or_else(|| file.flake.clone());

    let names: Vec<&str> = hosts.iter().map(|h| h.name.as_str()).collect();
    println!("Processing {} host(s): {}", hosts.len(), names.join(", "));
    match mode {
        RolloutMode::DryRun => println!("Mode: dry-run (no changes will be made)"),
        RolloutMode::Deploy => println!("Mode: deploy"),
    }

    let local = Arc::new(LocalRunner::new());
    let rollout_config = RolloutConfig {
        mode,
        reboot_policy,
        timing: timing.clone(),
    };

    let orchestrator = FleetOrchestrator::new(
        hosts,
        rollout_config,
        Arc::new(SshRunnerFactory::new(timing.ssh_timeout)),
        Arc::new(NixosRebuild::new(local.clone(), flake)),
        Arc::new(KubectlCluster::new(local, timing.command_timeout())),
        Arc::new(TokioClock),
    );

    let summary = orchestrator.run().await;
    print_summary(&summary);

    if summary.success() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn print_summary(summary: &FleetSummary) {
    println!();
    println!("{:=<60}", "");
    println!(
        "Summary (run started {})",
        summary.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("{:=<60}", "");

    for outcome in &summary.outcomes {
        if outcome.succeeded {
            println!("  ok   {}", outcome.host);
        } else {
            let detail = outcome.detail.as_deref().unwrap_or("unknown failure");
            println!("  FAIL {} at {}: {}", outcome.host, outcome.stage, detail);
        }
    }

    println!();
    if let Some(ref failed) = summary.failed {
        println!("Stopped at {failed}; remaining hosts were not attempted.");
    } else {
        println!("All hosts processed successfully.");
    }
}
