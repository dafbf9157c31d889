//! guestctl - guest address discovery and provisioning
//!
//! Composition root: loads configuration, wires adapters into the core
//! services and renders their results.

mod config;
mod logging;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::{Table, Tabled};
use tracing::info;

use guestctl_core::application::hosts::{render_block, splice_block};
use guestctl_core::application::{AddressProbe, ProbeOutcome, ProbeReport, Provisioner};
use guestctl_core::domain::ProvisionPlan;
use guestctl_core::port::time_provider::SystemTimeProvider;
use guestctl_core::port::CommandChannel;
use guestctl_infra_system::{FsScriptSource, TracingProgress};

use crate::config::GuestctlConfig;

#[derive(Parser)]
#[command(name = "guestctl")]
#[command(about = "Guest address discovery and provisioning", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true, env = "GUESTCTL_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover the primary IPv4 address of guests
    Probe {
        /// Machines to probe (default: all configured machines)
        names: Vec<String>,

        /// Print reports as JSON
        #[arg(long, conflicts_with = "plain")]
        json: bool,

        /// Print `<name> <address>` lines, `# NOT-UP` for failures
        #[arg(long)]
        plain: bool,
    },

    /// Render a hosts block for all configured guests
    Hosts {
        /// Update the managed block in this file instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the provisioning steps for a guest without running them
    Plan {
        /// Machine name
        name: String,

        /// Project directory holding `script/`
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Run install, config and build on a guest
    Provision {
        /// Machine name
        name: String,

        /// Project directory holding `script/`
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Tabled)]
struct ProbeRow {
    #[tabled(rename = "Machine")]
    machine: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&ProbeReport> for ProbeRow {
    fn from(report: &ProbeReport) -> Self {
        let (address, status) = match &report.outcome {
            ProbeOutcome::Address(address) => (address.clone(), "up".to_string()),
            ProbeOutcome::Unknown => ("-".to_string(), "unknown".to_string()),
            ProbeOutcome::NotUp(err) => ("-".to_string(), format!("not up ({})", err)),
        };
        Self {
            machine: report.machine.clone(),
            address,
            status,
        }
    }
}

/// `<name> <address>`, `<name> # NOT-UP`, or the bare name when the guest
/// reported no address
fn plain_line(report: &ProbeReport) -> String {
    match report.outcome.legacy_text() {
        "" => report.machine.clone(),
        text => format!("{} {}", report.machine, text),
    }
}

fn address_probe(config: &GuestctlConfig) -> AddressProbe {
    let channel: Arc<dyn CommandChannel> =
        Arc::new(config.channel(Arc::new(SystemTimeProvider)));
    AddressProbe::new(channel, Arc::new(TracingProgress))
}

async fn run_probe(config: &GuestctlConfig, names: &[String], json: bool, plain: bool) -> Result<()> {
    let machines = config.inventory()?.select(names)?;
    if machines.is_empty() {
        println!("{}", "No machines configured".yellow());
        return Ok(());
    }

    let reports = address_probe(config).survey(&machines).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else if plain {
        for report in &reports {
            println!("{}", plain_line(report));
        }
    } else {
        let rows: Vec<ProbeRow> = reports.iter().map(ProbeRow::from).collect();
        println!("{}", Table::new(rows));
    }
    Ok(())
}

async fn run_hosts(config: &GuestctlConfig, output: Option<&Path>) -> Result<()> {
    let inventory = config.inventory()?;
    let reports = address_probe(config).survey(inventory.machines()).await;
    let block = render_block(&reports);

    match output {
        None => print!("{}", block),
        Some(path) => {
            let existing = match tokio::fs::read_to_string(path).await {
                Ok(text) => text,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
                Err(e) => {
                    return Err(
                        anyhow::Error::new(e).context(format!("Failed to read {}", path.display()))
                    )
                }
            };
            tokio::fs::write(path, splice_block(&existing, &block))
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;

            let up = reports.iter().filter(|r| r.outcome.address().is_some()).count();
            println!(
                "{}",
                format!(
                    "✓ Updated {} ({}/{} machines with an address)",
                    path.display(),
                    up,
                    reports.len()
                )
                .green()
                .bold()
            );
        }
    }
    Ok(())
}

fn build_plan(config: &GuestctlConfig, dir: Option<&Path>) -> Result<ProvisionPlan> {
    let settings = config.provision_settings()?;
    let dir = config.provision_dir(dir);
    Ok(ProvisionPlan::standard(&dir, &settings).with_interpreter(&config.provision.interpreter))
}

fn run_plan(config: &GuestctlConfig, name: &str, dir: Option<&Path>) -> Result<()> {
    let inventory = config.inventory()?;
    let machine = inventory.get(name)?;
    let plan = build_plan(config, dir)?;

    println!("{}", format!("Provisioning plan for {}", machine).cyan().bold());
    println!();
    for (index, step) in plan.steps.iter().enumerate() {
        let privilege = if step.privileged {
            "privileged".red()
        } else {
            "unprivileged".normal()
        };
        println!(
            "  {}. {} [{}]",
            index + 1,
            step.script.display().to_string().bold(),
            privilege
        );
        println!("     {}", step.redacted_command_line(&plan.interpreter)?);
    }
    Ok(())
}

async fn run_provision(config: &GuestctlConfig, name: &str, dir: Option<&Path>) -> Result<()> {
    let inventory = config.inventory()?;
    let machine = inventory.get(name)?;
    let plan = build_plan(config, dir)?;

    let time_provider = Arc::new(SystemTimeProvider);
    let channel: Arc<dyn CommandChannel> = Arc::new(config.channel(time_provider.clone()));
    let provisioner = Provisioner::new(channel, Arc::new(FsScriptSource), time_provider);

    println!("{}", format!("Provisioning {}...", machine).cyan().bold());

    let report = provisioner
        .run(machine, &plan)
        .await
        .with_context(|| format!("Provisioning {} failed", machine))?;

    for step in &report.steps {
        println!("  {} {} ({} ms)", "✓".green(), step.step, step.duration_ms);
    }
    println!();
    println!(
        "{}",
        format!(
            "✓ {} provisioned in {} ms",
            report.machine,
            report.total_duration_ms()
        )
        .green()
        .bold()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = logging::init_logging()?;

    let config = GuestctlConfig::load(cli.config.as_deref())?;
    info!(
        version = guestctl_core::VERSION,
        machines = config.machines.len(),
        transport = config.transport.transport().name(),
        "Configuration loaded"
    );

    match cli.command {
        Commands::Probe { names, json, plain } => run_probe(&config, &names, json, plain).await,
        Commands::Hosts { output } => run_hosts(&config, output.as_deref()).await,
        Commands::Plan { name, dir } => run_plan(&config, &name, dir.as_deref()),
        Commands::Provision { name, dir } => run_provision(&config, &name, dir.as_deref()).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guestctl_core::port::ChannelError;

    fn report(machine: &str, outcome: ProbeOutcome) -> ProbeReport {
        ProbeReport {
            machine: machine.to_string(),
            outcome,
        }
    }

    #[test]
    fn test_plain_line() {
        assert_eq!(
            plain_line(&report("web", ProbeOutcome::Address("10.0.0.5".to_string()))),
            "web 10.0.0.5"
        );
        assert_eq!(
            plain_line(&report(
                "db",
                ProbeOutcome::NotUp(ChannelError::NonZeroExit { code: 1 })
            )),
            "db # NOT-UP"
        );
    }

    #[test]
    fn test_plain_line_without_address_has_no_trailing_space() {
        assert_eq!(plain_line(&report("cache", ProbeOutcome::Unknown)), "cache");
    }
}
