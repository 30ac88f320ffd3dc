//! qosmgrd daemon entry point.
//!
//! Reads configuration trees as YANG JSON files, validates them and prints
//! the command stream that reconciles the dataplane, one command per line
//! as `<op> <target> <command>`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use sonic_cfgmgr_common::{CfgMgrResult, CommandSink, Dataplanes, Operation};
use sonic_qosmgrd::{BondMembership, LimitCapability, Provisioner, QosConfig, QosContext, QosMgr};

#[derive(Debug, Parser)]
#[command(name = "qosmgrd", version, about = "SONiC QoS configuration manager")]
struct Cli {
    /// Queue limit unit of the platform (`packets` or `bytes`). Defaults to
    /// `QOS_LIMIT_CAPABILITY`, then packets.
    #[arg(long, global = true, value_parser = parse_limits)]
    limits: Option<LimitCapability>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Validate a configuration tree.
    Check {
        #[arg(long)]
        config: PathBuf,
    },
    /// Print the commands migrating one tree to another.
    Diff {
        #[arg(long)]
        old: PathBuf,
        #[arg(long)]
        new: PathBuf,
        /// LAG membership used for both trees.
        #[arg(long)]
        membership: Option<PathBuf>,
    },
    /// Apply a tree against the saved state and remember it.
    Apply {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        state_file: PathBuf,
    },
    /// Print the commands for a LAG membership change.
    BondChange {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        old_membership: PathBuf,
        #[arg(long)]
        new_membership: PathBuf,
    },
}

fn parse_limits(s: &str) -> Result<LimitCapability, String> {
    LimitCapability::parse(s).ok_or_else(|| format!("unknown limit capability '{}'", s))
}

/// Initialize tracing/logging.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Dataplane that prints every command to stdout.
struct StdoutDataplane;

impl CommandSink for StdoutDataplane {
    fn store(&mut self, _path: &str, command: &str, target: &str, op: Operation) -> CfgMgrResult<()> {
        println!("{} {} {}", op, target, command);
        Ok(())
    }
}

impl Dataplanes for StdoutDataplane {
    fn for_each_dataplane(
        &mut self,
        pass: &mut dyn FnMut(&mut dyn CommandSink) -> CfgMgrResult<()>,
    ) -> CfgMgrResult<()> {
        pass(self)
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn read_membership(path: &Path) -> Result<BondMembership> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(BondMembership::from_json(&text)?)
}

fn load(path: &Path, membership: Option<&BondMembership>) -> Result<QosConfig> {
    let tree = read_json(path)?;
    let cfg = match membership {
        Some(m) => QosConfig::with_bond_members(&tree, m)?,
        None => QosConfig::new(&tree)?,
    };
    Ok(cfg)
}

fn run(cli: Cli) -> Result<()> {
    let ctx = QosContext::new(cli.limits.unwrap_or_else(LimitCapability::from_env));

    match cli.command {
        Cmd::Check { config } => {
            load(&config, None)?.check()?;
            info!(config = %config.display(), "Configuration is valid");
        }
        Cmd::Diff {
            old,
            new,
            membership,
        } => {
            let membership = membership.as_deref().map(read_membership).transpose()?;
            let old = load(&old, membership.as_ref())?;
            let new = load(&new, membership.as_ref())?;
            new.check()?;
            Provisioner::new(&old, &new, &ctx).apply(&mut StdoutDataplane)?;
        }
        Cmd::Apply { config, state_file } => {
            let mut mgr = QosMgr::new(ctx).with_state_file(&state_file)?;
            mgr.apply_config(read_json(&config)?, &mut StdoutDataplane)?;
        }
        Cmd::BondChange {
            config,
            old_membership,
            new_membership,
        } => {
            let tree = read_json(&config)?;
            let old = read_membership(&old_membership)?;
            let new = read_membership(&new_membership)?;
            Provisioner::for_membership_change(&tree, &old, &new, &ctx)?
                .apply(&mut StdoutDataplane)?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("qosmgrd error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
