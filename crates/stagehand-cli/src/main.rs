//! Stagehand - dependency revisions and staged rollouts
//!
//! Usage:
//!   stagehand ingest               # Record new versions from configured sources
//!   stagehand recompute            # Derive the next revision
//!   stagehand advance <stage>      # Promote a stage one hop
//!   stagehand summary <stage>      # Show what a stage is pinned to
//!   stagehand status               # Show revisions and stage pointers

mod workspace;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stagehand_core::config::load_config;
use stagehand_core::revision::UpdateTarget;
use stagehand_core::sources::ConfiguredSources;
use stagehand_core::stage::{StageAdvance, StageSummary};

use crate::workspace::Workspace;

#[derive(Parser)]
#[command(name = "stagehand")]
#[command(about = "Dependency revisions and staged rollouts", long_about = None)]
struct Cli {
    /// Path to stagehand.toml
    #[arg(long, short, global = true, default_value = "stagehand.toml")]
    config: PathBuf,

    /// Deployment to operate on (multi-deployment specs)
    #[arg(long, short, global = true)]
    deployment: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record new versions from the configured sources
    Ingest {
        /// Exit non-zero if any dependency failed to ingest
        #[arg(long)]
        strict: bool,
    },

    /// Derive the next revision from the ledger
    Recompute {
        /// Only move this dependency ("*" for all)
        #[arg(long, default_value = "*")]
        dependency: String,
    },

    /// Advance a stage to the revision its predecessor holds
    Advance {
        /// Stage name
        stage: String,
    },

    /// Show the versions a stage is pinned to
    Summary {
        /// Stage name
        stage: String,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Show latest revisions and stage pointers
    Status,
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stagehand=info,stagehand_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let (mut workspace, store) = Workspace::open(&config, cli.deployment)?;

    match cli.command {
        Commands::Ingest { strict } => {
            let mut sources = ConfiguredSources::from_config(&config);
            let report = workspace.ingest(&mut sources);
            for (name, versions) in &report.appended {
                println!("{name}: +{}", versions.join(", +"));
            }
            for (name, err) in &report.failures {
                eprintln!("{name}: {err}");
            }
            // Partial progress is kept even when some names failed
            workspace.save(&store)?;
            if strict && !report.is_clean() {
                anyhow::bail!("{} dependencies failed to ingest", report.failures.len());
            }
            if report.appended_count() == 0 {
                println!("No new versions");
            }
        }
        Commands::Recompute { dependency } => {
            let target = UpdateTarget::parse(&dependency);
            match workspace.recompute(&target)? {
                Some(revision) => {
                    println!("Revision {}", revision.id);
                    for (name, version) in &revision.versions {
                        println!("  {name}: {version}");
                    }
                    workspace.save(&store)?;
                }
                None => println!("No changes"),
            }
        }
        Commands::Advance { stage } => match workspace.advance(&stage)? {
            StageAdvance::Advanced { from, to } => {
                println!("{stage}: {} -> {to}", display_revision(from));
                workspace.save(&store)?;
            }
            StageAdvance::Unchanged { revision } => {
                println!("{stage}: already at {}", display_revision(revision));
                // A first advance creates the stage entry even without moving
                workspace.save(&store)?;
            }
        },
        Commands::Summary { stage, format } => {
            let summary = workspace.summary(&stage)?;
            print_summary(&summary, format)?;
        }
        Commands::Status => {
            for deployment in workspace.status() {
                let latest = deployment
                    .latest
                    .map_or_else(|| "none".to_string(), |id| id.to_string());
                println!("{} (latest revision: {latest})", deployment.name);
                for (stage, pin) in deployment.stages {
                    let pin = pin.map_or_else(|| "-".to_string(), display_revision);
                    println!("  {stage:<16} {pin}");
                }
            }
        }
    }

    Ok(())
}

fn display_revision(id: i64) -> String {
    if id < 0 {
        "unpromoted".to_string()
    } else {
        id.to_string()
    }
}

fn print_summary(summary: &StageSummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary)?);
        }
        OutputFormat::Table => {
            println!("{} @ revision {}", summary.stage, summary.revision);
            if !summary.environments.is_empty() {
                println!("environments: {}", summary.environments.join(", "));
            }
            for (name, version) in &summary.versions {
                println!("  {name:<24} {version}");
                if let Some(meta) = summary.meta.get(name) {
                    for (key, value) in meta {
                        let value = serde_json::to_string(value)?;
                        println!("    {key}: {value}");
                    }
                }
            }
        }
    }
    Ok(())
}
