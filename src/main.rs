use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand, ValueEnum};
use monitoring_scheduler::{
    config::Config, logging, systemd_client::DbusSystemdClient, DefinitionSource, Scheduler,
};

#[derive(Parser)]
#[command(
    name = "monitoring-scheduler",
    about = "Install systemd timers for scheduled Ansible roles and playbooks",
    version
)]
struct Cli {
    /// Ansible project directory holding roles/ and playbooks/
    #[arg(long, global = true)]
    project_path: Option<PathBuf>,
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List schedulable definitions
    Discover {
        #[arg(long, value_enum, default_value_t)]
        source: SourceArg,
        /// Print definitions as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write and start a systemd timer for every valid definition
    CreateTimers {
        /// Ansible inventory file passed to each run
        #[arg(long)]
        inventory: Option<String>,
        /// Show what would be done without making changes
        #[arg(long)]
        dry_run: bool,
        #[arg(long, value_enum, default_value_t)]
        source: SourceArg,
    },
    /// Show service and timer state for every definition
    Status {
        #[arg(long, value_enum, default_value_t)]
        source: SourceArg,
    },
    /// Print aggregate statistics as JSON
    Summary {
        #[arg(long, value_enum, default_value_t)]
        source: SourceArg,
    },
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum SourceArg {
    #[default]
    Roles,
    Playbooks,
    All,
}

impl From<SourceArg> for DefinitionSource {
    fn from(source: SourceArg) -> Self {
        match source {
            SourceArg::Roles => DefinitionSource::Roles,
            SourceArg::Playbooks => DefinitionSource::Playbooks,
            SourceArg::All => DefinitionSource::All,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let mut config = Config::from_env()?;
    if let Some(project_path) = cli.project_path {
        config = config.with_project_path(project_path);
    }

    let scheduler = Scheduler::new(config, Arc::new(DbusSystemdClient::new()))?;

    match cli.command {
        Commands::Discover { source, json } => {
            let report = scheduler.discover(source.into());
            if json {
                println!("{}", serde_json::to_string_pretty(&report.definitions)?);
            } else {
                println!("Discovered {} definitions:", report.definitions.len());
                for definition in &report.definitions {
                    println!("  - {}: {}", definition.name, definition.service_name);
                }
                for (candidate, detail) in report.parse_errors() {
                    println!("  ! {} unreadable: {detail}", candidate.name);
                }
                for collision in &report.collisions {
                    println!(
                        "  ! {} skipped: {} already claimed by {}",
                        collision.dropped, collision.service_name, collision.kept
                    );
                }
            }
        }
        Commands::CreateTimers {
            inventory,
            dry_run,
            source,
        } => {
            let inventory = inventory.unwrap_or_else(|| scheduler.config().inventory.clone());
            let report = scheduler.create_timers(&inventory, dry_run, source.into()).await;
            println!(
                "Successfully processed {}/{} definitions",
                report.success_count(),
                report.total
            );
        }
        Commands::Status { source } => {
            let statuses = scheduler.status(source.into()).await;
            println!("\nMonitoring services status ({} definitions):", statuses.len());
            println!("{}", "=".repeat(60));
            for entry in &statuses {
                println!("\n{}", entry.name);
                println!("   Description: {}", entry.description);
                println!("   Schedule: {}", entry.schedule);
                println!("   Service: {}", state_label(entry.status.service_active));
                println!("   Timer: {}", state_label(entry.status.timer_active));
                if let Some(error) = &entry.status.error {
                    println!("   Error: {error}");
                }
            }
        }
        Commands::Summary { source } => {
            let summary = scheduler.summary(source.into());
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}

fn state_label(active: bool) -> &'static str {
    if active {
        "ACTIVE"
    } else {
        "INACTIVE"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed_source(args: &[&str]) -> DefinitionSource {
        let cli = Cli::try_parse_from(args).expect("arguments should parse");
        match cli.command {
            Commands::Discover { source, .. }
            | Commands::CreateTimers { source, .. }
            | Commands::Status { source }
            | Commands::Summary { source } => source.into(),
        }
    }

    #[test]
    fn source_defaults_to_roles() {
        assert_eq!(
            parsed_source(&["monitoring-scheduler", "discover"]),
            DefinitionSource::Roles
        );
    }

    #[test]
    fn source_flag_maps_onto_library_source() {
        assert_eq!(
            parsed_source(&["monitoring-scheduler", "summary", "--source", "playbooks"]),
            DefinitionSource::Playbooks
        );
        assert_eq!(
            parsed_source(&["monitoring-scheduler", "create-timers", "--dry-run", "--source", "all"]),
            DefinitionSource::All
        );
    }
}
