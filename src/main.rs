//! Trellis CLI - projects, phases and tasks from the terminal.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;
use trellis::cli::{Cli, Commands, ConfigCommands, PhaseCommands, ProjectCommands, TaskCommands};
use trellis::commands::{self, Output, TaskFields};
use trellis::config::{
    ConfigOverrides, OutputFormat, ResolvedConfig, resolve_config, resolve_config_from,
};
use trellis::storage::{SqliteStore, default_db_path};

/// Environment variable holding the log filter directives.
const LOG_ENV: &str = "TL_LOG";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let overrides = config_overrides(&cli);
    let config = match resolve_config(&overrides) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unreadable config");
            resolve_config_from(None, None, &overrides).unwrap_or_default()
        }
    };
    let human = config.output_format() == OutputFormat::Human;

    if let Err(e) = run_command(cli.command, cli.db_path, &config, human).await {
        if human {
            eprintln!("Error: {}", e);
        } else {
            eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
        }
        process::exit(1);
    }
}

/// Log to stderr so stdout stays machine-readable.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("trellis=debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("trellis=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// CLI flags that take part in config precedence.
fn config_overrides(cli: &Cli) -> ConfigOverrides {
    let mut overrides = ConfigOverrides::new();
    if cli.human_readable {
        overrides = overrides.with_output_format(OutputFormat::Human);
    }
    if let Commands::Tasks(args) = &cli.command {
        if let Some(view) = args.view {
            overrides = overrides.with_default_view(view);
        }
        if let Some(threshold) = args.card_threshold {
            overrides = overrides.with_card_width_threshold(threshold);
        }
    }
    overrides
}

fn open_store(db_path: Option<&Path>) -> Result<SqliteStore, trellis::Error> {
    match db_path {
        Some(path) => SqliteStore::open(path),
        None => SqliteStore::open(&default_db_path()?),
    }
}

async fn run_command(
    command: Commands,
    db_path: Option<PathBuf>,
    config: &ResolvedConfig,
    human: bool,
) -> Result<(), trellis::Error> {
    let db_path = db_path.as_deref();
    match command {
        Commands::Project { command } => match command {
            ProjectCommands::Create {
                name,
                description,
                location,
                timezone,
            } => {
                let store = open_store(db_path)?;
                let result =
                    commands::project_create(&store, name, description, location, timezone)
                        .await?;
                output(&result, human);
            }
            ProjectCommands::List => {
                let store = open_store(db_path)?;
                let result = commands::project_list(&store).await?;
                output(&result, human);
            }
        },

        Commands::Phase { command } => match command {
            PhaseCommands::Create {
                project_id,
                name,
                order,
                description,
            } => {
                let store = open_store(db_path)?;
                let result =
                    commands::phase_create(&store, project_id, name, order, description).await?;
                output(&result, human);
            }
        },

        Commands::Task { command } => match command {
            TaskCommands::Create {
                title,
                phase,
                status,
                assignee,
                priority,
                start,
                due,
                tags,
                links,
                signoff,
            } => {
                let fields = TaskFields {
                    phase_id: phase,
                    status,
                    assignee,
                    priority,
                    start_date: start,
                    due_date: due,
                    tags,
                    links,
                    requires_signoff: signoff,
                };
                let store = open_store(db_path)?;
                let result =
                    commands::task_create(&store, config, title, fields, commands::local_today())
                        .await?;
                output(&result, human);
            }
        },

        Commands::Tasks(args) => {
            let store = open_store(db_path)?;
            let result = commands::tasks(&store, config, &args).await?;
            output(&result, human);
        }

        Commands::Insights { project, today } => {
            let store = open_store(db_path)?;
            let result = commands::insights(&store, project, today).await?;
            output(&result, human);
        }

        Commands::Seed => {
            let store = open_store(db_path)?;
            let result = commands::seed(&store, commands::local_today()).await?;
            output(&result, human);
        }

        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                let result = commands::config_show(config)?;
                output(&result, human);
            }
            ConfigCommands::Set { key, value } => {
                let result = commands::config_set(&key, &value)?;
                output(&result, human);
            }
        },

        #[cfg(feature = "tui")]
        Commands::Tui => {
            let store = open_store(db_path)?;
            trellis::tui::run(&store, config).await?;
        }
    }

    Ok(())
}

fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
