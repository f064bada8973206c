use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use timepulse::client::HttpMonitorClient;
use timepulse::commands;
use timepulse::commands::tracker::TrackerCommand;
use timepulse::config::{Config, DEFAULT_API_BASE};
use timepulse::db::Database;

#[derive(Parser)]
#[command(name = "timepulse")]
#[command(about = "Track work sessions against the monitor API from the terminal")]
#[command(version)]
struct Cli {
    /// Base URL of the API (must end up with a trailing slash)
    #[arg(long, global = true, env = "TIMEPULSE_API_BASE", default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// Directory holding the local store
    #[arg(long, global = true, env = "TIMEPULSE_HOME")]
    home: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, global = true, default_value_t = 10)]
    timeout: u64,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the API token
    Login {
        username: String,
        #[arg(long, env = "TIMEPULSE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored token
    Logout,

    /// Select the project to track, or show the current selection
    Select {
        /// Project ID
        project: Option<i64>,
        /// Clear the current selection
        #[arg(long, conflicts_with = "project")]
        clear: bool,
    },

    /// Show the current work session
    Status {
        #[command(flatten)]
        target: Target,
    },

    /// Start (or resume) the work session
    Start {
        #[command(flatten)]
        target: Target,
    },

    /// Pause the work session
    Stop {
        #[command(flatten)]
        target: Target,
    },

    /// Start if paused, pause if running
    Toggle {
        #[command(flatten)]
        target: Target,
    },

    /// Live header + monitor view of the work session
    Watch {
        /// Project ID (defaults to the selected project)
        #[arg(short, long, value_parser = clap::value_parser!(i64).range(1..))]
        project: Option<i64>,
    },

    /// Work-session status of every member
    Members {
        #[arg(long)]
        json: bool,
    },

    /// Break sessions
    Break {
        #[command(subcommand)]
        action: BreakCommands,
    },
}

#[derive(clap::Args)]
struct Target {
    /// Project ID (defaults to the selected project)
    #[arg(short, long, value_parser = clap::value_parser!(i64).range(1..))]
    project: Option<i64>,
    /// Print JSON instead of a status line
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum BreakCommands {
    /// Show today's break session
    Status,
    /// List break policies that apply to you
    Policies,
    /// Start a break under a policy
    Start {
        /// Policy ID
        policy_id: i64,
    },
    /// End the current break and resume work
    Stop,
    /// Manage break policies
    Policy {
        #[command(subcommand)]
        action: PolicyCommands,
    },
}

#[derive(Subcommand)]
enum PolicyCommands {
    /// Create a break policy
    Add {
        name: String,
        /// paid or unpaid
        #[arg(long)]
        kind: String,
        /// Daily allowance in minutes (0 means no limit)
        #[arg(long, default_value_t = 0)]
        max_minutes: u32,
        /// Member ID the policy applies to (repeatable)
        #[arg(long = "member")]
        members: Vec<i64>,
        /// Also apply to members who join later
        #[arg(long)]
        apply_to_new: bool,
    },
    /// Delete a break policy
    Rm { policy_id: i64 },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env("TIMEPULSE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn get_db(config: &Config) -> Result<Database> {
    let path = config.ensure_home()?;
    Database::open(&path).context("Failed to open local store")
}

fn get_client(config: &Config) -> Result<HttpMonitorClient> {
    HttpMonitorClient::new(config.api_base.clone(), config.request_timeout)
        .context("Failed to build HTTP client")
}

fn run_tracker(config: &Config, command: TrackerCommand, target: Target) -> Result<()> {
    let db = get_db(config)?;
    let api = Arc::new(get_client(config)?);
    commands::tracker::run(&db, api, command, target.project, target.json)?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = Config::resolve(&cli.api_base, cli.home, cli.timeout)?;
    tracing::debug!(api_base = %config.api_base, home = %config.home.display(), "resolved config");

    match cli.command {
        Commands::Login { username, password } => {
            let db = get_db(&config)?;
            commands::login::login(&db, &get_client(&config)?, &username, &password)
        }

        Commands::Logout => {
            let db = get_db(&config)?;
            commands::login::logout(&db)
        }

        Commands::Select { project, clear } => {
            let db = get_db(&config)?;
            match (project, clear) {
                (_, true) => commands::select::clear(&db),
                (Some(p), false) => commands::select::select(&db, p),
                (None, false) => commands::select::show(&db),
            }
        }

        Commands::Status { target } => run_tracker(&config, TrackerCommand::Status, target),
        Commands::Start { target } => run_tracker(&config, TrackerCommand::Start, target),
        Commands::Stop { target } => run_tracker(&config, TrackerCommand::Stop, target),
        Commands::Toggle { target } => run_tracker(&config, TrackerCommand::Toggle, target),

        Commands::Watch { project } => {
            let db = get_db(&config)?;
            let api = Arc::new(get_client(&config)?);
            commands::watch::run(&db, api, &config, project)
        }

        Commands::Members { json } => {
            let db = get_db(&config)?;
            commands::members::run(&db, &get_client(&config)?, json).map(|_| ())
        }

        Commands::Break { action } => {
            let db = get_db(&config)?;
            let client = get_client(&config)?;
            match action {
                BreakCommands::Status => commands::breaks::status(&db, &client).map(|_| ()),
                BreakCommands::Policies => commands::breaks::policies(&db, &client).map(|_| ()),
                BreakCommands::Start { policy_id } => {
                    commands::breaks::start(&db, &client, None, policy_id).map(|_| ())
                }
                BreakCommands::Stop => commands::breaks::stop(&db, &client, None).map(|_| ()),
                BreakCommands::Policy { action } => match action {
                    PolicyCommands::Add {
                        name,
                        kind,
                        max_minutes,
                        members,
                        apply_to_new,
                    } => commands::breaks::add_policy(
                        &db,
                        &client,
                        &name,
                        &kind,
                        max_minutes,
                        &members,
                        apply_to_new,
                    )
                    .map(|_| ()),
                    PolicyCommands::Rm { policy_id } => {
                        commands::breaks::remove_policy(&db, &client, policy_id)
                    }
                },
            }
        }
    }
}
