use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use metritask::models::{Priority, TaskStatus};
use metritask::projection::{DateWindow, SortKey};

mod cmd;

#[derive(Parser)]
#[command(name = "metritask")]
#[command(version, about = "Command-line client for the MetriTask project tracker")]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Path to metritask.toml. Defaults to ./metritask.toml, then the user config directory
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL. Overrides METRITASK_API_URL and the config file
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Rows per page for list output. Overrides METRITASK_PAGE_SIZE and the config file
    #[arg(long, global = true)]
    pub page_size: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and store the session token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "METRITASK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and store the session token
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "METRITASK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// End the session. The local token is removed even if the backend is unreachable
    Logout,
    /// List, inspect, create, update or delete projects
    Projects {
        #[command(subcommand)]
        command: Option<ProjectsCommands>,
    },
    /// List, create or delete tasks
    Tasks {
        #[command(subcommand)]
        command: TasksCommands,
    },
    /// List registered users (to find ids for `members add`)
    Users,
    /// Show a project's Kanban board
    Board {
        project_id: i64,
    },
    /// Move a task to another column of its project's board
    Move {
        task_id: i64,
        /// Target status: pending, in_progress, completed
        #[arg(long)]
        to: TaskStatus,
        /// Position in the target column (0 = top)
        #[arg(long, default_value = "0")]
        index: usize,
        /// Project the task belongs to
        #[arg(long)]
        project: i64,
    },
    /// Add or remove project members
    Members {
        #[command(subcommand)]
        command: MembersCommands,
    },
    /// Task statistics for a user or a project
    Stats {
        /// User whose assigned tasks are counted
        #[arg(long, conflicts_with = "project")]
        user: Option<i64>,
        /// Project whose tasks are counted
        #[arg(long)]
        project: Option<i64>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

/// Filter/sort/page options shared by list commands.
#[derive(clap::Args, Clone, Debug)]
pub struct ListArgs {
    /// Only entries with this status
    #[arg(long)]
    pub status: Option<String>,
    /// Only entries with this priority: high, medium, low
    #[arg(long)]
    pub priority: Option<Priority>,
    /// Due-date window: this_week, this_month, overdue
    #[arg(long)]
    pub due: Option<DateWindow>,
    /// Sort order: newest, oldest, name, priority
    #[arg(long)]
    pub sort: Option<SortKey>,
    /// Page to show (1-indexed)
    #[arg(long, default_value = "1")]
    pub page: usize,
}

#[derive(Subcommand, Clone)]
pub enum ProjectsCommands {
    /// List projects
    List(ListArgs),
    /// Show one project with its members and statistics
    Show { id: i64 },
    /// Create a project
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, default_value = "medium")]
        priority: Priority,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
    },
    /// Change fields of a project; unset options are left as they are
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Free-form project status, e.g. active, on_hold, completed
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
    },
    /// Delete a project
    Delete { id: i64 },
}

#[derive(Subcommand, Clone)]
pub enum TasksCommands {
    /// List the tasks of a project
    List {
        #[arg(long)]
        project: i64,
        #[command(flatten)]
        list: ListArgs,
    },
    /// Create a task in a project
    Create {
        #[arg(long)]
        project: i64,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, default_value = "pending")]
        status: TaskStatus,
        #[arg(long, default_value = "medium")]
        priority: Priority,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
        /// User the task is assigned to
        #[arg(long)]
        assignee: Option<i64>,
    },
    /// Delete a task
    Delete { id: i64 },
}

#[derive(Subcommand, Clone)]
pub enum MembersCommands {
    /// Add a user to a project
    Add { project_id: i64, user_id: i64 },
    /// Remove a user from a project
    Remove { project_id: i64, user_id: i64 },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default metritask.toml in the current directory
    Init,
}

fn init_tracing(verbose: u8, json: bool) {
    let default = match verbose {
        0 => "metritask=warn",
        1 => "metritask=debug,info",
        _ => "metritask=trace,debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let working_dir = std::env::current_dir().context("Failed to get current directory")?;
    let config = metritask::config::Config::load(cli.config.as_deref(), &working_dir)?
        .with_cli_args(cli.api_url.clone(), cli.page_size);

    match &cli.command {
        Commands::Login { email, password } => cmd::cmd_login(&config, email, password).await?,
        Commands::Register {
            name,
            email,
            password,
        } => cmd::cmd_register(&config, name, email, password).await?,
        Commands::Logout => cmd::cmd_logout(&config).await?,
        Commands::Projects { command } => cmd::cmd_projects(&config, command.clone()).await?,
        Commands::Tasks { command } => cmd::cmd_tasks(&config, command.clone()).await?,
        Commands::Users => cmd::cmd_users(&config).await?,
        Commands::Board { project_id } => cmd::cmd_board(&config, *project_id).await?,
        Commands::Move {
            task_id,
            to,
            index,
            project,
        } => cmd::cmd_move(&config, *project, *task_id, *to, *index).await?,
        Commands::Members { command } => cmd::cmd_members(&config, command.clone()).await?,
        Commands::Stats { user, project } => cmd::cmd_stats(&config, *user, *project).await?,
        Commands::Config { command } => cmd::cmd_config(&config, &working_dir, command.clone())?,
    }

    Ok(())
}
