//! Hour Ledger CLI
//!
//! Command-line front end for the hour ledger:
//! - Account and activity setup (`init`, `user`, `activity`)
//! - Student hour requests and staff review (`request`)
//! - Direct staff logging, leaderboard, accolades (`log`, `leaderboard`, `accolades`)
//! - Ledger maintenance (`audit`, `checkpoint`)
//!
//! There is no session state: commands that act for someone take `--as <username>`.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "hourledger")]
#[command(author, version, about = "Student volunteer hours: requests, approvals, milestones")]
struct Cli {
    /// Directory holding the ledger WAL and snapshot
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// JSON engine config (storage settings, milestone tables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Username to act as
    #[arg(long = "as", global = true, value_name = "USERNAME")]
    as_user: Option<String>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reset the data directory and create default accounts and activities
    Init,

    /// Show students ranked by cumulative hours
    Leaderboard,

    /// Account commands
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Activity commands
    Activity {
        #[command(subcommand)]
        command: ActivityCommands,
    },

    /// Hour request commands
    Request {
        #[command(subcommand)]
        command: RequestCommands,
    },

    /// Log hours for a student directly (staff)
    Log {
        username: String,
        activity: String,
        hours: u32,
    },

    /// View per-activity milestone accolades
    Accolades {
        /// Student to inspect (defaults to `--as`)
        username: Option<String>,
    },

    /// Compare cached hour totals with the log (staff)
    Audit {
        /// Rewrite drifted totals from the log
        #[arg(long)]
        repair: bool,
    },

    /// Fold the WAL into a snapshot
    Checkpoint,
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create an account
    Create {
        /// student | staff
        role: String,
        username: String,
    },
    /// List accounts
    List {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ActivityCommands {
    /// Create an activity
    Create { name: String },
    /// List activities
    List,
}

#[derive(Subcommand)]
enum RequestCommands {
    /// Ask for hours on an activity (student)
    Submit { activity: String, hours: u32 },
    /// Show pending requests (staff: all, student: own)
    List,
    /// Approve a pending request (staff)
    Approve { id: u64 },
    /// Reject a pending request (staff)
    Reject { id: u64 },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ctx = commands::Context::new(cli.data_dir, cli.config, cli.as_user)?;

    match cli.command {
        Commands::Init => commands::cmd_init(&ctx),
        Commands::Leaderboard => commands::cmd_leaderboard(&ctx),
        Commands::User { command } => match command {
            UserCommands::Create { role, username } => {
                commands::cmd_user_create(&ctx, &role, &username)
            }
            UserCommands::List { json } => commands::cmd_user_list(&ctx, json),
        },
        Commands::Activity { command } => match command {
            ActivityCommands::Create { name } => commands::cmd_activity_create(&ctx, &name),
            ActivityCommands::List => commands::cmd_activity_list(&ctx),
        },
        Commands::Request { command } => match command {
            RequestCommands::Submit { activity, hours } => {
                commands::cmd_request_submit(&ctx, &activity, hours)
            }
            RequestCommands::List => commands::cmd_request_list(&ctx),
            RequestCommands::Approve { id } => commands::cmd_request_approve(&ctx, id),
            RequestCommands::Reject { id } => commands::cmd_request_reject(&ctx, id),
        },
        Commands::Log {
            username,
            activity,
            hours,
        } => commands::cmd_log(&ctx, &username, &activity, hours),
        Commands::Accolades { username } => commands::cmd_accolades(&ctx, username.as_deref()),
        Commands::Audit { repair } => commands::cmd_audit(&ctx, repair),
        Commands::Checkpoint => commands::cmd_checkpoint(&ctx),
    }
}
