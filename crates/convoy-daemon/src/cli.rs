use clap::{Parser, Subcommand};

use convoy_scheduler::ScheduleStatus;

#[derive(Debug, Parser)]
#[command(name = "convoy")]
#[command(about = "Convoy - durable schedules for agent sessions", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to convoy.toml (default: ~/.convoy/convoy.toml)
    #[arg(short, long, global = true, env = "CONVOY_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the schedule worker until interrupted
    Run,

    /// Copy schedules out of the legacy single-record layout
    Migrate,

    /// List stored schedules
    List {
        /// Only schedules created by this user
        #[arg(short, long)]
        user: Option<String>,

        /// Only schedules in this state (active, paused, completed)
        #[arg(short, long)]
        status: Option<ScheduleStatus>,

        /// Only schedules owned by this team
        #[arg(short, long)]
        team: Option<String>,

        /// Output in JSON format
        #[arg(short, long)]
        json: bool,
    },

    /// Run one schedule now, outside its cadence
    Trigger {
        /// Schedule ID
        id: String,
    },
}
