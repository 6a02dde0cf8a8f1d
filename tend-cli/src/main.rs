use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod config;
mod state;
mod tasks_cmd;
mod watch;

use crate::state::{TaskStore, ensure_tend_home};

#[derive(Parser, Debug)]
#[command(
    name = "tend",
    version,
    about = "Tasks, repeating tasks and a later list that comes back on time"
)]
struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a task
    Add(tasks_cmd::AddArgs),

    /// List open tasks (primary list by default)
    List {
        /// Show the later list instead
        #[arg(long, default_value_t = false)]
        later: bool,

        /// Show everything, including completed tasks
        #[arg(long, default_value_t = false)]
        all: bool,
    },

    /// Mark a task completed (id or unique id prefix)
    Done { id: String },

    /// Move a task from the later list to the primary list
    Promote { id: String },

    /// Run one sweep now: generate due repeats, promote deferred tasks
    Tick,

    /// Sweep at startup and then periodically until Ctrl-C
    Watch {
        /// Seconds between sweeps (default: config [schedule].tick_seconds)
        #[arg(long)]
        every: Option<u64>,
    },

    /// Config file commands
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default ~/.tend/config.toml if none exists
    Init,

    /// Print the effective config
    Show,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Command::Config { command } = &cli.command {
        return match command {
            ConfigCommand::Init => config::init_config(),
            ConfigCommand::Show => config::show_config(),
        };
    }

    let cfg = config::load_config()?;
    let store = TaskStore::at(cfg.tasks_path(&ensure_tend_home()?));
    tracing::debug!(
        store = %store.path().display(),
        timezone = %cfg.schedule.timezone,
        "loaded config"
    );

    match cli.command {
        Command::Add(args) => tasks_cmd::add(args, &cfg, &store)?,
        Command::List { later, all } => tasks_cmd::list(later, all, &cfg, &store)?,
        Command::Done { id } => tasks_cmd::complete(&id, &store)?,
        Command::Promote { id } => tasks_cmd::promote(&id, &store)?,
        Command::Tick => watch::tick(&cfg, &store)?,
        Command::Watch { every } => watch::watch(&cfg, &store, every).await?,
        Command::Config { .. } => {}
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "tend_core=debug,tend_cli=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}
