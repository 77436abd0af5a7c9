use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use stackpause_core::{Notifier, TracingNotifier};
use stackpause_orchestrator::Command;

mod commands;

#[derive(Parser)]
#[command(
    name = "stackpause",
    about = "stackpause: suspend and resume a multi-tier repository stack",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Session config document (TOML)
    #[arg(short, long, global = true, default_value = "config/scaling.toml")]
    config: PathBuf,
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up Solr collections, then park every environment.
    ///
    /// The backup names are written back to the config document so the
    /// next `resume` can restore them.
    Suspend,
    /// Bring every tier back in dependency order and restore collections.
    Resume,
    /// Resume every environment without touching collections
    ForceUp,
    /// Park every environment without backing anything up
    ForceDown,
    /// Drop one collection and restore it from its recorded backup
    Resolr {
        /// Collection name
        collection: String,
    },
    /// Re-elect every shard leader
    ReplaceLeaders,
    /// Instance counts and health per environment
    Status,
    /// Per-core index statistics
    SolrStatus {
        /// Node names (`host:port_solr`); every live node if omitted
        nodes: Vec<String>,
    },
    /// Repair replica counts on each collection's first shard
    Replicate,
    /// List collections
    Collections,
}

impl From<Commands> for Command {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Suspend => Command::Suspend,
            Commands::Resume => Command::Resume,
            Commands::ForceUp => Command::ForceUp,
            Commands::ForceDown => Command::ForceDown,
            Commands::Resolr { collection } => Command::Resolr { collection },
            Commands::ReplaceLeaders => Command::ReplaceLeaders,
            Commands::Status => Command::Status,
            Commands::SolrStatus { nodes } => Command::SolrStatus { nodes },
            Commands::Replicate => Command::Replicate,
            Commands::Collections => Command::Collections,
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,stackpause=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    let command = Command::from(cli.command);

    match commands::run(&cli.config, &command, notifier.clone()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            notifier.fatal(&commands::fatal_message(&err));
            ExitCode::FAILURE
        }
    }
}
