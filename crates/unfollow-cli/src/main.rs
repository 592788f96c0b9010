mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "unfollow",
    about = "Unfollow accounts that do not follow back, within a rolling hourly quota",
    version,
    propagate_version = true
)]
struct Cli {
    /// State directory (default: ~/.unfollow)
    #[arg(long, global = true, env = "UNFOLLOW_HOME")]
    home: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Debug logging
    #[arg(long, global = true, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, show or validate the config
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Import a data-export archive into the relationship store
    Import {
        /// Path to the export zip
        archive: PathBuf,
    },

    /// Unfollow candidates until none remain
    Run {
        /// Import this export archive before starting
        #[arg(long, value_name = "ARCHIVE")]
        import: Option<PathBuf>,

        /// Stop after one batch
        #[arg(long)]
        once: bool,
    },

    /// List remaining unfollow candidates
    List,

    /// Show store counts and rate limit status
    Stats,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        match &cli.command {
            Commands::Run { .. } | Commands::Import { .. } => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = root::resolve_home(cli.home.as_deref()).and_then(|home| match cli.command {
        Commands::Config { subcommand } => cmd::config::run(&home, subcommand, cli.json),
        Commands::Import { archive } => cmd::import::run(&home, &archive, cli.json),
        Commands::Run { import, once } => cmd::run::run(&home, import.as_deref(), once, cli.json),
        Commands::List => cmd::list::run(&home, cli.json),
        Commands::Stats => cmd::stats::run(&home, cli.json),
    });

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
