use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "repcue", version, about = "Repcue guided workout player")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Workout definitions
    Session {
        #[command(subcommand)]
        action: commands::session::SessionAction,
    },
    /// Run control
    Workout {
        #[command(subcommand)]
        action: commands::workout::WorkoutAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Finished and abandoned runs
    History {
        /// Maximum number of entries
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

/// Logs go to stderr so stdout stays machine-readable. Filter with REPCUE_LOG.
fn init_logging() {
    let filter = EnvFilter::try_from_env("REPCUE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Session { action } => commands::session::run(action),
        Commands::Workout { action } => commands::workout::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::History { limit, json } => commands::history::run(limit, json),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
