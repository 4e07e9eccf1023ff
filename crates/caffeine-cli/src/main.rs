use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "caffeine-cli", version, about = "Caffeine-in CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a dose, optionally from a named source
    Dose(commands::dose::DoseArgs),
    /// Print the current caffeine level as JSON
    Status,
    /// Print the level every few seconds until it reaches zero
    Watch(commands::watch::WatchArgs),
    /// Clear the current caffeine level
    Reset,
    /// Caffeine source history
    Source {
        #[command(subcommand)]
        action: commands::source::SourceAction,
    },
    /// Logged intake events
    Intake {
        #[command(subcommand)]
        action: commands::intake::IntakeAction,
    },
    /// Caffeine level over the past 24 hours
    Analysis,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Generate shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Dose(args) => commands::dose::run(args),
        Commands::Status => commands::dose::status(),
        Commands::Watch(args) => commands::watch::run(args),
        Commands::Reset => commands::dose::reset(),
        Commands::Source { action } => commands::source::run(action),
        Commands::Intake { action } => commands::intake::run(action),
        Commands::Analysis => commands::intake::analysis(),
        Commands::Config { action } => commands::config::run(action),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "caffeine-cli", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
