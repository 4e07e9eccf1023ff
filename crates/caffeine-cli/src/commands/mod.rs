pub mod config;
pub mod dose;
pub mod intake;
pub mod source;
pub mod watch;

use caffeine_core::{CaffeineTracker, Config};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Load config and open the tracker in the data directory.
pub fn open_tracker() -> Result<(Config, CaffeineTracker), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let tracker = CaffeineTracker::open(&config)?;
    Ok((config, tracker))
}

pub fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
