use chrono::{Duration, Utc};
use clap::Subcommand;

use super::{open_tracker, print_json, CliResult};

#[derive(Subcommand)]
pub enum IntakeAction {
    /// List logged intakes, oldest first
    List {
        /// Only intakes from the last N hours
        #[arg(long)]
        since_hours: Option<i64>,
    },
}

pub fn run(action: IntakeAction) -> CliResult {
    let (_, tracker) = open_tracker()?;

    match action {
        IntakeAction::List { since_hours } => {
            let since = since_hours.map(|h| Utc::now() - Duration::hours(h));
            print_json(&tracker.intakes(since))
        }
    }
}

pub fn analysis() -> CliResult {
    let (_, tracker) = open_tracker()?;
    print_json(&tracker.histogram(Utc::now()))
}
