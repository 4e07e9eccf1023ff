//! Dose logging and current level commands.

use caffeine_core::{validate_amount, validate_source};
use chrono::Utc;
use clap::Args;

use super::{open_tracker, print_json, CliResult};

#[derive(Args)]
pub struct DoseArgs {
    /// Amount in milligrams
    #[arg(allow_hyphen_values = true)]
    pub amount: i64,
    /// Record the dose under this source name (added to history if new)
    #[arg(long)]
    pub source: Option<String>,
}

pub fn run(args: DoseArgs) -> CliResult {
    let (_, mut tracker) = open_tracker()?;
    let now = Utc::now();

    let event = match &args.source {
        Some(name) => {
            validate_source(name, args.amount)?;
            tracker.add_source(name, args.amount, now)?
        }
        None => {
            validate_amount(args.amount)?;
            tracker.add_dose(args.amount, now)?
        }
    };

    match event {
        Some(event) => print_json(&event),
        None => Err("dose was not recorded".into()),
    }
}

pub fn status() -> CliResult {
    let (_, mut tracker) = open_tracker()?;
    let now = Utc::now();
    tracker.refresh(now)?;
    print_json(&tracker.snapshot(now))
}

pub fn reset() -> CliResult {
    let (_, mut tracker) = open_tracker()?;
    let event = tracker.reset(Utc::now())?;
    print_json(&event)
}
