//! Caffeine source history commands.

use caffeine_core::{validate_source, ValidationError};
use chrono::Utc;
use clap::Subcommand;

use super::{open_tracker, print_json, CliResult};

#[derive(Subcommand)]
pub enum SourceAction {
    /// List sources, newest first
    List,
    /// Add a source and log a dose of it
    Add {
        /// Source name
        name: String,
        /// Amount in milligrams
        #[arg(allow_hyphen_values = true)]
        amount: i64,
    },
    /// Insert a source at a position without logging a dose
    Insert {
        /// Position, 0 = top of the list
        index: usize,
        /// Source name
        name: String,
        /// Amount in milligrams
        #[arg(allow_hyphen_values = true)]
        amount: i64,
    },
    /// Remove a source (name matched case-insensitively)
    Remove {
        /// Source name
        name: String,
    },
    /// Rename a source and change its amount
    Update {
        /// Current exact name
        old_name: String,
        /// New name
        new_name: String,
        /// New amount in milligrams
        #[arg(allow_hyphen_values = true)]
        amount: i64,
    },
}

pub fn run(action: SourceAction) -> CliResult {
    let (_, mut tracker) = open_tracker()?;
    let now = Utc::now();

    match action {
        SourceAction::List => print_json(&tracker.history()),
        SourceAction::Add { name, amount } => {
            validate_source(&name, amount)?;
            match tracker.add_source(&name, amount, now)? {
                Some(event) => print_json(&event),
                None => Err("source was not recorded".into()),
            }
        }
        SourceAction::Insert {
            index,
            name,
            amount,
        } => {
            validate_source(&name, amount)?;
            let len = tracker.history().len();
            if index > len {
                return Err(ValidationError::OutOfBounds {
                    collection: "source history".into(),
                    index,
                    len,
                }
                .into());
            }
            match tracker.insert_source(index, &name, amount, now)? {
                Some(event) => print_json(&event),
                None => Err(ValidationError::DuplicateName(name).into()),
            }
        }
        SourceAction::Remove { name } => match tracker.remove_source(&name, now)? {
            Some(event) => print_json(&event),
            None => Err(format!("no source named '{name}'").into()),
        },
        SourceAction::Update {
            old_name,
            new_name,
            amount,
        } => {
            validate_source(&new_name, amount)?;
            match tracker.update_source(&old_name, &new_name, amount, now)? {
                Some(event) => print_json(&event),
                None if tracker.history().iter().any(|s| s.name == old_name) => {
                    Err(ValidationError::DuplicateName(new_name).into())
                }
                None => Err(ValidationError::NotFound(old_name).into()),
            }
        }
    }
}
