//! Live level display driven by the decay monitor.

use std::time::Duration;

use caffeine_core::LiveTracker;
use clap::Args;

use super::{open_tracker, CliResult};

#[derive(Args)]
pub struct WatchArgs {
    /// Seconds between updates (defaults to decay.poll_interval_secs)
    #[arg(long)]
    pub interval_secs: Option<u64>,
}

pub fn run(args: WatchArgs) -> CliResult {
    let (config, tracker) = open_tracker()?;
    let period = args
        .interval_secs
        .map(|secs| Duration::from_secs(secs.max(1)))
        .unwrap_or_else(|| config.decay.poll_interval());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result: CliResult = runtime.block_on(async move {
        let mut live = LiveTracker::new(tracker, period);
        let mut level = live.subscribe_level();
        live.start();

        loop {
            tokio::select! {
                changed = level.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let mg = *level.borrow_and_update();
                    println!("{mg:.1} mg");
                    if mg == 0.0 {
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::debug!("interrupted");
                    break;
                }
            }
        }

        live.shutdown().await;
        Ok(())
    });
    result
}
