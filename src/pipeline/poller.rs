//! Fixed-interval poll loop around the orchestrator.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::PipelineError;
use crate::pipeline::orchestrator::Orchestrator;

/// Spawn a background task that runs a pass immediately and then every
/// `interval`.
///
/// Stops when the returned flag is set, or permanently after a
/// credential failure since no later pass could succeed.
pub fn spawn_poller(
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        info!("Poller started, running every {}s", interval.as_secs());

        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tick.tick().await;

            if shutdown.load(Ordering::Relaxed) {
                info!("Poller shutting down");
                return;
            }

            match orchestrator.run_once().await {
                Ok(summary) => info!(
                    persisted = summary.persisted,
                    skipped = summary.skipped.len(),
                    "Poll pass finished"
                ),
                Err(PipelineError::Auth(e)) => {
                    error!(error = %e, "Credential failure; poller stopping");
                    return;
                }
            }
        }
    });

    (handle, shutdown_flag)
}
