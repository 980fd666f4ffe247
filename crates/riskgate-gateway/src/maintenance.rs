//! Background sweep: expired token cache entries, lapsed revocations and
//! idle admission records.
//!
//! Every step is idempotent against concurrent foreground writes, so an
//! overlapping request never observes anything but "already gone". A failed
//! step is logged and retried on the next tick.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::app_state::AppState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub cache_entries: usize,
    pub revocations: usize,
    pub admission_records: usize,
    pub admission_failed: bool,
}

pub async fn run_once(state: &AppState) -> MaintenanceReport {
    let metrics = state.metrics();
    let tokens = state.tokens().cleanup_expired_tokens();
    metrics.maintenance_runs.inc(&[("task", "tokens"), ("result", "ok")]);

    let mut report = MaintenanceReport {
        cache_entries: tokens.cache_entries,
        revocations: tokens.revocations,
        ..MaintenanceReport::default()
    };

    match state.admission().sweep().await {
        Ok(n) => {
            report.admission_records = n;
            metrics.maintenance_runs.inc(&[("task", "admission"), ("result", "ok")]);
        }
        Err(e) => {
            report.admission_failed = true;
            metrics.maintenance_runs.inc(&[("task", "admission"), ("result", "error")]);
            tracing::warn!(error = %e, "admission sweep failed; retrying next tick");
        }
    }
    report
}

/// Runs `run_once` every `every` until `shutdown` flips to true (or its
/// sender is dropped).
pub fn spawn(state: AppState, every: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick fires immediately; nothing to sweep at boot
        tick.tick().await;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let r = run_once(&state).await;
                    tracing::debug!(
                        cache = r.cache_entries,
                        revocations = r.revocations,
                        admission = r.admission_records,
                        "maintenance tick"
                    );
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("maintenance task stopped");
    })
}
