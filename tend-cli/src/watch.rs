//! Periodic trigger for the sweeper: once at startup, then every tick.

use anyhow::{Context, Result};
use chrono::TimeZone;
use std::time::Duration;
use tend_core::{Clock, IdGenerator, SweepReport, Sweeper, SystemClock, UuidGenerator};

use crate::config::Config;
use crate::state::TaskStore;

/// Load, sweep, save (only if something changed), print one line per event.
pub fn sweep_once<Z, C, G>(
    sweeper: &mut Sweeper<Z, C, G>,
    store: &TaskStore,
) -> Result<SweepReport>
where
    Z: TimeZone,
    C: Clock,
    G: IdGenerator,
{
    let mut tasks = store.load()?;
    let report = sweeper.sweep(&mut tasks);
    if !report.is_quiet() {
        store
            .save(&tasks)
            .with_context(|| format!("saving sweep results to {}", store.path().display()))?;
    }
    for event in &report.events {
        println!("{event}");
    }
    Ok(report)
}

pub fn tick(cfg: &Config, store: &TaskStore) -> Result<()> {
    let mut sweeper = Sweeper::new(cfg.timezone()?, SystemClock, UuidGenerator);
    let report = sweep_once(&mut sweeper, store)?;
    if report.events.is_empty() {
        println!("Nothing due.");
    }
    Ok(())
}

pub async fn watch(cfg: &Config, store: &TaskStore, every: Option<u64>) -> Result<()> {
    let secs = every.unwrap_or(cfg.schedule.tick_seconds).max(1);
    if secs > 86_400 {
        tracing::warn!(
            secs,
            "tick is longer than a day; deferred tasks may miss their promotion window"
        );
    }
    let mut sweeper = Sweeper::new(cfg.timezone()?, SystemClock, UuidGenerator);

    println!(
        "Watching {} every {}s (Ctrl-C to stop)",
        store.path().display(),
        secs
    );

    // The first tick completes immediately, which gives the startup sweep.
    let mut interval = tokio::time::interval(Duration::from_secs(secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match sweep_once(&mut sweeper, store) {
                    Ok(report) => tracing::debug!(events = report.events.len(), "tick"),
                    // Keep ticking; the next read may succeed.
                    Err(e) => tracing::error!(error = ?e, "sweep failed"),
                }
            }
            _ = &mut ctrl_c => {
                println!("Stopped.");
                break;
            }
        }
    }
    Ok(())
}
