//! Background maintenance: evicting expired keys and reloading rules.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::limiter::RateLimiter;
use super::quota::Quota;
use super::rules::{PolicyTable, RateLimitRules};
use crate::error::Result;

/// Periodically drop keys whose window has ended.
///
/// Without this the store grows with every distinct client ever seen.
pub fn spawn_sweeper(
    limiter: Arc<RateLimiter>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match limiter.sweep().await {
                        Ok(0) => {}
                        Ok(removed) => debug!(
                            removed = removed,
                            "Evicted expired rate limit keys"
                        ),
                        Err(e) => warn!(error = %e, "Rate limit sweep failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        debug!("Sweeper stopped");
    })
}

/// Load the rules file, using `fallback` when it sets no default policy.
pub fn load_rules(path: &Path, fallback: Quota) -> Result<RateLimitRules> {
    Ok(RateLimitRules::from_file(path)?.with_fallback(fallback))
}

/// Periodically re-read the rules file into `table`.
///
/// A file that fails to load leaves the active rules in place.
pub fn spawn_rules_reloader(
    table: Arc<PolicyTable>,
    path: PathBuf,
    fallback: Quota,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let loaded = {
                        let path = path.clone();
                        tokio::task::spawn_blocking(move || load_rules(&path, fallback)).await
                    };
                    match loaded {
                        Ok(Ok(rules)) => {
                            info!(
                                path = %path.display(),
                                policies = rules.policies.len(),
                                "Reloaded rate limit rules"
                            );
                            table.replace(rules);
                        }
                        Ok(Err(e)) => warn!(
                            path = %path.display(),
                            error = %e,
                            "Keeping previous rules"
                        ),
                        Err(e) => warn!(error = %e, "Rules reload task failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        debug!("Rules reloader stopped");
    })
}
