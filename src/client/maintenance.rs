use crate::cache::SweepReport;
use crate::client::core::{ClientInner, NetworkClient};
use serde::Serialize;
use std::sync::Weak;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Outcome of one maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub cache: SweepReport,
    pub metrics_removed: usize,
}

impl MaintenanceReport {
    pub fn is_empty(&self) -> bool {
        self.cache.expired == 0 && self.cache.evicted == 0 && self.metrics_removed == 0
    }
}

impl NetworkClient {
    /// Run one cache and metrics sweep now, independent of the background task.
    pub fn run_maintenance(&self) -> MaintenanceReport {
        self.inner.run_maintenance()
    }
}

/// Spawn the periodic sweep. The task holds only a weak reference, so it
/// ends on its own once every client handle is gone, or when `shutdown` fires.
pub(crate) fn spawn_sweeper(
    inner: Weak<ClientInner>,
    period: Duration,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("maintenance sweep cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    let Some(inner) = inner.upgrade() else {
                        debug!("client dropped; maintenance sweep exiting");
                        break;
                    };
                    let report = inner.run_maintenance();
                    if !report.is_empty() {
                        debug!(
                            expired = report.cache.expired,
                            evicted = report.cache.evicted,
                            metrics_removed = report.metrics_removed,
                            "maintenance sweep"
                        );
                    }
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_is_empty() {
        assert!(MaintenanceReport::default().is_empty());
        let report = MaintenanceReport {
            cache: SweepReport {
                expired: 1,
                evicted: 0,
            },
            metrics_removed: 0,
        };
        assert!(!report.is_empty());
    }
}
