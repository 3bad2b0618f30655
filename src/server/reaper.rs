//! Idle-session reaper.
//!
//! Intermediaries in front of the server kill quiet HTTP flows without the
//! tunnel noticing; a session whose download stream died that way would
//! otherwise hold its destination connection forever. The reaper sweeps on
//! a period equal to the idle threshold, which sits under the ~100s idle
//! ceiling common to CDN-class intermediaries.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::time;

use crate::observability::metrics;
use crate::registry::ConnectionRegistry;

pub struct HeartbeatReaper {
    registry: Arc<ConnectionRegistry>,
    idle_threshold: Duration,
}

impl HeartbeatReaper {
    pub fn new(registry: Arc<ConnectionRegistry>, idle_threshold: Duration) -> Self {
        Self {
            registry,
            idle_threshold,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            idle_secs = self.idle_threshold.as_secs(),
            "Heartbeat reaper starting"
        );

        let mut ticker = time::interval(self.idle_threshold);
        // The first tick completes immediately; skip it so sweeps start one
        // full period in.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.sweep_once(),
                _ = shutdown.recv() => {
                    tracing::info!("Heartbeat reaper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    fn sweep_once(&self) {
        let started = Instant::now();
        let evicted = self.registry.sweep(started, self.idle_threshold);
        let active = self.registry.len();
        let elapsed = started.elapsed();

        metrics::record_sweep(evicted, active, elapsed);
        tracing::info!(
            evicted,
            active,
            elapsed_ms = elapsed.as_millis() as u64,
            "Reaper sweep complete"
        );
    }
}
