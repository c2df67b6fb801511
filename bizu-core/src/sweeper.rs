use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::TtlCache;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

pub struct SweeperHandle {
    cancel_tx: broadcast::Sender<()>,
    join: JoinHandle<()>,
}

impl SweeperHandle {
    pub async fn stop(self) -> Result<(), tokio::task::JoinError> {
        let _ = self.cancel_tx.send(());
        self.join.await
    }
}

/// Runs [`TtlCache::clear_expired`] every `interval` until stopped.
pub fn spawn_sweeper(cache: TtlCache, interval: Duration) -> SweeperHandle {
    let (cancel_tx, mut cancel_rx) = broadcast::channel(1);
    let join = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel_rx.recv() => {
                    info!("cache sweeper shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = cache.clear_expired().await;
                    if removed > 0 {
                        debug!(removed, "swept expired cache entries");
                    }
                }
            }
        }
    });

    SweeperHandle { cancel_tx, join }
}
