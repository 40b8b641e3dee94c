// Snapshot poller - fetches the sensor feed on a fixed period
use crate::application::feed_repository::SensorFeed;
use crate::application::map_view::MapViewHandle;
use crate::application::marker_sync::SyncReport;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Snapshot handed to the view. `None` when the view dropped it.
    Applied(Option<SyncReport>),
    /// Fetch failed; the view keeps its last good state.
    Skipped,
    /// Credentials rejected; polling stops.
    Halted,
    /// The view has stopped.
    Closed,
}

pub struct SnapshotPoller {
    feed: Arc<dyn SensorFeed>,
    view: MapViewHandle,
    period: Duration,
}

impl SnapshotPoller {
    pub fn new(feed: Arc<dyn SensorFeed>, view: MapViewHandle, period: Duration) -> Self {
        Self { feed, view, period }
    }

    /// One fetch, at most. Errors never escape: they become an outcome.
    pub async fn poll_once(&self) -> PollOutcome {
        let observations = match self.feed.latest().await {
            Ok(observations) => observations,
            Err(e) if e.is_fatal() => {
                tracing::error!("Sensor feed refused access, stopping polling: {}", e);
                return PollOutcome::Halted;
            }
            Err(e) => {
                tracing::warn!("Skipping refresh cycle: {}", e);
                return PollOutcome::Skipped;
            }
        };

        match self.view.apply_snapshot(observations, Utc::now()).await {
            Ok(report) => PollOutcome::Applied(report),
            Err(_) => PollOutcome::Closed,
        }
    }

    /// Polls immediately, then once per period, until halted or the view
    /// closes. A refresh requested by the view polls at once and restarts
    /// the period.
    pub async fn run(self) -> PollOutcome {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.view.refresh_requested() => {
                    tracing::debug!("Refresh requested by the view");
                    ticker.reset();
                }
            }
            match self.poll_once().await {
                outcome @ (PollOutcome::Halted | PollOutcome::Closed) => {
                    tracing::info!("Snapshot poller finished: {:?}", outcome);
                    return outcome;
                }
                PollOutcome::Applied(Some(report)) => {
                    tracing::debug!("Snapshot applied: {:?}", report);
                }
                _ => {}
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<PollOutcome> {
        tokio::spawn(self.run())
    }
}
