//! Periodic snapshot and analysis pushes to live clients.

use crate::aggregator::HealthAggregator;
use crate::broadcaster::Broadcaster;
use crate::config::ScheduleConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self as tokio_time, MissedTickBehavior};
use tracing::{debug, info};

/// Handles to the two periodic loops.
pub struct Scheduler {
    pub health: JoinHandle<()>,
    pub analysis: JoinHandle<()>,
}

impl Scheduler {
    pub fn abort(&self) {
        self.health.abort();
        self.analysis.abort();
    }
}

pub fn spawn(
    aggregator: Arc<HealthAggregator>,
    broadcaster: Broadcaster,
    schedule: &ScheduleConfig,
) -> Scheduler {
    let health_every = Duration::from_secs(schedule.health_interval_secs.max(1));
    let analysis_every = Duration::from_secs(schedule.analysis_interval_secs.max(1));
    info!(
        "[SCHED] Health every {:?}, analysis every {:?}",
        health_every, analysis_every
    );

    let health = tokio::spawn(run_health_loop(
        Arc::clone(&aggregator),
        broadcaster.clone(),
        health_every,
    ));
    let analysis = tokio::spawn(run_analysis_loop(aggregator, broadcaster, analysis_every));

    Scheduler { health, analysis }
}

async fn run_health_loop(
    aggregator: Arc<HealthAggregator>,
    broadcaster: Broadcaster,
    every: Duration,
) {
    let mut interval = tokio_time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let snapshot = aggregator.generate_health_report().await;
        let delivered = broadcaster.publish_snapshot(&snapshot);
        debug!(
            "[SCHED] health_update {} -> {} clients",
            snapshot.overall_health.as_str(),
            delivered
        );
    }
}

async fn run_analysis_loop(
    aggregator: Arc<HealthAggregator>,
    broadcaster: Broadcaster,
    every: Duration,
) {
    let mut interval = tokio_time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // Skip the immediate first tick; the health loop already covers startup
    interval.tick().await;
    loop {
        interval.tick().await;
        let analysis = aggregator.generate_detailed_analysis().await;
        let delivered = broadcaster.publish_analysis(&analysis);
        debug!(
            "[SCHED] detailed_analysis ({} insights) -> {} clients",
            analysis.insights.len(),
            delivered
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::DataSource;
    use crate::config::ProviderConfig;
    use pulse_shared::rpc::LiveMessage;
    use pulse_shared::ThresholdSet;

    #[tokio::test]
    async fn test_health_loop_pushes_first_snapshot() {
        let aggregator = Arc::new(HealthAggregator::new(
            DataSource::Fixture,
            ThresholdSet::default(),
            &ProviderConfig::default(),
        ));
        let broadcaster = Broadcaster::default();
        let mut rx = broadcaster.subscribe();

        let scheduler = spawn(aggregator, broadcaster, &ScheduleConfig::default());
        let message = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no frame within 5s")
            .unwrap();
        scheduler.abort();

        assert_eq!(message.name(), "health_update");
        assert!(matches!(message.as_ref(), LiveMessage::HealthUpdate(_)));
    }
}
