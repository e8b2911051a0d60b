use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::{
    daemon::storage::{
        document::SnapshotStore,
        entities::{Configuration, TrackerSnapshot},
    },
    report::{StatusReporter, StatusView},
    utils::clock::Clock,
};

use super::{
    accumulator::{Accumulator, Transition},
    detector::SessionDetector,
};

/// The polling loop. Every tick detects, accumulates and persists before the next one starts.
pub struct TrackingModule<S: SnapshotStore> {
    store: S,
    snapshot: TrackerSnapshot,
    config: Configuration,
    detector: SessionDetector,
    accumulator: Accumulator,
    shutdown: CancellationToken,
    check_interval: Duration,
    time_provider: Box<dyn Clock>,
}

impl<S: SnapshotStore> TrackingModule<S> {
    pub fn new(
        store: S,
        snapshot: TrackerSnapshot,
        config: Configuration,
        detector: SessionDetector,
        shutdown: CancellationToken,
        time_provider: Box<dyn Clock>,
    ) -> Self {
        let check_interval = config.check_interval();
        Self {
            store,
            snapshot,
            accumulator: Accumulator::new(check_interval),
            config,
            detector,
            shutdown,
            check_interval,
            time_provider,
        }
    }

    pub fn snapshot(&self) -> &TrackerSnapshot {
        &self.snapshot
    }

    /// Runs a single tick. If persisting fails the in-memory state stays as it was before the
    /// tick.
    pub async fn tick(&mut self) -> Result<StatusView> {
        let detection = self.detector.detect();
        let now = self.time_provider.now();

        let mut next = self.snapshot.clone();
        let transition = self.accumulator.advance(&mut next, &detection, now);

        self.store
            .save(&next)
            .instrument(info_span!("Saving snapshot"))
            .await
            .inspect_err(|e| error!("Failed to persist tick, keeping previous state {e:?}"))?;
        self.snapshot = next;

        let status = StatusReporter::new(&self.config, &self.snapshot).status(now.date_naive());
        match transition {
            Transition::Idle => debug!("No active reading session detected"),
            Transition::Started => info!(
                "Reading session started, document {:?}",
                status.current_document
            ),
            Transition::Stopped => info!("Reading session ended"),
            Transition::Continued {
                credited_seconds,
                clamped_from,
            } => {
                if let Some(measured) = clamped_from {
                    warn!("Gap of {measured:.1}s since last check was clamped to {credited_seconds:.1}s");
                }
            }
        }
        if status.active_session {
            info!(
                "Tracking: {:.1} minutes today ({})",
                status.minutes,
                if status.target_reached { "✓" } else { "✗" }
            );
        }
        Ok(status)
    }

    /// Executes the tracking event loop until shutdown is requested.
    pub async fn run(mut self) -> Result<()> {
        info!(
            "Tracking started, checking every {:?} for {:?}",
            self.check_interval, self.config.target_apps
        );
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            // Errors are already logged, the loop must survive them.
            let _ = self.tick().await;

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = self.time_provider.sleep(self.check_interval) => (),
            }
        }
        info!("Tracking stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        future::Future,
        sync::{
            atomic::{AtomicBool, AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use anyhow::{anyhow, Result};
    use tempfile::tempdir;
    use tokio_util::sync::CancellationToken;

    use crate::{
        daemon::{
            collection::detector::SessionDetector,
            storage::{
                document::{JsonDocument, SnapshotStore},
                entities::{Configuration, TrackerSnapshot},
            },
        },
        process_api::{MockProcessLister, ProcessDescriptor},
        report::Level,
        utils::{
            clock::test_clock::{local_noon, ManualClock},
            logging::TEST_LOGGING,
        },
    };

    use super::TrackingModule;

    fn viewer() -> ProcessDescriptor {
        ProcessDescriptor {
            pid: u32::MAX - 1,
            name: "okular".into(),
            cmd: vec!["okular".into(), "/tmp/paper.pdf".into()],
        }
    }

    /// Lister that reports a viewer for the ticks listed in `active_ticks` (1 based) and cancels
    /// the loop after `total` ticks.
    fn scripted_lister(
        active_ticks: impl Fn(usize) -> bool + Send + 'static,
        total: usize,
        shutdown: CancellationToken,
    ) -> MockProcessLister {
        let calls = AtomicUsize::new(0);
        let mut lister = MockProcessLister::new();
        lister.expect_processes().times(total).returning(move || {
            let tick = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if tick == total {
                shutdown.cancel();
            }
            if active_ticks(tick) {
                Ok(vec![viewer()])
            } else {
                Ok(vec![])
            }
        });
        lister
    }

    #[tokio::test]
    async fn test_loop_accumulates_from_second_active_tick() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let store = JsonDocument::<TrackerSnapshot>::new(dir.path().join("history.json"));
        let shutdown = CancellationToken::new();
        let config = Configuration::default();
        let start = local_noon(2024, 7, 4);
        let lister = scripted_lister(|tick| tick >= 4, 5, shutdown.clone());

        let module = TrackingModule::new(
            store,
            TrackerSnapshot::default(),
            config.clone(),
            SessionDetector::new(Box::new(lister), config.target_apps.clone()),
            shutdown,
            Box::new(ManualClock::new(start)),
        );
        module.run().await?;

        let stored = JsonDocument::<TrackerSnapshot>::new(dir.path().join("history.json"))
            .read()
            .await?
            .unwrap();
        let minutes = stored.minutes_on(start.date_naive());
        assert!((minutes - 10. / 60.).abs() < 1e-9, "{minutes}");
        assert!(stored.current_session.is_active());
        assert_eq!(
            stored.current_session.document_hint.as_deref(),
            Some("/tmp/paper.pdf")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_loop_stops_on_cancelled_token_without_ticking() -> Result<()> {
        let dir = tempdir()?;
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let mut lister = MockProcessLister::new();
        lister.expect_processes().never();

        let module = TrackingModule::new(
            JsonDocument::<TrackerSnapshot>::new(dir.path().join("history.json")),
            TrackerSnapshot::default(),
            Configuration::default(),
            SessionDetector::new(Box::new(lister), vec!["okular".into()]),
            shutdown,
            Box::new(ManualClock::new(local_noon(2024, 7, 4))),
        );
        module.run().await?;

        assert!(!dir.path().join("history.json").exists());
        Ok(())
    }

    struct FlakyStore {
        fail: Arc<AtomicBool>,
        inner: JsonDocument<TrackerSnapshot>,
    }

    impl SnapshotStore for FlakyStore {
        fn save(&self, snapshot: &TrackerSnapshot) -> impl Future<Output = Result<()>> {
            let fail = self.fail.load(Ordering::SeqCst);
            let save = self.inner.save(snapshot);
            async move {
                if fail {
                    return Err(anyhow!("disk full"));
                }
                save.await
            }
        }
    }

    #[tokio::test]
    async fn test_failed_save_keeps_previous_state() -> Result<()> {
        let dir = tempdir()?;
        let fail = Arc::new(AtomicBool::new(false));
        let store = FlakyStore {
            fail: fail.clone(),
            inner: JsonDocument::new(dir.path().join("history.json")),
        };
        let mut lister = MockProcessLister::new();
        lister.expect_processes().returning(|| Ok(vec![viewer()]));
        let clock = ManualClock::new(local_noon(2024, 7, 4));

        let mut module = TrackingModule::new(
            store,
            TrackerSnapshot::default(),
            Configuration::default(),
            SessionDetector::new(Box::new(lister), vec!["okular".into()]),
            CancellationToken::new(),
            Box::new(clock.clone()),
        );

        module.tick().await?;
        clock.advance(Duration::from_secs(10));
        let committed = module.tick().await?;
        assert!((committed.minutes - 10. / 60.).abs() < 1e-9);

        fail.store(true, Ordering::SeqCst);
        clock.advance(Duration::from_secs(10));
        let before = module.snapshot().clone();
        assert!(module.tick().await.is_err());
        assert_eq!(module.snapshot(), &before);

        fail.store(false, Ordering::SeqCst);
        clock.advance(Duration::from_secs(10));
        let status = module.tick().await?;
        // The failed tick is recovered by the next one measuring from the last committed check.
        assert!((status.minutes - 30. / 60.).abs() < 1e-9, "{}", status.minutes);
        Ok(())
    }

    #[tokio::test]
    async fn test_reaching_maximum_then_stopping() -> Result<()> {
        let dir = tempdir()?;
        let start = local_noon(2024, 7, 4);
        let mut snapshot = TrackerSnapshot::default();
        snapshot.days.insert(start.date_naive(), 179.5);
        let mut lister = MockProcessLister::new();
        let mut sequence = mockall::Sequence::new();
        lister
            .expect_processes()
            .times(2)
            .in_sequence(&mut sequence)
            .returning(|| Ok(vec![viewer()]));
        lister
            .expect_processes()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|| Ok(vec![]));
        let clock = ManualClock::new(start);

        let mut module = TrackingModule::new(
            JsonDocument::<TrackerSnapshot>::new(dir.path().join("history.json")),
            snapshot,
            Configuration::default(),
            SessionDetector::new(Box::new(lister), vec!["okular".into()]),
            CancellationToken::new(),
            Box::new(clock.clone()),
        );

        module.tick().await?;
        clock.advance(Duration::from_secs(30));
        let status = module.tick().await?;
        assert_eq!(status.minutes, 180.);
        assert_eq!(status.level, Level::Maximum);

        clock.advance(Duration::from_secs(10));
        let status = module.tick().await?;
        assert!(!status.active_session);
        assert_eq!(status.minutes, 180.);
        Ok(())
    }
}
