use std::path::PathBuf;

use anyhow::Result;
use collection::{detector::SessionDetector, tracker::TrackingModule};
use lifecycle::DaemonLifecycle;
use storage::{
    document::JsonDocument,
    entities::{Configuration, TrackerSnapshot},
    CONFIG_FILE, HISTORY_FILE,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    process_api::{ProcessLister, SysinfoProcessLister},
    utils::clock::{Clock, DefaultClock},
};

pub mod args;
pub mod collection;
pub mod lifecycle;
pub mod shutdown;
pub mod storage;

/// Runs the daemon in the current process, claiming the lifecycle marker for the duration.
pub async fn serve(dir: PathBuf) -> Result<()> {
    let mut lifecycle = DaemonLifecycle::new(&dir);
    let shutdown = lifecycle.start()?;
    let result = start_daemon(dir, shutdown).await;
    lifecycle.stop();
    result
}

/// Represents the starting point for the daemon. Returns once `shutdown` is cancelled, either by
/// the owner or by a termination signal.
pub async fn start_daemon(dir: PathBuf, shutdown: CancellationToken) -> Result<()> {
    let signals = tokio::spawn(shutdown::detect_shutdown(shutdown.clone()));
    let result = run_tracking(dir, SysinfoProcessLister::new(), DefaultClock, shutdown).await;
    signals.abort();

    result.inspect_err(|e| error!("Tracking module got an error {e:?}"))
}

async fn run_tracking(
    dir: PathBuf,
    lister: impl ProcessLister + 'static,
    clock: impl Clock,
    shutdown: CancellationToken,
) -> Result<()> {
    let config = JsonDocument::<Configuration>::new(dir.join(CONFIG_FILE))
        .load_or_init()
        .await?;
    let store = JsonDocument::<TrackerSnapshot>::new(dir.join(HISTORY_FILE));
    let snapshot = store.load_or_init().await?;
    info!("Loaded {} recorded days from {:?}", snapshot.days.len(), store.path());

    let tracker = create_tracker(store, snapshot, config, lister, &shutdown, clock);
    tracker.run().await
}

fn create_tracker(
    store: JsonDocument<TrackerSnapshot>,
    snapshot: TrackerSnapshot,
    config: Configuration,
    lister: impl ProcessLister + 'static,
    shutdown_token: &CancellationToken,
    clock: impl Clock,
) -> TrackingModule<JsonDocument<TrackerSnapshot>> {
    let detector = SessionDetector::new(Box::new(lister), config.target_apps.clone());
    TrackingModule::new(
        store,
        snapshot,
        config,
        detector,
        shutdown_token.clone(),
        Box::new(clock),
    )
}

#[cfg(test)]
mod daemon_tests {
    use std::{
        fs,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use anyhow::Result;
    use tempfile::tempdir;
    use tokio_util::sync::CancellationToken;

    use crate::{
        daemon::{
            run_tracking,
            storage::{
                document::JsonDocument,
                entities::{Configuration, TrackerSnapshot},
                CONFIG_FILE, HISTORY_FILE,
            },
        },
        process_api::{MockProcessLister, ProcessDescriptor},
        report::{Level, StatusReporter},
        utils::{
            clock::test_clock::{local_noon, ManualClock},
            logging::TEST_LOGGING,
        },
    };

    /// Very simple smoke test: a fresh directory, a viewer that stays open for a while and a
    /// restart that continues where the first run stopped.
    #[tokio::test]
    async fn smoke_test_daemon() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let start = local_noon(2018, 7, 4);
        let clock = ManualClock::new(start);

        for _run in 0..2 {
            let shutdown = CancellationToken::new();
            let token = shutdown.clone();
            let calls = AtomicUsize::new(0);
            let mut lister = MockProcessLister::new();
            lister.expect_processes().returning(move || {
                if calls.fetch_add(1, Ordering::SeqCst) + 1 == 7 {
                    token.cancel();
                }
                Ok(vec![ProcessDescriptor {
                    pid: u32::MAX - 1,
                    name: "evince".into(),
                    cmd: vec!["evince".into()],
                }])
            });

            run_tracking(dir.path().to_path_buf(), lister, clock.clone(), shutdown).await?;
        }

        assert!(dir.path().join(CONFIG_FILE).exists());
        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join(HISTORY_FILE))?)?;
        assert!(raw["currentSession"]["start"].is_i64());

        let snapshot = JsonDocument::<TrackerSnapshot>::new(dir.path().join(HISTORY_FILE))
            .read()
            .await?
            .unwrap();
        let config = Configuration::default();
        let status = StatusReporter::new(&config, &snapshot).status(start.date_naive());

        // Each run credits 6 ticks. The restarted run continues the persisted session, and its
        // first tick happens at the time of the last check, so it adds nothing.
        assert!((status.minutes - 120. / 60.).abs() < 1e-9, "{}", status.minutes);
        assert_eq!(status.level, Level::None);
        assert!(status.active_session);
        Ok(())
    }
}
