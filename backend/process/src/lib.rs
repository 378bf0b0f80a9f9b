//! # Ingestion Simulator
//!
//! Background producer that keeps the maintenance board moving.
//!
//! ## Row Source
//! Chosen once when the simulator is built.
//! - External feed (`.csv` or `.json`) if configured and at least one row has a known shape.
//!   Records that cannot be decoded are skipped one by one, the rest of the feed is kept
//! - Otherwise the built-in synthetic templates, which are never empty
//!
//! Every raw record is classified into a [`FeedRow`] at load time. Records that
//! match no known shape are counted, logged and left out of the pool.
//!
//! ## Tick
//! 1. Pick a batch size uniformly from 2 to 3.
//! 2. Sample that many rows without replacement, or the whole pool if it is smaller.
//!    An empty batch is replaced by the templates for this tick only.
//! 3. Normalize each row into a `New` request.
//! 4. Insert each request on its own. A failed insert is logged as an
//!    [`IngestionRowFailure`] and the rest of the batch still goes in.
//! 5. Sleep until the next tick, checking for cancellation before sleeping and on waking.
//!
//! ## Lifecycle
//! `Stopped -> Running -> Stopping -> Stopped`. The owner keeps the
//! [`SimulatorHandle`] and calls [`SimulatorHandle::stop`] on shutdown, or cancels
//! the token passed to [`Simulator::spawn`]. Either way the state reads `Stopping`
//! as soon as the signal lands. Stopping never interrupts a store call, the
//! in-flight tick always finishes first.

use std::{
    ops::RangeInclusive,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};
use store::RequestStore;
use tokio::{
    sync::watch,
    task::{JoinHandle, spawn_blocking},
    time::sleep,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub mod error;
pub mod models;
pub mod utils;

pub use error::{FeedError, IngestionRowFailure};
pub use models::FeedRow;

use models::template_rows;
use utils::{classify, load_feed, normalize};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(20);
const BATCH_SIZE: RangeInclusive<usize> = 2..=3;

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub data_path: Option<PathBuf>,
    pub interval: Duration,
    /// Fixed seed for reproducible sampling, entropy otherwise.
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            data_path: None,
            interval: DEFAULT_INTERVAL,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatorState {
    Stopped,
    Running,
    Stopping,
}

#[derive(Debug, Default)]
pub struct TickReport {
    pub inserted: Vec<i64>,
    pub failures: Vec<IngestionRowFailure>,
}

pub struct Simulator {
    config: SimulatorConfig,
    store: Arc<dyn RequestStore>,
    pool: Vec<FeedRow>,
    rng: StdRng,
}

impl Simulator {
    /// Builds the simulator and loads its row source. The feed is parsed on the
    /// blocking pool so a large file never stalls the runtime.
    pub async fn new(config: SimulatorConfig, store: Arc<dyn RequestStore>) -> Self {
        let data_path = config.data_path.clone();
        let pool = match spawn_blocking(move || load_pool(data_path.as_deref())).await {
            Ok(pool) => pool,
            Err(err) => {
                warn!("Feed loader failed, simulating from templates: {err}");
                template_rows()
            }
        };
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            config,
            store,
            pool,
            rng,
        }
    }

    pub fn pool(&self) -> &[FeedRow] {
        &self.pool
    }

    fn pick_batch(&mut self) -> Vec<FeedRow> {
        let size = self.rng.gen_range(BATCH_SIZE);
        let batch: Vec<FeedRow> = self
            .pool
            .choose_multiple(&mut self.rng, size)
            .cloned()
            .collect();

        if batch.is_empty() {
            warn!("Sampled an empty batch, using templates for this tick");
            return template_rows();
        }

        batch
    }

    pub async fn tick(&mut self) -> TickReport {
        let batch = self.pick_batch();

        self.insert_batch(&batch).await
    }

    /// Inserts each row independently, one failure never stops the rest.
    pub async fn insert_batch(&self, rows: &[FeedRow]) -> TickReport {
        let mut report = TickReport::default();

        for (index, row) in rows.iter().enumerate() {
            let request = normalize(row);

            match self.store.insert_request(&request).await {
                Ok(id) => {
                    debug!(id, subject = %request.subject, "Simulated request inserted");
                    report.inserted.push(id);
                }
                Err(source) => {
                    let failure = IngestionRowFailure {
                        index,
                        subject: request.subject,
                        source,
                    };
                    warn!("{failure}");
                    report.failures.push(failure);
                }
            }
        }

        report
    }

    /// Starts the tick loop on the runtime. `token` is the external stop signal.
    pub fn spawn(self, token: CancellationToken) -> SimulatorHandle {
        let state = Arc::new(watch::Sender::new(SimulatorState::Running));

        let task = tokio::spawn(self.run(token.clone(), state.clone()));

        SimulatorHandle { token, state, task }
    }

    /// Runs one tick to completion. A cancellation that arrives mid-tick is
    /// published as `Stopping` right away, the tick itself is never dropped.
    async fn tick_until_done(
        &mut self,
        token: &CancellationToken,
        state: &watch::Sender<SimulatorState>,
    ) -> TickReport {
        let tick = self.tick();
        tokio::pin!(tick);

        let mut cancelled = token.is_cancelled();
        loop {
            tokio::select! {
                report = &mut tick => return report,
                _ = token.cancelled(), if !cancelled => {
                    cancelled = true;
                    mark_stopping(state);
                }
            }
        }
    }

    async fn run(mut self, token: CancellationToken, state: Arc<watch::Sender<SimulatorState>>) {
        info!(
            interval_secs = self.config.interval.as_secs_f64(),
            pool = self.pool.len(),
            "Simulator running"
        );

        loop {
            if token.is_cancelled() {
                mark_stopping(&state);
                break;
            }

            let report = self.tick_until_done(&token, &state).await;
            info!(
                inserted = report.inserted.len(),
                failed = report.failures.len(),
                "Simulator tick complete"
            );

            if token.is_cancelled() {
                mark_stopping(&state);
                break;
            }

            tokio::select! {
                _ = token.cancelled() => {
                    mark_stopping(&state);
                    break;
                }
                _ = sleep(self.config.interval) => {}
            }
        }

        state.send_replace(SimulatorState::Stopped);
        info!("Simulator stopped");
    }
}

fn mark_stopping(state: &watch::Sender<SimulatorState>) {
    state.send_if_modified(|current| {
        if *current == SimulatorState::Running {
            *current = SimulatorState::Stopping;
            true
        } else {
            false
        }
    });
}

fn load_pool(data_path: Option<&Path>) -> Vec<FeedRow> {
    let Some(path) = data_path else {
        info!("No feed configured, simulating from templates");
        return template_rows();
    };

    let records = match load_feed(path) {
        Ok(records) => records,
        Err(err) => {
            warn!(path = %path.display(), "Feed unusable, simulating from templates: {err}");
            return template_rows();
        }
    };

    let total = records.len();
    let pool: Vec<FeedRow> = records.iter().filter_map(classify).collect();

    if pool.len() < total {
        warn!(
            skipped = total - pool.len(),
            path = %path.display(),
            "Feed rows with no known shape were skipped"
        );
    }

    if pool.is_empty() {
        warn!(path = %path.display(), "Feed resolved to zero rows, simulating from templates");
        return template_rows();
    }

    info!(rows = pool.len(), path = %path.display(), "Loaded simulator feed");
    pool
}

/// Owner's grip on a running simulator.
pub struct SimulatorHandle {
    token: CancellationToken,
    state: Arc<watch::Sender<SimulatorState>>,
    task: JoinHandle<()>,
}

impl SimulatorHandle {
    pub fn state(&self) -> SimulatorState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SimulatorState> {
        self.state.subscribe()
    }

    /// Signals the loop and waits for the in-flight tick to finish.
    pub async fn stop(self) {
        mark_stopping(&self.state);
        self.token.cancel();

        if let Err(err) = self.task.await {
            warn!("Simulator task ended abnormally: {err}");
        }

        self.state.send_replace(SimulatorState::Stopped);
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::Write,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use store::{
        MaintenanceError, MaintenanceRequest, MaintenanceResult, NewRequest, RequestRow,
        SqliteStore, Status, board::board,
    };
    use tokio::time::timeout;

    use super::*;
    use crate::models::{Readings, TicketRow};

    /// Fails exactly the `fail_on`-th insert (1-based).
    struct FlakyStore {
        inner: SqliteStore,
        calls: AtomicUsize,
        fail_on: usize,
    }

    #[async_trait]
    impl RequestStore for FlakyStore {
        async fn insert_request(&self, request: &NewRequest) -> MaintenanceResult<i64> {
            if self.calls.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_on {
                return Err(MaintenanceError::StoreUnavailable(sqlx::Error::PoolTimedOut));
            }
            self.inner.insert_request(request).await
        }

        async fn list_requests(&self) -> MaintenanceResult<Vec<RequestRow>> {
            self.inner.list_requests().await
        }

        async fn update_status(
            &self,
            id: i64,
            status: Status,
            expected_version: Option<i64>,
        ) -> MaintenanceResult<()> {
            self.inner.update_status(id, status, expected_version).await
        }

        async fn get_request(&self, id: i64) -> MaintenanceResult<Option<MaintenanceRequest>> {
            self.inner.get_request(id).await
        }
    }

    /// Holds every insert open for `delay` and counts how many were started.
    struct SlowStore {
        inner: SqliteStore,
        delay: Duration,
        started: AtomicUsize,
    }

    impl SlowStore {
        async fn new(delay: Duration) -> Self {
            Self {
                inner: SqliteStore::in_memory().await.unwrap(),
                delay,
                started: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RequestStore for SlowStore {
        async fn insert_request(&self, request: &NewRequest) -> MaintenanceResult<i64> {
            self.started.fetch_add(1, Ordering::SeqCst);
            sleep(self.delay).await;
            self.inner.insert_request(request).await
        }

        async fn list_requests(&self) -> MaintenanceResult<Vec<RequestRow>> {
            self.inner.list_requests().await
        }

        async fn update_status(
            &self,
            id: i64,
            status: Status,
            expected_version: Option<i64>,
        ) -> MaintenanceResult<()> {
            self.inner.update_status(id, status, expected_version).await
        }

        async fn get_request(&self, id: i64) -> MaintenanceResult<Option<MaintenanceRequest>> {
            self.inner.get_request(id).await
        }
    }

    fn ticket(subject: &str) -> FeedRow {
        FeedRow::Ticket(TicketRow {
            subject: subject.to_string(),
            readings: Readings::default(),
        })
    }

    fn ticket_with_priority(subject: &str, priority: &str) -> FeedRow {
        FeedRow::Ticket(TicketRow {
            subject: subject.to_string(),
            readings: Readings {
                priority: Some(priority.to_string()),
                ..Readings::default()
            },
        })
    }

    fn csv_feed(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    fn config(data_path: Option<PathBuf>) -> SimulatorConfig {
        SimulatorConfig {
            data_path,
            interval: Duration::from_millis(25),
            seed: Some(7),
        }
    }

    #[tokio::test]
    async fn test_failed_row_does_not_abort_batch() {
        let store = Arc::new(FlakyStore {
            inner: SqliteStore::in_memory().await.unwrap(),
            calls: AtomicUsize::new(0),
            fail_on: 2,
        });
        let simulator = Simulator::new(config(None), store.clone()).await;

        let report = simulator
            .insert_batch(&[ticket("first"), ticket("second"), ticket("third")])
            .await;

        assert_eq!(report.inserted.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert_eq!(report.failures[0].subject, "second");

        let subjects: Vec<String> = board(store.as_ref())
            .await
            .unwrap()
            .new
            .into_iter()
            .map(|s| s.subject)
            .collect();
        assert_eq!(subjects, vec!["first", "third"]);
    }

    #[tokio::test]
    async fn test_empty_feed_falls_back_to_templates() {
        let feed = csv_feed(&["subject,priority,equipment_id"]);
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let mut simulator = Simulator::new(config(Some(feed.path().to_path_buf())), store.clone()).await;

        assert_eq!(simulator.pool(), template_rows().as_slice());

        let report = simulator.tick().await;
        assert!(!report.inserted.is_empty());

        let board = board(store.as_ref()).await.unwrap();
        assert_eq!(board.new.len(), report.inserted.len());
        assert!(board.in_progress.is_empty());
    }

    #[tokio::test]
    async fn test_missing_feed_falls_back_to_templates() {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let simulator = Simulator::new(
            config(Some(PathBuf::from("/nonexistent/feed.csv"))),
            store,
        )
        .await;

        assert_eq!(simulator.pool().len(), models::TEMPLATES.len());
    }

    #[tokio::test]
    async fn test_feed_rows_are_sampled_without_replacement() {
        let feed = csv_feed(&[
            "equipment,location,faulty,operator",
            "Boiler,Plant A,1,",
            ",,,Sam",
        ]);
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let mut simulator = Simulator::new(config(Some(feed.path().to_path_buf())), store.clone()).await;

        // The operator-only row has no known shape.
        assert_eq!(simulator.pool().len(), 1);

        let report = simulator.tick().await;
        assert_eq!(report.inserted.len(), 1);

        let stored = store.get_request(report.inserted[0]).await.unwrap().unwrap();
        assert_eq!(stored.subject, "Boiler anomaly at Plant A");
        assert_eq!(stored.status, Status::New);
    }

    #[tokio::test]
    async fn test_malformed_feed_record_keeps_good_rows() {
        let mut feed = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        feed.write_all(b"subject,priority\nPump leak,High\nBelt \xff worn,Low\n")
            .unwrap();
        feed.write_all(b"Filter clogged,Medium\nGearbox noise,Critical\n")
            .unwrap();
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());

        let simulator = Simulator::new(config(Some(feed.path().to_path_buf())), store).await;

        assert_eq!(
            simulator.pool(),
            &[
                ticket_with_priority("Pump leak", "High"),
                ticket_with_priority("Filter clogged", "Medium"),
                ticket_with_priority("Gearbox noise", "Critical"),
            ]
        );
    }

    #[tokio::test]
    async fn test_batch_size_within_range() {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let mut simulator = Simulator::new(config(None), store).await;

        for _ in 0..20 {
            let report = simulator.tick().await;
            assert!(BATCH_SIZE.contains(&report.inserted.len()));
        }
    }

    #[tokio::test]
    async fn test_spawn_and_stop() {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let handle = Simulator::new(config(None), store.clone())
            .await
            .spawn(CancellationToken::new());

        assert_eq!(handle.state(), SimulatorState::Running);
        sleep(Duration::from_millis(80)).await;

        let mut states = handle.subscribe();
        handle.stop().await;
        assert_eq!(*states.borrow_and_update(), SimulatorState::Stopped);

        let after_stop = store.list_requests().await.unwrap().len();
        assert!(after_stop >= 2);

        sleep(Duration::from_millis(80)).await;
        assert_eq!(store.list_requests().await.unwrap().len(), after_stop);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_tick() {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let token = CancellationToken::new();
        token.cancel();

        let handle = Simulator::new(config(None), store.clone())
            .await
            .spawn(token);
        handle.stop().await;

        assert!(store.list_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_external_cancel_mid_tick_reports_stopping() {
        let store = Arc::new(SlowStore::new(Duration::from_millis(200)).await);
        let token = CancellationToken::new();
        let handle = Simulator::new(config(None), store.clone())
            .await
            .spawn(token.clone());
        let mut states = handle.subscribe();

        sleep(Duration::from_millis(50)).await;
        token.cancel();

        timeout(
            Duration::from_millis(100),
            states.wait_for(|s| *s == SimulatorState::Stopping),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(handle.state(), SimulatorState::Stopping);

        timeout(
            Duration::from_secs(2),
            states.wait_for(|s| *s == SimulatorState::Stopped),
        )
        .await
        .unwrap()
        .unwrap();

        let started = store.started.load(Ordering::SeqCst);
        assert!(BATCH_SIZE.contains(&started), "{started}");
        assert_eq!(store.list_requests().await.unwrap().len(), started);
    }

    #[tokio::test]
    async fn test_stop_mid_tick_waits_for_batch() {
        let store = Arc::new(SlowStore::new(Duration::from_millis(100)).await);
        let handle = Simulator::new(config(None), store.clone())
            .await
            .spawn(CancellationToken::new());
        let mut states = handle.subscribe();

        sleep(Duration::from_millis(30)).await;
        assert!(store.list_requests().await.unwrap().is_empty());

        let observed = async {
            let stopping = *states
                .wait_for(|s| *s == SimulatorState::Stopping)
                .await
                .unwrap();
            let stopped = *states
                .wait_for(|s| *s == SimulatorState::Stopped)
                .await
                .unwrap();
            (stopping, stopped)
        };
        let ((), seen) = tokio::join!(handle.stop(), observed);

        assert_eq!(seen, (SimulatorState::Stopping, SimulatorState::Stopped));

        let started = store.started.load(Ordering::SeqCst);
        assert!(BATCH_SIZE.contains(&started), "{started}");
        assert_eq!(store.list_requests().await.unwrap().len(), started);
    }
}
