//! Scan job lifecycle management.
//!
//! Owns the single active scan job, fans events out to subscribers, and
//! maps pipeline outcomes to terminal states. At most one job is ever
//! `running`; the check-and-create in `start_scan` happens under one lock
//! with no suspension point in between.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::broadcast;

use crate::catalog::CatalogDb;
use crate::models::{DiscoveredItem, ScanEvent, ScanJobSnapshot, ScanStatus};
use crate::scanner::{scan_library, ScanError, ScanProgress};

const RECENT_DISCOVERED_CAP: usize = 50;
const EVENT_CHANNEL_CAP: usize = 64;

/// Why a subscription attempt was rejected.
#[derive(Debug, PartialEq, Eq)]
pub enum SubscribeError {
    /// No scan job has ever been started.
    NoJob,
    /// The current job already reached a terminal state.
    NotRunning(ScanStatus),
}

impl SubscribeError {
    pub fn message(&self) -> String {
        match self {
            SubscribeError::NoJob => "No scan job yet".to_string(),
            SubscribeError::NotRunning(status) => {
                format!("Scan not running (status={})", status_label(*status))
            }
        }
    }
}

fn status_label(status: ScanStatus) -> &'static str {
    match status {
        ScanStatus::Running => "running",
        ScanStatus::Completed => "completed",
        ScanStatus::Failed => "failed",
        ScanStatus::Stopped => "stopped",
    }
}

/// Manages the process-wide current scan job.
pub struct ScanManager {
    catalog: CatalogDb,
    covers_dir: PathBuf,
    current: Mutex<Option<Arc<ScanJob>>>,
}

struct ScanJob {
    id: String,
    root_dir: PathBuf,
    cancel: AtomicBool,
    state: Mutex<JobState>,
}

struct JobState {
    status: ScanStatus,
    started_at_ms: i64,
    finished_at_ms: Option<i64>,
    message: String,
    cancel_requested: bool,
    progress: ScanProgress,
    last_error: Option<String>,
    recent: VecDeque<DiscoveredItem>,
    /// Dropped on terminal transition to disconnect all subscribers.
    events: Option<broadcast::Sender<ScanEvent>>,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

impl ScanJob {
    fn new(root_dir: PathBuf) -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAP);
        Self {
            id: format!("scan_{}", now_ms()),
            root_dir,
            cancel: AtomicBool::new(false),
            state: Mutex::new(JobState {
                status: ScanStatus::Running,
                started_at_ms: now_ms(),
                finished_at_ms: None,
                message: "Scan started".to_string(),
                cancel_requested: false,
                progress: ScanProgress::default(),
                last_error: None,
                recent: VecDeque::new(),
                events: Some(sender),
            }),
        }
    }

    fn snapshot(&self) -> ScanJobSnapshot {
        let state = self.state.lock().expect("scan job state lock");
        ScanJobSnapshot {
            id: self.id.clone(),
            root_dir: self.root_dir.to_string_lossy().to_string(),
            status: state.status,
            started_at_ms: state.started_at_ms,
            finished_at_ms: state.finished_at_ms,
            message: state.message.clone(),
            cancel_requested: state.cancel_requested,
            scanned_files: state.progress.scanned_files,
            flac_found: state.progress.flac_found,
            tracks_created_or_updated: state.progress.tracks_created_or_updated,
            errors: state.progress.errors,
            last_error: state.last_error.clone(),
            recent_discovered: state.recent.iter().cloned().collect(),
        }
    }

    /// Broadcast to current subscribers; send failures (no receivers,
    /// lagged streams) are ignored per sink.
    fn emit(&self, event: ScanEvent) {
        let sender = {
            let state = self.state.lock().expect("scan job state lock");
            state.events.clone()
        };
        if let Some(sender) = sender {
            let _ = sender.send(event);
        }
    }

    fn on_discovered(&self, item: DiscoveredItem) {
        {
            let mut state = self.state.lock().expect("scan job state lock");
            state.recent.push_front(item.clone());
            state.recent.truncate(RECENT_DISCOVERED_CAP);
        }
        let job = self.snapshot();
        self.emit(ScanEvent::Discovered { item, job });
    }

    fn on_progress(&self, progress: ScanProgress) {
        {
            let mut state = self.state.lock().expect("scan job state lock");
            state.progress = progress;
        }
        self.emit(ScanEvent::Progress {
            job: self.snapshot(),
        });
    }

    fn finish(&self, result: Result<ScanProgress, ScanError>) {
        let terminal = {
            let mut state = self.state.lock().expect("scan job state lock");
            state.finished_at_ms = Some(now_ms());
            match result {
                Ok(summary) => {
                    state.progress = summary;
                    if state.cancel_requested {
                        state.status = ScanStatus::Stopped;
                        state.message = "Scan stopped".to_string();
                    } else {
                        state.status = ScanStatus::Completed;
                        state.message = "Scan completed".to_string();
                    }
                }
                Err(ScanError::Cancelled) => {
                    state.status = ScanStatus::Stopped;
                    state.message = "Scan stopped".to_string();
                }
                Err(ScanError::Pipeline(err)) => {
                    state.status = ScanStatus::Failed;
                    state.message = "Scan failed".to_string();
                    state.last_error = Some(format!("{err:#}"));
                }
            }
            state.status
        };

        let job = self.snapshot();
        tracing::info!(
            id = %self.id,
            status = status_label(terminal),
            scanned = job.scanned_files,
            cataloged = job.tracks_created_or_updated,
            errors = job.errors,
            "scan finished"
        );
        self.emit(match terminal {
            ScanStatus::Stopped => ScanEvent::Stopped { job },
            ScanStatus::Failed => ScanEvent::Failed { job },
            _ => ScanEvent::Completed { job },
        });

        // A finished job holds no open connections.
        let mut state = self.state.lock().expect("scan job state lock");
        state.events = None;
    }
}

fn run_job(job: &ScanJob, catalog: &CatalogDb, covers_dir: &Path) {
    job.emit(ScanEvent::Started {
        job: job.snapshot(),
    });
    let result = scan_library(
        &job.root_dir,
        covers_dir,
        catalog,
        |item| job.on_discovered(item),
        |progress| job.on_progress(progress),
        || job.cancel.load(Ordering::Relaxed),
    );
    job.finish(result);
}

impl ScanManager {
    pub fn new(catalog: CatalogDb, covers_dir: PathBuf) -> Self {
        Self {
            catalog,
            covers_dir,
            current: Mutex::new(None),
        }
    }

    /// Start a scan, or return the currently running job unchanged.
    ///
    /// Returns the job snapshot and whether an existing run was reused.
    pub fn start_scan(&self, root_dir: PathBuf) -> (ScanJobSnapshot, bool) {
        let job = {
            let mut current = self.current.lock().expect("scan manager lock");
            if let Some(job) = current.as_ref() {
                let snapshot = job.snapshot();
                if snapshot.status == ScanStatus::Running {
                    return (snapshot, true);
                }
            }
            let job = Arc::new(ScanJob::new(root_dir));
            *current = Some(job.clone());
            job
        };

        tracing::info!(id = %job.id, root = %job.root_dir.display(), "scan started");
        let snapshot = job.snapshot();
        let catalog = self.catalog.clone();
        let covers_dir = self.covers_dir.clone();
        tokio::task::spawn_blocking(move || run_job(&job, &catalog, &covers_dir));

        (snapshot, false)
    }

    /// Snapshot of the current job, if any has ever been started.
    pub fn status(&self) -> Option<ScanJobSnapshot> {
        let current = self.current.lock().expect("scan manager lock");
        current.as_ref().map(|job| job.snapshot())
    }

    /// Request cancellation of the running job.
    ///
    /// Observed cooperatively at file boundaries; the job lands in
    /// `stopped`, never `failed`.
    pub fn stop_scan(&self) -> Option<ScanJobSnapshot> {
        let job = {
            let current = self.current.lock().expect("scan manager lock");
            current.as_ref().cloned()
        }?;

        {
            let mut state = job.state.lock().expect("scan job state lock");
            if state.status != ScanStatus::Running {
                return None;
            }
            state.cancel_requested = true;
            state.message = "Cancellation requested".to_string();
        }
        job.cancel.store(true, Ordering::Relaxed);
        tracing::info!(id = %job.id, "scan cancellation requested");

        let snapshot = job.snapshot();
        job.emit(ScanEvent::CancelRequested {
            job: snapshot.clone(),
        });
        Some(snapshot)
    }

    /// Attach a subscriber to the running job's event stream.
    ///
    /// Fails fast when no job exists or the job is not running. On success
    /// an immediate progress snapshot is broadcast so the new subscriber
    /// never waits for the next tick.
    pub fn subscribe(
        &self,
    ) -> Result<(broadcast::Receiver<ScanEvent>, ScanJobSnapshot), SubscribeError> {
        let job = {
            let current = self.current.lock().expect("scan manager lock");
            current.as_ref().cloned().ok_or(SubscribeError::NoJob)?
        };

        let receiver = {
            let state = job.state.lock().expect("scan job state lock");
            if state.status != ScanStatus::Running {
                return Err(SubscribeError::NotRunning(state.status));
            }
            state
                .events
                .as_ref()
                .ok_or(SubscribeError::NotRunning(state.status))?
                .subscribe()
        };

        let snapshot = job.snapshot();
        job.emit(ScanEvent::Progress {
            job: snapshot.clone(),
        });
        Ok((receiver, snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;

    fn temp_manager(tag: &str) -> (ScanManager, std::path::PathBuf) {
        let base = std::env::temp_dir().join(format!(
            "nostalgia-scan-manager-{tag}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        let root = base.join("music");
        std::fs::create_dir_all(&root).expect("create music root");
        let catalog = CatalogDb::open(&base.join("catalog.sqlite3")).expect("open catalog");
        (ScanManager::new(catalog, base.join("covers")), root)
    }

    async fn wait_terminal(manager: &ScanManager) -> ScanJobSnapshot {
        for _ in 0..200 {
            if let Some(snapshot) = manager.status() {
                if snapshot.status != ScanStatus::Running {
                    return snapshot;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("scan did not reach a terminal state");
    }

    #[tokio::test]
    async fn scan_of_mixed_corpus_reports_expected_counters() {
        let (manager, root) = temp_manager("mixed");
        std::fs::write(root.join("a.flac"), b"not really flac").unwrap();
        std::fs::write(root.join("b.txt"), b"text").unwrap();

        let (snapshot, already_running) = manager.start_scan(root);
        assert!(!already_running);
        assert_eq!(snapshot.status, ScanStatus::Running);

        let done = wait_terminal(&manager).await;
        assert_eq!(done.status, ScanStatus::Completed);
        assert_eq!(done.scanned_files, 2);
        assert_eq!(done.flac_found, 1);
        assert_eq!(done.errors, 1);
        assert!(done.finished_at_ms.is_some());
    }

    #[tokio::test]
    async fn second_start_while_running_reuses_the_job() {
        let (manager, root) = temp_manager("reuse");
        // Insert a running job by hand so the check is deterministic.
        let job = Arc::new(ScanJob::new(root.clone()));
        *manager.current.lock().unwrap() = Some(job.clone());

        let (snapshot, already_running) = manager.start_scan(root);
        assert!(already_running);
        assert_eq!(snapshot.id, job.id);
    }

    #[tokio::test]
    async fn stop_with_no_job_is_rejected() {
        let (manager, _root) = temp_manager("no-stop");
        assert!(manager.stop_scan().is_none());
    }

    #[tokio::test]
    async fn subscribe_with_no_job_fails_fast() {
        let (manager, _root) = temp_manager("no-sub");
        match manager.subscribe() {
            Err(SubscribeError::NoJob) => {}
            other => panic!("expected NoJob, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn subscribe_after_terminal_state_is_rejected() {
        let (manager, root) = temp_manager("late-sub");
        manager.start_scan(root);
        let done = wait_terminal(&manager).await;
        assert_eq!(done.status, ScanStatus::Completed);

        match manager.subscribe() {
            Err(SubscribeError::NotRunning(ScanStatus::Completed)) => {}
            other => panic!("expected NotRunning, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn subscriber_gets_immediate_snapshot_then_disconnect_at_terminal() {
        let (manager, root) = temp_manager("events");
        let job = Arc::new(ScanJob::new(root.clone()));
        *manager.current.lock().unwrap() = Some(job.clone());

        let (mut receiver, _snapshot) = manager.subscribe().expect("subscribe");
        match receiver.recv().await {
            Ok(ScanEvent::Progress { .. }) => {}
            other => panic!("expected immediate progress, got {other:?}"),
        }

        // Drive the job synchronously; cancel flag is already observed at
        // the first file boundary, so it lands in `stopped`.
        job.cancel.store(true, Ordering::Relaxed);
        {
            let mut state = job.state.lock().unwrap();
            state.cancel_requested = true;
        }
        std::fs::write(root.join("x.flac"), b"x").unwrap();
        let (catalog, covers) = {
            let base = root.parent().unwrap();
            (
                CatalogDb::open(&base.join("catalog2.sqlite3")).unwrap(),
                base.join("covers"),
            )
        };
        run_job(&job, &catalog, &covers);

        assert_eq!(job.snapshot().status, ScanStatus::Stopped);

        // Drain pending events; the final one must be `stopped`, after
        // which the stream closes because the sender was dropped.
        let mut saw_stopped = false;
        loop {
            match receiver.recv().await {
                Ok(ScanEvent::Stopped { job }) => {
                    assert_eq!(job.status, ScanStatus::Stopped);
                    saw_stopped = true;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
        assert!(saw_stopped);
    }

    #[tokio::test]
    async fn recent_discoveries_ring_is_capped_newest_first() {
        let (_manager, root) = temp_manager("ring");
        let job = ScanJob::new(root);
        for i in 0..60 {
            job.on_discovered(DiscoveredItem {
                track_id: i,
                title: format!("t{i}"),
                album_id: 1,
                album_title: "Y".to_string(),
                file_path: format!("/m/{i}.flac"),
            });
        }
        let snapshot = job.snapshot();
        assert_eq!(snapshot.recent_discovered.len(), RECENT_DISCOVERED_CAP);
        assert_eq!(snapshot.recent_discovered[0].track_id, 59);
        assert_eq!(snapshot.recent_discovered[49].track_id, 10);
    }

    #[tokio::test]
    async fn rescan_of_unchanged_corpus_is_idempotent() {
        let (manager, root) = temp_manager("idempotent");
        std::fs::write(root.join("a.flac"), b"bad").unwrap();
        std::fs::write(root.join("b.txt"), b"text").unwrap();

        manager.start_scan(root.clone());
        let first = wait_terminal(&manager).await;

        manager.start_scan(root);
        let second = wait_terminal(&manager).await;

        assert_ne!(first.id, second.id);
        assert_eq!(second.scanned_files, first.scanned_files);
        assert_eq!(second.tracks_created_or_updated, first.tracks_created_or_updated);
    }
}
