//! The scan session controller.
//!
//! Owns the client-side session state (`is_scanning`, the poller, the last
//! rendered result and the current [`Screen`]) and mediates between user
//! commands, the [`ScanService`] and the renderer. Every operation reports
//! failures as notifications; none of them return errors.

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{CancelOutcome, ScanService};
use crate::config::SessionConfig;
use crate::error::Result;
use crate::export;
use crate::notify::{Notifier, ToastKind};
use crate::poller::PollHandle;
use crate::render::{render_history, render_result, HistoryView, ProgressView, ResultsView};
use crate::types::{ScanRequest, ScanResult, ScanStarted};

/// Enabled state of the start/stop controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub start_enabled: bool,
    pub stop_enabled: bool,
}

impl Controls {
    pub const IDLE: Controls = Controls {
        start_enabled: true,
        stop_enabled: false,
    };
    pub const SCANNING: Controls = Controls {
        start_enabled: false,
        stop_enabled: true,
    };
    const STARTING: Controls = Controls {
        start_enabled: false,
        stop_enabled: false,
    };
}

/// Everything a front-end needs to draw the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub controls: Controls,
    pub progress: ProgressView,
    pub results: ResultsView,
    pub history: HistoryView,
}

impl Default for Screen {
    fn default() -> Self {
        Self {
            controls: Controls::IDLE,
            progress: ProgressView::hidden(),
            results: ResultsView::NoResults,
            history: HistoryView::Empty,
        }
    }
}

struct SessionState {
    is_scanning: bool,
    poller: Option<PollHandle>,
    /// Last result rendered as a table; the export target.
    last_result: Option<ScanResult>,
    screen: Screen,
    /// Bumped by every stop so in-flight starts can tell they were abandoned.
    epoch: u64,
}

struct Shared<S> {
    service: S,
    notifier: Notifier,
    config: SessionConfig,
    state: Mutex<SessionState>,
    loading: AtomicUsize,
    progress_tx: watch::Sender<ProgressView>,
    completions_tx: watch::Sender<u64>,
}

/// Shared handle to one scan session. Clones drive the same session.
pub struct ScanController<S> {
    inner: Arc<Shared<S>>,
}

impl<S> Clone for ScanController<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Marks the session as busy until dropped.
struct LoadingGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> LoadingGuard<'a> {
    fn acquire(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<S: ScanService> ScanController<S> {
    pub fn new(service: S, notifier: Notifier, config: SessionConfig) -> Self {
        let (progress_tx, _) = watch::channel(ProgressView::hidden());
        let (completions_tx, _) = watch::channel(0);
        Self {
            inner: Arc::new(Shared {
                service,
                notifier,
                config,
                state: Mutex::new(SessionState {
                    is_scanning: false,
                    poller: None,
                    last_result: None,
                    screen: Screen::default(),
                    epoch: 0,
                }),
                loading: AtomicUsize::new(0),
                progress_tx,
                completions_tx,
            }),
        }
    }

    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    pub fn service(&self) -> &S {
        &self.inner.service
    }

    pub async fn screen(&self) -> Screen {
        self.inner.state.lock().await.screen.clone()
    }

    pub async fn is_scanning(&self) -> bool {
        self.inner.state.lock().await.is_scanning
    }

    pub fn is_loading(&self) -> bool {
        self.inner.loading.load(Ordering::SeqCst) > 0
    }

    /// True while a poller task is attached to the session.
    pub async fn is_polling(&self) -> bool {
        self.inner
            .state
            .lock()
            .await
            .poller
            .as_ref()
            .is_some_and(|p| !p.is_cancelled())
    }

    /// The result currently shown as a table, if any.
    pub async fn current_result(&self) -> Option<ScanResult> {
        self.inner.state.lock().await.last_result.clone()
    }

    /// Progress section updates, one value per change.
    pub fn watch_progress(&self) -> watch::Receiver<ProgressView> {
        self.inner.progress_tx.subscribe()
    }

    /// Counter bumped each time a scan completes and its results were loaded.
    pub fn completions(&self) -> watch::Receiver<u64> {
        self.inner.completions_tx.subscribe()
    }

    fn loading(&self) -> LoadingGuard<'_> {
        LoadingGuard::acquire(&self.inner.loading)
    }

    fn notify(&self, title: &str, message: &str, kind: ToastKind) {
        self.inner.notifier.notify(title, message, kind);
    }

    fn set_progress(&self, state: &mut SessionState, progress: ProgressView) {
        state.screen.progress = progress.clone();
        self.inner.progress_tx.send_replace(progress);
    }

    /// Return the session to idle: no poller, idle controls, progress hidden.
    fn disengage(&self, state: &mut SessionState) {
        state.is_scanning = false;
        if let Some(poller) = state.poller.take() {
            poller.cancel();
        }
        state.screen.controls = Controls::IDLE;
        self.set_progress(state, ProgressView::hidden());
    }

    fn show_result(&self, state: &mut SessionState, result: &ScanResult) {
        let view = render_result(result);
        state.last_result = match view {
            ResultsView::Table { .. } => Some(result.clone()),
            _ => None,
        };
        state.screen.results = view;
    }

    fn show_empty(&self, state: &mut SessionState) {
        state.screen.results = ResultsView::NoResults;
        state.last_result = None;
    }

    /// Start a scan of `raw_network` and begin polling its progress.
    ///
    /// Returns what the backend echoed when the session actually became active.
    pub async fn start_scan(&self, raw_network: &str) -> Option<ScanStarted> {
        let request = ScanRequest::new(raw_network);
        let epoch = {
            let mut state = self.inner.state.lock().await;
            if state.is_scanning {
                drop(state);
                self.notify(
                    "Scan In Progress",
                    "A scan is already running; stop it before starting another",
                    ToastKind::Warning,
                );
                return None;
            }
            state.screen.controls = Controls::STARTING;
            state.epoch
        };

        let _loading = self.loading();
        info!(network = %request.network, "starting scan");

        match self.inner.service.start_scan(&request).await {
            Ok(started) => {
                let mut state = self.inner.state.lock().await;
                if state.epoch != epoch {
                    info!(network = %started.network, "scan start acknowledged after stop; not monitoring it");
                    if !state.is_scanning {
                        state.screen.controls = Controls::IDLE;
                    }
                    return None;
                }
                if state.is_scanning {
                    debug!("session already active; keeping the existing poller");
                    return Some(started);
                }
                state.is_scanning = true;
                state.screen.controls = Controls::SCANNING;
                self.set_progress(&mut state, ProgressView::started(&started.network));
                self.start_poller(&mut state);
                drop(state);

                self.notify(
                    "Scan Started",
                    &format!("Network scan initiated for {}", started.network),
                    ToastKind::Success,
                );
                Some(started)
            }
            Err(e) => {
                warn!(error = %e, "scan start failed");
                {
                    let mut state = self.inner.state.lock().await;
                    if !state.is_scanning {
                        state.screen.controls = Controls::IDLE;
                    }
                }
                self.notify("Scan Error", &e.message_or("Failed to start scan"), ToastKind::Error);
                None
            }
        }
    }

    fn start_poller(&self, state: &mut SessionState) {
        if let Some(previous) = state.poller.take() {
            previous.cancel();
        }
        // The task must not keep the session alive: the session owns its handle.
        let session: Weak<Shared<S>> = Arc::downgrade(&self.inner);
        state.poller = Some(PollHandle::spawn(
            self.inner.config.poll_interval,
            move |token| {
                let session = session.clone();
                async move {
                    match session.upgrade() {
                        Some(inner) => ScanController { inner }.poll_tick(token).await,
                        None => ControlFlow::Break(()),
                    }
                }
            },
        ));
        debug!("status polling started");
    }

    async fn poll_tick(&self, token: CancellationToken) -> ControlFlow<()> {
        let status = match self.inner.service.status().await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "status check failed; skipping tick");
                return ControlFlow::Continue(());
            }
        };

        let mut state = self.inner.state.lock().await;
        if token.is_cancelled() {
            return ControlFlow::Break(());
        }
        if status.running {
            self.set_progress(&mut state, ProgressView::from_status(&status));
            return ControlFlow::Continue(());
        }
        if !state.is_scanning {
            return ControlFlow::Break(());
        }

        info!(found = status.found_hosts, scanned = status.scanned_hosts, "scan completed");
        self.disengage(&mut state);
        drop(state);

        tokio::time::sleep(self.inner.config.settle_delay).await;
        self.refresh_results().await;
        self.notify("Scan Complete", "Network scan completed successfully", ToastKind::Success);
        self.inner.completions_tx.send_modify(|n| *n += 1);
        ControlFlow::Break(())
    }

    /// Stop following the active scan.
    ///
    /// The backend is asked to abort only if the service supports it; otherwise
    /// this only disengages the client and the backend scan runs to completion.
    pub async fn stop_scan(&self) {
        let was_scanning = {
            let mut state = self.inner.state.lock().await;
            state.epoch += 1;
            let was = state.is_scanning;
            self.disengage(&mut state);
            was
        };

        if !was_scanning {
            self.notify("Scan Stopped", "No scan is being monitored", ToastKind::Info);
            return;
        }

        match self.inner.service.cancel_scan().await {
            Ok(CancelOutcome::Cancelled) => {
                info!("backend scan cancelled");
                self.notify("Scan Stopped", "Network scan has been stopped", ToastKind::Warning);
            }
            Ok(CancelOutcome::Unsupported) => {
                info!("stopped monitoring; backend scan left running");
                self.notify(
                    "Scan Stopped",
                    "Stopped monitoring; the backend scan may keep running until it finishes",
                    ToastKind::Info,
                );
            }
            Err(e) => {
                warn!(error = %e, "backend cancellation failed");
                self.notify(
                    "Scan Stopped",
                    &format!("Stopped monitoring, but the backend did not cancel: {e}"),
                    ToastKind::Warning,
                );
            }
        }
    }

    /// Delete every stored result on the backend and empty the panels.
    pub async fn clear_results(&self) -> bool {
        let _loading = self.loading();
        match self.inner.service.clear_results().await {
            Ok(()) => {
                {
                    let mut state = self.inner.state.lock().await;
                    self.show_empty(&mut state);
                    state.screen.history = HistoryView::Empty;
                }
                self.notify("Results Cleared", "All scan results have been cleared", ToastKind::Success);
                true
            }
            Err(e) => {
                warn!(error = %e, "clear failed");
                self.notify("Clear Error", &e.message_or("Failed to clear results"), ToastKind::Error);
                false
            }
        }
    }

    /// Reload the result list, show the newest entry and rebuild history.
    pub async fn refresh_results(&self) {
        let results = match self.inner.service.results().await {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "refresh failed");
                self.notify("Refresh Error", "Failed to refresh results", ToastKind::Error);
                return;
            }
        };

        let mut state = self.inner.state.lock().await;
        match results.last() {
            Some(latest) => {
                self.show_result(&mut state, latest);
                state.screen.history = render_history(&results);
                drop(state);
                self.notify("Results Refreshed", "Latest scan results loaded", ToastKind::Success);
            }
            None => {
                self.show_empty(&mut state);
                state.screen.history = HistoryView::Empty;
                drop(state);
                self.notify("No Results", "No scan results found", ToastKind::Info);
            }
        }
    }

    /// Show one history entry in the results panel.
    pub async fn load_scan_result(&self, id: u64) -> Option<ScanResult> {
        let _loading = self.loading();
        match self.inner.service.result(id).await {
            Ok(result) => {
                {
                    let mut state = self.inner.state.lock().await;
                    self.show_result(&mut state, &result);
                }
                self.notify(
                    "Results Loaded",
                    &format!("Loaded scan results for {}", result.network),
                    ToastKind::Success,
                );
                Some(result)
            }
            Err(e) => {
                warn!(id, error = %e, "loading result failed");
                self.notify("Load Error", &e.message_or("Failed to load scan result"), ToastKind::Error);
                None
            }
        }
    }

    /// Populate the history panel at startup. Failures are only logged.
    pub async fn load_initial_data(&self) {
        match self.inner.service.results().await {
            Ok(results) if !results.is_empty() => {
                self.inner.state.lock().await.screen.history = render_history(&results);
            }
            Ok(_) => debug!("no stored results"),
            Err(e) => warn!(error = %e, "failed to load initial data"),
        }
    }

    /// Download the backend export of result `id` into `dir`.
    pub async fn export_results(&self, id: u64, dir: &Path) -> Option<PathBuf> {
        let _loading = self.loading();
        let outcome: Result<PathBuf> = async {
            let file = self.inner.service.export(id).await?;
            export::write_export(dir, &file.file_name, &file.bytes).await
        }
        .await;
        self.report_export(outcome)
    }

    /// Fetch result `id` and write it as CSV into `dir`.
    pub async fn export_csv(&self, id: u64, dir: &Path) -> Option<PathBuf> {
        let _loading = self.loading();
        let outcome: Result<PathBuf> = async {
            let result = self.inner.service.result(id).await?;
            let csv = export::hosts_csv(&result)?;
            export::write_export(dir, &export::csv_file_name(id), csv.as_bytes()).await
        }
        .await;
        self.report_export(outcome)
    }

    fn report_export(&self, outcome: Result<PathBuf>) -> Option<PathBuf> {
        match outcome {
            Ok(path) => {
                self.notify(
                    "Export Complete",
                    &format!("Saved {}", path.display()),
                    ToastKind::Success,
                );
                Some(path)
            }
            Err(e) => {
                warn!(error = %e, "export failed");
                self.notify("Export Error", &e.message_or("Failed to export results"), ToastKind::Error);
                None
            }
        }
    }

    /// Detach the poller without notifications, e.g. on exit.
    pub async fn shutdown(&self) {
        let mut state = self.inner.state.lock().await;
        if let Some(poller) = state.poller.take() {
            poller.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ExportFile;
    use crate::error::ClientError;
    use crate::notify::Toast;
    use crate::types::{Host, ScanStatus};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, AtomicU64};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    /// In-memory backend. Status answers are scripted; once the script runs
    /// out, the backend reports `running: false`.
    #[derive(Default)]
    struct FakeBackend {
        start_error: Option<String>,
        /// How long `start_scan` takes to answer.
        start_delay: Option<Duration>,
        /// Number of upcoming status checks that fail before the script resumes.
        status_failures: AtomicU32,
        clear_fails: bool,
        cancel_supported: bool,
        statuses: StdMutex<VecDeque<ScanStatus>>,
        results: StdMutex<Vec<ScanResult>>,
        start_calls: AtomicU64,
        status_calls: AtomicU64,
        results_calls: AtomicU64,
        cancel_calls: AtomicU64,
    }

    fn running(progress: i64) -> ScanStatus {
        ScanStatus {
            running: true,
            progress,
            current_scan: Some("192.168.1.0/24".into()),
            scanned_hosts: progress as u64,
            found_hosts: 2,
            total_hosts: Some(254),
        }
    }

    fn finished_result(id: u64) -> ScanResult {
        ScanResult {
            id,
            network: "192.168.1.0/24".into(),
            timestamp: "2024-05-01 10:00:00".into(),
            hosts: Some(vec![Host::bare("192.168.1.1"), Host::bare("192.168.1.9")]),
            total_found: 2,
            total_scanned: 254,
            duration: Some("4.0s".into()),
            error: None,
        }
    }

    #[async_trait]
    impl ScanService for FakeBackend {
        async fn start_scan(&self, request: &ScanRequest) -> Result<ScanStarted> {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.start_delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(msg) = &self.start_error {
                return Err(ClientError::Backend {
                    status: 400,
                    message: Some(msg.clone()),
                });
            }
            let network = if request.network.is_empty() {
                "192.168.1.0/24".to_string()
            } else {
                request.network.clone()
            };
            Ok(ScanStarted {
                network,
                message: None,
            })
        }

        async fn cancel_scan(&self) -> Result<CancelOutcome> {
            self.cancel_calls.fetch_add(1, Ordering::SeqCst);
            Ok(if self.cancel_supported {
                CancelOutcome::Cancelled
            } else {
                CancelOutcome::Unsupported
            })
        }

        async fn clear_results(&self) -> Result<()> {
            if self.clear_fails {
                return Err(ClientError::Backend {
                    status: 500,
                    message: None,
                });
            }
            self.results.lock().unwrap().clear();
            Ok(())
        }

        async fn status(&self) -> Result<ScanStatus> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            if self.status_failures.load(Ordering::SeqCst) > 0 {
                self.status_failures.fetch_sub(1, Ordering::SeqCst);
                return Err(ClientError::transport(
                    "api/status",
                    std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer"),
                ));
            }
            Ok(self
                .statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default())
        }

        async fn results(&self) -> Result<Vec<ScanResult>> {
            self.results_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.results.lock().unwrap().clone())
        }

        async fn result(&self, id: u64) -> Result<ScanResult> {
            self.results
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.id == id)
                .cloned()
                .ok_or(ClientError::Backend {
                    status: 404,
                    message: Some("Scan not found".into()),
                })
        }

        async fn export(&self, id: u64) -> Result<ExportFile> {
            let result = self.result(id).await?;
            Ok(ExportFile {
                file_name: export::json_file_name(id),
                bytes: serde_json::to_vec_pretty(&result).unwrap(),
            })
        }
    }

    fn controller(backend: FakeBackend) -> ScanController<FakeBackend> {
        ScanController::new(
            backend,
            Notifier::new(Duration::from_secs(5)),
            SessionConfig::default(),
        )
    }

    fn titles(toasts: &[Toast]) -> Vec<&str> {
        toasts.iter().map(|t| t.title.as_str()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn start_enters_scanning_state() {
        let c = controller(FakeBackend::default());
        let started = c.start_scan("  10.0.0.0/24 ").await.unwrap();
        assert_eq!(started.network, "10.0.0.0/24");

        let screen = c.screen().await;
        assert!(c.is_scanning().await);
        assert!(c.is_polling().await);
        assert!(!c.is_loading());
        assert_eq!(screen.controls, Controls::SCANNING);
        assert!(screen.progress.visible);
        assert_eq!(screen.progress.title, "Scanning 10.0.0.0/24");

        let toasts = c.notifier().visible();
        assert_eq!(toasts[0].message, "Network scan initiated for 10.0.0.0/24");
        c.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_does_not_spawn_another_poller() {
        let backend = FakeBackend::default();
        backend
            .statuses
            .lock()
            .unwrap()
            .extend((1..=20).map(running));
        let c = controller(backend);

        c.start_scan("10.0.0.0/24").await.unwrap();
        assert!(c.start_scan("10.0.0.0/24").await.is_none());
        assert_eq!(c.service().start_calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(c.service().status_calls.load(Ordering::SeqCst), 3);
        assert_eq!(c.screen().await.progress.percent, 3);
        assert!(titles(&c.notifier().visible()).contains(&"Scan In Progress"));
        c.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_start_restores_idle_controls() {
        let c = controller(FakeBackend {
            start_error: Some("Scan already in progress".into()),
            ..FakeBackend::default()
        });
        assert!(c.start_scan("").await.is_none());

        let screen = c.screen().await;
        assert!(!c.is_scanning().await);
        assert!(!c.is_polling().await);
        assert!(!c.is_loading());
        assert_eq!(screen.controls, Controls::IDLE);
        assert!(!screen.progress.visible);

        let toast = &c.notifier().visible()[0];
        assert_eq!(toast.kind, ToastKind::Error);
        assert_eq!(toast.message, "Scan already in progress");
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_twice_is_harmless() {
        let c = controller(FakeBackend::default());
        c.start_scan("10.0.0.0/24").await.unwrap();

        c.stop_scan().await;
        c.stop_scan().await;

        assert!(!c.is_scanning().await);
        assert!(!c.is_polling().await);
        assert_eq!(c.screen().await.controls, Controls::IDLE);
        assert_eq!(c.service().cancel_calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(c.service().status_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn start_acknowledged_after_stop_is_ignored() {
        let c = controller(FakeBackend {
            start_delay: Some(Duration::from_secs(2)),
            ..FakeBackend::default()
        });
        let pending = tokio::spawn({
            let c = c.clone();
            async move { c.start_scan("10.0.0.0/24").await }
        });

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(c.service().start_calls.load(Ordering::SeqCst), 1);
        c.stop_scan().await;

        assert!(pending.await.unwrap().is_none());
        assert!(!c.is_scanning().await);
        assert!(!c.is_polling().await);
        assert!(!c.is_loading());
        let screen = c.screen().await;
        assert_eq!(screen.controls, Controls::IDLE);
        assert!(!screen.progress.visible);
        assert!(!titles(&c.notifier().visible()).contains(&"Scan Started"));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(c.service().status_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_reports_backend_cancellation() {
        let c = controller(FakeBackend {
            cancel_supported: true,
            ..FakeBackend::default()
        });
        c.start_scan("10.0.0.0/24").await.unwrap();
        c.stop_scan().await;
        let toasts = c.notifier().visible();
        let stopped = toasts.iter().find(|t| t.title == "Scan Stopped").unwrap();
        assert_eq!(stopped.kind, ToastKind::Warning);
        assert_eq!(stopped.message, "Network scan has been stopped");
    }

    #[tokio::test(start_paused = true)]
    async fn completion_refreshes_once_and_stops_polling() {
        let backend = FakeBackend::default();
        backend.statuses.lock().unwrap().extend([running(40), running(80)]);
        backend.results.lock().unwrap().push(finished_result(1));
        let c = controller(backend);
        let mut done = c.completions();

        c.start_scan("192.168.1.0/24").await.unwrap();
        tokio::time::timeout(Duration::from_secs(30), done.changed())
            .await
            .unwrap()
            .unwrap();

        assert!(!c.is_scanning().await);
        assert!(!c.is_polling().await);
        let screen = c.screen().await;
        assert_eq!(screen.controls, Controls::IDLE);
        assert!(!screen.progress.visible);
        assert_eq!(screen.results.rows().len(), 2);
        assert_eq!(screen.history.entries().len(), 1);
        assert_eq!(c.current_result().await.unwrap().id, 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(c.service().status_calls.load(Ordering::SeqCst), 3);
        assert_eq!(c.service().results_calls.load(Ordering::SeqCst), 1);
        assert_eq!(*done.borrow(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_status_checks_are_skipped() {
        let backend = FakeBackend {
            status_failures: AtomicU32::new(2),
            ..FakeBackend::default()
        };
        backend.statuses.lock().unwrap().push_back(running(50));
        backend.results.lock().unwrap().push(finished_result(1));
        let c = controller(backend);
        let mut done = c.completions();

        c.start_scan("192.168.1.0/24").await.unwrap();
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(c.service().status_calls.load(Ordering::SeqCst), 2);
        assert!(c.is_scanning().await);
        assert!(c.is_polling().await);
        let screen = c.screen().await;
        assert_eq!(screen.controls, Controls::SCANNING);
        assert_eq!(screen.progress.percent, 0);

        tokio::time::timeout(Duration::from_secs(30), done.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(!c.is_scanning().await);
        assert_eq!(c.service().status_calls.load(Ordering::SeqCst), 4);
        assert_eq!(c.screen().await.results.rows().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn finished_status_with_negative_host_count_completes() {
        let backend = FakeBackend::default();
        let finished: ScanStatus = serde_json::from_str(
            r#"{"running": false, "progress": 100, "current_scan": null, "total_hosts": -1, "scanned_hosts": 0, "found_hosts": 0}"#,
        )
        .unwrap();
        backend.statuses.lock().unwrap().push_back(finished);
        backend.results.lock().unwrap().push(finished_result(1));
        let c = controller(backend);
        let mut done = c.completions();

        c.start_scan("10.0.0.7/32").await.unwrap();
        tokio::time::timeout(Duration::from_secs(30), done.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(!c.is_scanning().await);
        assert!(!c.is_polling().await);
        assert_eq!(c.screen().await.controls, Controls::IDLE);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_every_handle_releases_the_session() {
        let c = controller(FakeBackend::default());
        c.start_scan("10.0.0.0/24").await.unwrap();
        assert!(c.is_polling().await);

        let session = Arc::downgrade(&c.inner);
        drop(c);
        assert!(session.upgrade().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn completion_toast_is_raised_once() {
        let backend = FakeBackend::default();
        backend.results.lock().unwrap().push(finished_result(1));
        let c = controller(backend);
        let mut rx = c.notifier().subscribe();
        let mut done = c.completions();

        c.start_scan("192.168.1.0/24").await.unwrap();
        done.changed().await.unwrap();

        let mut seen = Vec::new();
        while let Ok(t) = rx.try_recv() {
            seen.push(t.title);
        }
        assert_eq!(
            seen,
            vec!["Scan Started", "Results Refreshed", "Scan Complete"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn clear_failure_keeps_display() {
        let backend = FakeBackend {
            clear_fails: true,
            ..FakeBackend::default()
        };
        backend.results.lock().unwrap().push(finished_result(1));
        let c = controller(backend);
        c.refresh_results().await;
        let before = c.screen().await;

        assert!(!c.clear_results().await);
        assert_eq!(c.screen().await, before);
        let last = c.notifier().visible().pop().unwrap();
        assert_eq!(last.title, "Clear Error");
        assert_eq!(last.message, "Failed to clear results");
    }

    #[tokio::test(start_paused = true)]
    async fn clear_success_empties_both_panels() {
        let backend = FakeBackend::default();
        backend.results.lock().unwrap().push(finished_result(1));
        let c = controller(backend);
        c.refresh_results().await;
        assert!(c.current_result().await.is_some());

        assert!(c.clear_results().await);
        let screen = c.screen().await;
        assert_eq!(screen.results, ResultsView::NoResults);
        assert_eq!(screen.history, HistoryView::Empty);
        assert!(c.current_result().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_with_no_results_shows_empty_state() {
        let c = controller(FakeBackend::default());
        c.refresh_results().await;
        let screen = c.screen().await;
        assert_eq!(screen.results, ResultsView::NoResults);
        assert_eq!(c.notifier().visible()[0].title, "No Results");
    }

    #[tokio::test(start_paused = true)]
    async fn loading_an_unknown_id_surfaces_backend_message() {
        let c = controller(FakeBackend::default());
        assert!(c.load_scan_result(42).await.is_none());
        let toast = &c.notifier().visible()[0];
        assert_eq!(toast.title, "Load Error");
        assert_eq!(toast.message, "Scan not found");
        assert!(!c.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn initial_load_only_fills_history() {
        let backend = FakeBackend::default();
        backend
            .results
            .lock()
            .unwrap()
            .extend((1..=7).map(finished_result));
        let c = controller(backend);
        c.load_initial_data().await;

        let screen = c.screen().await;
        assert_eq!(screen.results, ResultsView::NoResults);
        let ids: Vec<u64> = screen.history.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![7, 6, 5, 4, 3]);
        assert!(c.notifier().visible().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn csv_export_writes_file() {
        let backend = FakeBackend::default();
        backend.results.lock().unwrap().push(finished_result(3));
        let c = controller(backend);
        let dir = tempfile::tempdir().unwrap();

        let path = c.export_csv(3, dir.path()).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "netscan_3.csv");
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.starts_with("IP Address,Hostname,Device Type,MAC Address,Vendor,Status"));

        let json = c.export_results(3, dir.path()).await.unwrap();
        assert_eq!(json.file_name().unwrap(), "netscan_3.json");
        assert!(c.export_results(99, dir.path()).await.is_none());
    }
}
