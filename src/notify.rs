use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use ::time::{format_description::well_known, OffsetDateTime};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    Success,
    Error,
    Warning,
    Info,
}

impl ToastKind {
    fn marker(self) -> &'static str {
        match self {
            ToastKind::Success => "[ok]",
            ToastKind::Error => "[error]",
            ToastKind::Warning => "[warn]",
            ToastKind::Info => "[info]",
        }
    }
}

/// One transient message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub id: u64,
    pub title: String,
    pub message: String,
    pub kind: ToastKind,
    pub raised_at: String,
}

impl fmt::Display for Toast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.kind.marker(), self.title, self.message)
    }
}

type Tray = Mutex<Vec<Toast>>;

/// Raises toasts and expires each one on its own timer.
///
/// Clones share one tray, created on first use.
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<NotifierInner>,
}

struct NotifierInner {
    tray: OnceLock<Arc<Tray>>,
    next_id: AtomicU64,
    ttl: Duration,
    events: broadcast::Sender<Toast>,
}

impl Notifier {
    pub fn new(ttl: Duration) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(NotifierInner {
                tray: OnceLock::new(),
                next_id: AtomicU64::new(1),
                ttl,
                events,
            }),
        }
    }

    fn tray(&self) -> &Arc<Tray> {
        self.inner.tray.get_or_init(|| Arc::new(Mutex::new(Vec::new())))
    }

    /// Raise a toast. Returns its id.
    pub fn notify(&self, title: &str, message: &str, kind: ToastKind) -> u64 {
        match kind {
            ToastKind::Error => error!("{title}: {message}"),
            ToastKind::Warning => warn!("{title}: {message}"),
            ToastKind::Success | ToastKind::Info => info!("{title}: {message}"),
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let toast = Toast {
            id,
            title: title.to_string(),
            message: message.to_string(),
            kind,
            raised_at: now_rfc3339(),
        };
        let tray = self.tray().clone();
        lock(&tray).push(toast.clone());
        let _ = self.inner.events.send(toast);

        if let Ok(rt) = tokio::runtime::Handle::try_current() {
            let ttl = self.inner.ttl;
            rt.spawn(async move {
                tokio::time::sleep(ttl).await;
                lock(&tray).retain(|t| t.id != id);
            });
        }
        id
    }

    /// Remove a toast before it expires. Returns false if it was already gone.
    pub fn dismiss(&self, id: u64) -> bool {
        let mut tray = lock(self.tray());
        let before = tray.len();
        tray.retain(|t| t.id != id);
        tray.len() != before
    }

    /// Toasts currently in the tray, oldest first.
    pub fn visible(&self) -> Vec<Toast> {
        match self.inner.tray.get() {
            Some(tray) => lock(tray).clone(),
            None => Vec::new(),
        }
    }

    /// Stream of every toast raised from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Toast> {
        self.inner.events.subscribe()
    }
}

fn lock(tray: &Tray) -> std::sync::MutexGuard<'_, Vec<Toast>> {
    tray.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
