//! Clipboard domain: polls the system clipboard for highlight candidates
//! while the capture surface is visible.
//!
//! The poll loop runs on its own thread because the native clipboard
//! handle is not `Send` on every platform; it is created on that thread.

pub mod filters;

pub use filters::{ClipboardLedger, ClipboardVerdict};

use crate::error::{Error, Result};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};

/// Anything that can be asked for its current text content.
pub trait ClipboardSource {
    /// `Ok(None)` when the clipboard holds no text.
    fn read_text(&mut self) -> Result<Option<String>>;
}

/// The OS clipboard via arboard.
pub struct SystemClipboard {
    inner: arboard::Clipboard,
}

impl SystemClipboard {
    pub fn new() -> Result<Self> {
        let inner = arboard::Clipboard::new().map_err(|e| Error::Clipboard(e.to_string()))?;
        Ok(Self { inner })
    }
}

impl ClipboardSource for SystemClipboard {
    fn read_text(&mut self) -> Result<Option<String>> {
        match self.inner.get_text() {
            Ok(text) => Ok(Some(text)),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(Error::Clipboard(e.to_string())),
        }
    }
}

/// One poll tick: read, classify, forward on acceptance.
pub fn poll_once(
    source: &mut dyn ClipboardSource,
    ledger: &Mutex<ClipboardLedger>,
    highlights: &mpsc::UnboundedSender<String>,
    now: Instant,
) -> Option<String> {
    let text = match source.read_text() {
        Ok(Some(t)) => t,
        Ok(None) => return None,
        Err(e) => {
            log::debug!("[CLIPBOARD] Read failed: {}", e);
            return None;
        }
    };

    let accepted = ledger
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .observe(&text, now)?;

    log::info!("[CLIPBOARD] Highlight captured ({} chars)", accepted.chars().count());
    if highlights.send(accepted.clone()).is_err() {
        log::debug!("[CLIPBOARD] Highlight consumer gone");
    }
    Some(accepted)
}

/// Handle to a running poll loop.
pub struct ClipboardWatcher {
    visible: watch::Sender<bool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl ClipboardWatcher {
    /// Start polling. `make_source` runs on the poll thread.
    pub fn start<S, F>(
        ledger: Arc<Mutex<ClipboardLedger>>,
        make_source: F,
        highlights: mpsc::UnboundedSender<String>,
    ) -> Self
    where
        S: ClipboardSource,
        F: FnOnce() -> Result<S> + Send + 'static,
    {
        let interval = {
            let guard = ledger.lock().unwrap_or_else(|e| e.into_inner());
            Duration::from_millis(guard.policy().poll_interval_ms.max(1))
        };
        let (visible_tx, visible_rx) = watch::channel(true);

        let thread = std::thread::spawn(move || {
            let mut source = match make_source() {
                Ok(s) => s,
                Err(e) => {
                    log::error!("[CLIPBOARD] Could not open clipboard: {}", e);
                    return;
                }
            };
            log::info!("[CLIPBOARD] Polling every {}ms", interval.as_millis());
            while *visible_rx.borrow() {
                poll_once(&mut source, &ledger, &highlights, Instant::now());
                std::thread::sleep(interval);
            }
            log::info!("[CLIPBOARD] Capture surface hidden; polling stopped");
        });

        Self {
            visible: visible_tx,
            thread: Some(thread),
        }
    }

    /// Start polling the system clipboard.
    pub fn start_system(
        ledger: Arc<Mutex<ClipboardLedger>>,
        highlights: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self::start(ledger, SystemClipboard::new, highlights)
    }

    /// Signal that the capture surface is hidden; the loop exits on its
    /// next tick.
    pub fn hide(&self) {
        let _ = self.visible.send(false);
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Hide and wait for the poll thread to finish.
    pub fn stop(mut self) {
        self.hide();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for ClipboardWatcher {
    fn drop(&mut self) {
        self.hide();
    }
}
