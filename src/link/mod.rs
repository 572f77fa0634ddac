//! # Link Reader Module
//!
//! Continuously pulls lines from the controller link and feeds them into the
//! [`TelemetryStore`].
//!
//! ## Lifecycle
//!
//! ```text
//! Idle --start()--> Running --stop()--> Stopping --(loop boundary)--> Stopped
//!                      |                                                 ^
//!                      +----------------- link lost ---------------------+
//! ```
//!
//! Each loop iteration polls the link for at most one poll period, so a stop
//! request is observed with bounded latency. At most one in-flight line is
//! applied after `stop()` returns. Transport errors end the loop: the reader
//! records the cause, moves to `Stopped` and reports [`GcuError::LinkLost`]
//! instead of retrying, so stale telemetry is never shown as live. A failed
//! write on the command side is reported through a [`LinkMonitor`] and ends
//! the session the same way.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{GcuError, Result};
use crate::serial::port_trait::LineSource;
use crate::telemetry::TelemetryStore;

/// Default sleep after a poll that produced no line
pub const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_millis(5);

/// Reader lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LinkState {
    Idle = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl LinkState {
    fn from_u8(raw: u8) -> LinkState {
        match raw {
            0 => LinkState::Idle,
            1 => LinkState::Running,
            2 => LinkState::Stopping,
            _ => LinkState::Stopped,
        }
    }
}

/// What the presentation layer polls to learn whether telemetry is live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkStatus {
    pub state: LinkState,
    /// Why the link dropped, if it did
    pub lost: Option<String>,
}

impl LinkStatus {
    /// True while telemetry is still being received
    pub fn is_live(&self) -> bool {
        self.state == LinkState::Running && self.lost.is_none()
    }
}

/// State visible to both the reader task and its controllers
#[derive(Debug)]
struct Shared {
    state: AtomicU8,
    lost: Mutex<Option<String>>,
    stopped: Notify,
}

impl Shared {
    fn state(&self) -> LinkState {
        LinkState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, from: LinkState, to: LinkState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn set(&self, state: LinkState) {
        self.state.store(state as u8, Ordering::Release);
        if state == LinkState::Stopped {
            self.stopped.notify_waiters();
        }
    }

    fn lost(&self) -> Option<String> {
        self.lost.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Keep the first cause; later failures are consequences of it
    fn record_lost(&self, cause: String) {
        let mut lost = self.lost.lock().unwrap_or_else(PoisonError::into_inner);
        if lost.is_none() {
            *lost = Some(cause);
        }
    }
}

/// Handle for reporting a transport failure seen outside the read loop
#[derive(Debug, Clone)]
pub struct LinkMonitor {
    shared: Arc<Shared>,
}

impl LinkMonitor {
    /// Mark the link lost and end the read loop
    ///
    /// A running loop stops at its next iteration boundary and its
    /// [`LinkReader::wait`] returns [`GcuError::LinkLost`]. A reader that was
    /// never started goes straight to `Stopped`.
    pub fn report_lost(&self, cause: impl Into<String>) {
        let cause = cause.into();
        error!("Link lost: {}", cause);
        self.shared.record_lost(cause);

        if !self.shared.transition(LinkState::Running, LinkState::Stopping)
            && self.shared.transition(LinkState::Idle, LinkState::Stopped)
        {
            self.shared.stopped.notify_waiters();
        }
    }
}

/// Owner of the link's read half and the loop that drains it
pub struct LinkReader {
    store: Arc<TelemetryStore>,
    shared: Arc<Shared>,
    source: Mutex<Option<Box<dyn LineSource>>>,
    task: Mutex<Option<JoinHandle<Result<()>>>>,
    idle_backoff: Duration,
}

impl std::fmt::Debug for LinkReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkReader")
            .field("state", &self.shared.state())
            .field("idle_backoff", &self.idle_backoff)
            .finish_non_exhaustive()
    }
}

impl LinkReader {
    /// Create an idle reader
    ///
    /// # Arguments
    ///
    /// * `source` - Read half of the link
    /// * `store` - Telemetry state this reader is the sole writer of
    /// * `idle_backoff` - Pause after an empty poll
    pub fn new(source: Box<dyn LineSource>, store: Arc<TelemetryStore>, idle_backoff: Duration) -> Self {
        Self {
            store,
            shared: Arc::new(Shared {
                state: AtomicU8::new(LinkState::Idle as u8),
                lost: Mutex::new(None),
                stopped: Notify::new(),
            }),
            source: Mutex::new(Some(source)),
            task: Mutex::new(None),
            idle_backoff,
        }
    }

    /// Start the read loop on the Tokio runtime
    ///
    /// Only `Idle -> Running` does anything; every other state is a no-op.
    /// Must be called from within a Tokio runtime.
    ///
    /// # Returns
    ///
    /// * `bool` - Whether this call started the loop
    pub fn start(&self) -> bool {
        if !self.shared.transition(LinkState::Idle, LinkState::Running) {
            debug!("start() ignored in state {:?}", self.shared.state());
            return false;
        }

        let source = self
            .source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(source) = source else {
            warn!("Link reader has no transport; marking stopped");
            self.shared.set(LinkState::Stopped);
            return false;
        };

        let handle = tokio::spawn(run_loop(
            source,
            Arc::clone(&self.store),
            Arc::clone(&self.shared),
            self.idle_backoff,
        ));
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        info!("Link reader started");
        true
    }

    /// Ask the loop to stop at its next iteration boundary
    ///
    /// Safe to call from any thread. Does not wait; use [`LinkReader::wait`]
    /// to observe `Stopped`.
    ///
    /// # Returns
    ///
    /// * `bool` - Whether this call requested the stop
    pub fn stop(&self) -> bool {
        let requested = self.shared.transition(LinkState::Running, LinkState::Stopping);
        if requested {
            info!("Link reader stop requested");
        } else {
            debug!("stop() ignored in state {:?}", self.shared.state());
        }
        requested
    }

    /// Wait for the read loop to finish
    ///
    /// # Errors
    ///
    /// Returns [`GcuError::LinkLost`] if the link was lost, on every call.
    /// Returns `Ok(())` if it was stopped or never started.
    pub async fn wait(&self) -> Result<()> {
        let handle = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| GcuError::LinkLost(format!("reader task aborted: {}", e)))??;
        }

        match self.shared.lost() {
            Some(cause) => Err(GcuError::LinkLost(cause)),
            None => Ok(()),
        }
    }

    /// Resolve once the reader reaches `Stopped`
    ///
    /// Unlike [`LinkReader::wait`] this does not consume the task handle, so
    /// it can be raced in `tokio::select!`.
    pub async fn stopped(&self) {
        loop {
            let notified = self.shared.stopped.notified();
            if self.shared.state() == LinkState::Stopped {
                return;
            }
            notified.await;
        }
    }

    /// Handle the command side uses to report write failures
    pub fn monitor(&self) -> LinkMonitor {
        LinkMonitor {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn state(&self) -> LinkState {
        self.shared.state()
    }

    pub fn status(&self) -> LinkStatus {
        LinkStatus {
            state: self.shared.state(),
            lost: self.shared.lost(),
        }
    }
}

impl Drop for LinkReader {
    fn drop(&mut self) {
        // The detached loop would otherwise keep the read half open
        if self.shared.transition(LinkState::Running, LinkState::Stopping) {
            debug!("Link reader dropped while running; stopping loop");
        }
    }
}

/// The read loop: poll, decode, apply, until stopped or the link fails
async fn run_loop(
    mut source: Box<dyn LineSource>,
    store: Arc<TelemetryStore>,
    shared: Arc<Shared>,
    idle_backoff: Duration,
) -> Result<()> {
    let outcome = loop {
        if shared.state() != LinkState::Running {
            break match shared.lost() {
                Some(cause) => Err(GcuError::LinkLost(cause)),
                None => Ok(()),
            };
        }

        match source.read_line_if_available().await {
            Ok(Some(line)) => {
                // Decode failures are counted by the store and otherwise dropped
                let _ = store.ingest_line(&line);
            }
            Ok(None) => {
                if idle_backoff.is_zero() {
                    tokio::task::yield_now().await;
                } else {
                    tokio::time::sleep(idle_backoff).await;
                }
            }
            Err(e) => {
                error!("Link lost: {}", e);
                shared.record_lost(e.to_string());
                break Err(GcuError::LinkLost(e.to_string()));
            }
        }
    };

    if let Err(e) = source.close().await {
        warn!("Failed to close link: {}", e);
    }
    shared.set(LinkState::Stopped);

    info!(
        "Link reader stopped ({} lines, {} rows, {} dropped)",
        store.lines_seen(),
        store.log().len(),
        store.decode_failures()
    );
    outcome
}
