use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::warn;

use crate::pattern::PatternOptions;

/// Monotonically increasing identifier of a search, issued by the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(pub u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a search session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Running,
    Completed,
    Superseded,
}

impl SessionStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionStatus::Running,
            1 => SessionStatus::Completed,
            _ => SessionStatus::Superseded,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            SessionStatus::Running => 0,
            SessionStatus::Completed => 1,
            SessionStatus::Superseded => 2,
        }
    }
}

#[derive(Debug)]
struct SessionState {
    generation: Generation,
    term: String,
    options: PatternOptions,
    status: AtomicU8,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to one search invocation
///
/// Clones refer to the same session. The engine keeps one clone to supersede
/// the session when a newer one starts; the worker keeps another to notice it.
#[derive(Debug, Clone)]
pub struct SearchSession {
    state: Arc<SessionState>,
}

impl SearchSession {
    pub(crate) fn new(generation: Generation, term: &str, options: PatternOptions) -> Self {
        Self {
            state: Arc::new(SessionState {
                generation,
                term: term.to_string(),
                options,
                status: AtomicU8::new(SessionStatus::Running.as_u8()),
                worker: Mutex::new(None),
            }),
        }
    }

    pub fn generation(&self) -> Generation {
        self.state.generation
    }

    pub fn term(&self) -> &str {
        &self.state.term
    }

    pub fn options(&self) -> PatternOptions {
        self.state.options
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus::from_u8(self.state.status.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.status() == SessionStatus::Running
    }

    pub fn is_superseded(&self) -> bool {
        self.status() == SessionStatus::Superseded
    }

    /// Stops the session cooperatively
    ///
    /// The worker notices at its next chat or buddy boundary and exits without
    /// publishing anything. A session that already completed keeps its status;
    /// returns whether the session was still running.
    pub fn cancel(&self) -> bool {
        self.transition(SessionStatus::Running, SessionStatus::Superseded)
    }

    /// Blocks until the session's worker has exited
    pub fn join(&self) {
        let handle = self.state.worker.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("Search worker {} panicked", self.generation());
            }
        }
    }

    pub(crate) fn supersede(&self) {
        self.state
            .status
            .store(SessionStatus::Superseded.as_u8(), Ordering::Release);
    }

    /// Running -> Completed; fails if the session was superseded meanwhile
    pub(crate) fn complete(&self) -> bool {
        self.transition(SessionStatus::Running, SessionStatus::Completed)
    }

    fn transition(&self, from: SessionStatus, to: SessionStatus) -> bool {
        self.state
            .status
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn attach_worker(&self, handle: JoinHandle<()>) {
        *self.state.worker.lock() = Some(handle);
    }
}
