use std::sync::Arc;
use std::time::Duration;

use super::session::Generation;
use crate::results::ResultSet;

/// Scan progress of one session, counted in buddies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub scanned: usize,
    pub total: usize,
}

impl Progress {
    pub fn is_done(&self) -> bool {
        self.scanned >= self.total
    }
}

/// Payload of the completion notification
#[derive(Debug, Clone)]
pub struct CompletionSummary {
    pub results: Arc<ResultSet>,
    /// Chats that could not be read and were left out
    pub skipped: usize,
    pub elapsed: Duration,
}

/// Notifications published by the search engine
///
/// Every event carries the generation of the session that produced it, so a
/// consumer can drop events from sessions it no longer cares about.
#[derive(Debug, Clone)]
pub enum SearchEvent {
    Progress {
        generation: Generation,
        progress: Progress,
    },
    Completed {
        generation: Generation,
        summary: CompletionSummary,
    },
}

impl SearchEvent {
    pub fn generation(&self) -> Generation {
        match self {
            SearchEvent::Progress { generation, .. } => *generation,
            SearchEvent::Completed { generation, .. } => *generation,
        }
    }
}
