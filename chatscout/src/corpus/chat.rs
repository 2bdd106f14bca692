use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::buddy::BuddyId;
use crate::errors::Result;

static NEXT_CHAT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identifier of a chat, unique within the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(u64);

impl ChatId {
    fn next() -> Self {
        Self(NEXT_CHAT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chat#{}", self.0)
    }
}

/// Transcript text supplied by an external importer
///
/// Implementations parse whatever on-disk format they own and hand back plain
/// text. `read_text` is called from search workers, once per scan.
pub trait TranscriptSource: Send + Sync + fmt::Debug {
    /// Identifier shown to users, e.g. a file path or an importer URI
    fn source_id(&self) -> &str;

    fn read_text(&self) -> Result<String>;
}

/// Where the text of a chat comes from
#[derive(Debug, Clone)]
pub enum ChatSource {
    /// Text already held in memory
    Inline { source_id: String, text: Arc<str> },
    /// A plain-text transcript file, read when the chat is scanned
    File(PathBuf),
    /// A transcript provided by an importer
    External(Arc<dyn TranscriptSource>),
}

impl ChatSource {
    pub fn source_id(&self) -> String {
        match self {
            ChatSource::Inline { source_id, .. } => source_id.clone(),
            ChatSource::File(path) => path.display().to_string(),
            ChatSource::External(source) => source.source_id().to_string(),
        }
    }
}

/// One transcript owned by a buddy
///
/// Chats are immutable. They are shared as `Arc<Chat>` so that a search
/// snapshot keeps them alive even after the owning buddy deletes them.
#[derive(Debug)]
pub struct Chat {
    id: ChatId,
    buddy: BuddyId,
    source_id: String,
    source: ChatSource,
}

impl Chat {
    pub(crate) fn new(buddy: BuddyId, source: ChatSource) -> Self {
        Self {
            id: ChatId::next(),
            buddy,
            source_id: source.source_id(),
            source,
        }
    }

    pub fn id(&self) -> ChatId {
        self.id
    }

    /// The buddy that owns this chat
    pub fn buddy(&self) -> BuddyId {
        self.buddy
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn source(&self) -> &ChatSource {
        &self.source
    }

    /// Path of the transcript file, for file-backed chats
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            ChatSource::File(path) => Some(path),
            _ => None,
        }
    }
}
