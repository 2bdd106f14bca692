use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::chat::{Chat, ChatId, ChatSource, TranscriptSource};

static NEXT_BUDDY_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identifier of a buddy, unique within the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuddyId(u64);

impl BuddyId {
    pub(crate) fn next() -> Self {
        Self(NEXT_BUDDY_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BuddyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buddy#{}", self.0)
    }
}

/// A conversation partner and the transcripts recorded with them
#[derive(Debug)]
pub struct Buddy {
    id: BuddyId,
    name: String,
    chats: Vec<Arc<Chat>>,
}

impl Buddy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: BuddyId::next(),
            name: name.into(),
            chats: Vec::new(),
        }
    }

    pub fn id(&self) -> BuddyId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends a chat whose text is already in memory
    pub fn add_chat(
        &mut self,
        source_id: impl Into<String>,
        text: impl Into<Arc<str>>,
    ) -> Arc<Chat> {
        self.push(ChatSource::Inline {
            source_id: source_id.into(),
            text: text.into(),
        })
    }

    /// Appends a chat backed by a plain-text transcript file
    pub fn add_chat_file(&mut self, path: impl Into<PathBuf>) -> Arc<Chat> {
        self.push(ChatSource::File(path.into()))
    }

    /// Appends a chat provided by an importer
    pub fn add_chat_from(&mut self, source: Arc<dyn TranscriptSource>) -> Arc<Chat> {
        self.push(ChatSource::External(source))
    }

    fn push(&mut self, source: ChatSource) -> Arc<Chat> {
        let chat = Arc::new(Chat::new(self.id, source));
        self.chats.push(Arc::clone(&chat));
        chat
    }

    pub fn number_of_chats(&self) -> usize {
        self.chats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }

    pub fn chat_at(&self, index: usize) -> Option<&Arc<Chat>> {
        self.chats.get(index)
    }

    pub fn chat(&self, id: ChatId) -> Option<&Arc<Chat>> {
        self.chats.iter().find(|chat| chat.id() == id)
    }

    pub fn position(&self, id: ChatId) -> Option<usize> {
        self.chats.iter().position(|chat| chat.id() == id)
    }

    pub fn chats(&self) -> &[Arc<Chat>] {
        &self.chats
    }

    /// Orders chats by source identifier
    ///
    /// Transcript files are named by date, so this is chronological order for
    /// archives on disk.
    pub fn sort(&mut self) {
        self.chats.sort_by(|a, b| a.source_id().cmp(b.source_id()));
    }

    /// Orders chats with a caller-chosen comparison; the sort is stable
    pub fn sort_by<F>(&mut self, mut compare: F)
    where
        F: FnMut(&Chat, &Chat) -> CmpOrdering,
    {
        self.chats.sort_by(|a, b| compare(a, b));
    }

    /// Removes a chat; returns it if it was owned by this buddy
    ///
    /// Searches already running keep their own reference to the chat.
    pub fn delete_chat(&mut self, id: ChatId) -> Option<Arc<Chat>> {
        let index = self.position(id)?;
        Some(self.chats.remove(index))
    }

    pub fn case_insensitive_cmp(&self, other: &Buddy) -> CmpOrdering {
        cmp_ignore_case(&self.name, &other.name)
    }
}

/// Compares two names by their lowercase characters
pub fn cmp_ignore_case(a: &str, b: &str) -> CmpOrdering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}
