/// In-memory model of a transcript archive: the corpus owns buddies in order,
/// each buddy owns its chats in order.
///
/// Searches never read the corpus directly. They take a [`CorpusSnapshot`] when
/// they start, which holds shared references to every chat, so the owner can
/// keep sorting buddies and deleting chats while a scan is in flight.
pub mod archive;
pub mod buddy;
pub mod chat;

use std::sync::Arc;

pub use buddy::{cmp_ignore_case, Buddy, BuddyId};
pub use chat::{Chat, ChatId, ChatSource, TranscriptSource};

/// The root of the archive
#[derive(Debug, Default)]
pub struct Corpus {
    buddies: Vec<Buddy>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the buddy with this name, creating it at the end if unseen
    pub fn add_buddy(&mut self, name: &str) -> &mut Buddy {
        let index = match self.buddies.iter().position(|b| b.name() == name) {
            Some(index) => index,
            None => {
                self.buddies.push(Buddy::new(name));
                self.buddies.len() - 1
            }
        };
        &mut self.buddies[index]
    }

    pub fn buddies(&self) -> &[Buddy] {
        &self.buddies
    }

    pub fn number_of_buddies(&self) -> usize {
        self.buddies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buddies.is_empty()
    }

    pub fn buddy_for_row(&self, row: usize) -> Option<&Buddy> {
        self.buddies.get(row)
    }

    pub fn buddy(&self, id: BuddyId) -> Option<&Buddy> {
        self.buddies.iter().find(|b| b.id() == id)
    }

    pub fn buddy_mut(&mut self, id: BuddyId) -> Option<&mut Buddy> {
        self.buddies.iter_mut().find(|b| b.id() == id)
    }

    pub fn buddy_named(&self, name: &str) -> Option<&Buddy> {
        self.buddies.iter().find(|b| b.name() == name)
    }

    pub fn number_of_chats_for_buddy(&self, row: usize) -> usize {
        self.buddies.get(row).map_or(0, Buddy::number_of_chats)
    }

    pub fn chat_at(&self, chat_index: usize, buddy_row: usize) -> Option<&Arc<Chat>> {
        self.buddies.get(buddy_row)?.chat_at(chat_index)
    }

    pub fn total_chats(&self) -> usize {
        self.buddies.iter().map(Buddy::number_of_chats).sum()
    }

    /// Orders buddies by case-insensitive name; equal names keep their order
    pub fn sort(&mut self) {
        self.buddies.sort_by(|a, b| a.case_insensitive_cmp(b));
    }

    /// Deletes a chat from its owner; the buddy stays even when emptied
    pub fn delete_chat(&mut self, chat: &Chat) -> Option<Arc<Chat>> {
        self.buddy_mut(chat.buddy())?.delete_chat(chat.id())
    }

    pub fn remove_buddy(&mut self, id: BuddyId) -> Option<Buddy> {
        let index = self.buddies.iter().position(|b| b.id() == id)?;
        Some(self.buddies.remove(index))
    }

    /// Drops buddies that no longer own any chat; returns how many were removed
    pub fn prune_empty(&mut self) -> usize {
        let before = self.buddies.len();
        self.buddies.retain(|b| !b.is_empty());
        before - self.buddies.len()
    }

    /// Captures the current buddy and chat order for a scan
    pub fn snapshot(&self) -> CorpusSnapshot {
        let buddies = self
            .buddies
            .iter()
            .enumerate()
            .map(|(index, buddy)| BuddySnapshot {
                index,
                id: buddy.id(),
                name: Arc::from(buddy.name()),
                chats: buddy.chats().to_vec(),
            })
            .collect();
        CorpusSnapshot { buddies }
    }
}

/// One buddy as it was when a snapshot was taken
#[derive(Debug, Clone)]
pub struct BuddySnapshot {
    /// Row of the buddy in the corpus at snapshot time
    pub index: usize,
    pub id: BuddyId,
    pub name: Arc<str>,
    pub chats: Vec<Arc<Chat>>,
}

/// Frozen, shareable view of a corpus
#[derive(Debug, Clone, Default)]
pub struct CorpusSnapshot {
    pub buddies: Vec<BuddySnapshot>,
}

impl CorpusSnapshot {
    pub fn number_of_buddies(&self) -> usize {
        self.buddies.len()
    }

    pub fn total_chats(&self) -> usize {
        self.buddies.iter().map(|b| b.chats.len()).sum()
    }
}
