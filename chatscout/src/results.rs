/// This module implements search result types, demonstrating how Rust's ownership
/// system expresses a result that points back into a corpus without owning it.
///
/// # Rust Ownership vs .NET References
///
/// A .NET result would hold plain object references to the buddy and chat:
/// ```csharp
/// public class SearchResult {
///     public Buddy Buddy { get; set; }   // Keeps the buddy alive, may form cycles
///     public Chat Chat { get; set; }
/// }
/// ```
///
/// Here a result names its buddy by identifier and row, and shares the chat
/// through an `Arc`:
/// ```rust,ignore
/// pub struct SearchResult {
///     pub buddy: BuddyId,        // Non-owning, no cycle
///     pub chat: Arc<Chat>,       // Shared with the corpus and the snapshot
/// }
/// ```
///
/// A chat deleted from the corpus after the scan is still readable through the
/// result; callers that only want live chats compare ids against the corpus when
/// they render.
use std::sync::Arc;

use crate::corpus::{BuddyId, Chat};
use crate::pattern::MatchSpan;
use crate::search::session::Generation;

/// A chat in which the pattern matched
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Row of the buddy in the corpus when the search started
    pub buddy_index: usize,
    pub buddy: BuddyId,
    pub buddy_name: Arc<str>,
    /// Position of the chat within its buddy when the search started
    pub chat_index: usize,
    pub chat: Arc<Chat>,
    /// Matches in the chat, in text order
    pub matches: Vec<MatchSpan>,
}

/// The ordered outcome of one search
///
/// Results are in corpus order: buddy order first, then chat order within the
/// buddy.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub generation: Generation,
    pub results: Vec<SearchResult>,
    /// Total number of matches found
    pub total_matches: usize,
    /// Chats read and matched, whether or not they matched
    pub chats_searched: usize,
    pub chats_with_matches: usize,
    /// Chats that could not be read
    pub chats_skipped: usize,
    pub buddies_searched: usize,
}

impl ResultSet {
    pub fn new(generation: Generation) -> Self {
        Self {
            generation,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Appends the result for the next chat in corpus order
    pub fn add_result(&mut self, result: SearchResult) {
        self.total_matches += result.matches.len();
        self.chats_with_matches += 1;
        self.results.push(result);
    }

    /// Results grouped by buddy, in buddy order
    pub fn by_buddy(&self) -> Vec<(&str, &[SearchResult])> {
        let mut groups = Vec::new();
        let mut start = 0;
        for i in 1..=self.results.len() {
            if i == self.results.len() || self.results[i].buddy != self.results[start].buddy {
                groups.push((&*self.results[start].buddy_name, &self.results[start..i]));
                start = i;
            }
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Buddy;

    fn result(buddy: &mut Buddy, index: usize, chat_index: usize, matches: usize) -> SearchResult {
        let chat = buddy.add_chat(format!("{}-{}", buddy.name(), chat_index), "text");
        SearchResult {
            buddy_index: index,
            buddy: buddy.id(),
            buddy_name: Arc::from(buddy.name()),
            chat_index,
            chat,
            matches: (0..matches)
                .map(|i| MatchSpan {
                    range: i..i + 1,
                    groups: vec![],
                })
                .collect(),
        }
    }

    #[test]
    fn test_result_set_new() {
        let set = ResultSet::new(Generation::default());
        assert!(set.is_empty());
        assert_eq!(set.total_matches, 0);
        assert_eq!(set.chats_with_matches, 0);
        assert!(set.by_buddy().is_empty());
    }

    #[test]
    fn test_add_result_counts() {
        let mut alice = Buddy::new("alice");
        let mut set = ResultSet::new(Generation::default());
        set.add_result(result(&mut alice, 0, 0, 2));
        set.add_result(result(&mut alice, 0, 1, 1));

        assert_eq!(set.len(), 2);
        assert_eq!(set.total_matches, 3);
        assert_eq!(set.chats_with_matches, 2);
    }

    #[test]
    fn test_by_buddy_groups_consecutive_results() {
        let mut alice = Buddy::new("alice");
        let mut bob = Buddy::new("bob");
        let mut set = ResultSet::new(Generation::default());
        set.add_result(result(&mut alice, 0, 0, 1));
        set.add_result(result(&mut alice, 0, 2, 1));
        set.add_result(result(&mut bob, 1, 0, 1));

        let groups = set.by_buddy();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "alice");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[0].1[1].chat_index, 2);
        assert_eq!(groups[1].0, "bob");
        assert_eq!(groups[1].1.len(), 1);
    }
}
