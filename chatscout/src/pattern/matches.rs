use serde::Serialize;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use crate::errors::{Result, SearchError};

/// A successful match of a compiled pattern against a string
///
/// Group 0 is the overall match. Groups that did not participate in the
/// match are kept as `None` so they can be told apart from groups that
/// matched the empty string.
#[derive(Debug, Clone)]
pub struct Match<'t> {
    text: &'t str,
    groups: Vec<Option<Range<usize>>>,
    names: Arc<HashMap<String, usize>>,
}

/// One capture group of a [`Match`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group<'t> {
    index: usize,
    range: Option<Range<usize>>,
    text: &'t str,
}

impl<'t> Group<'t> {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether the group took part in the match
    pub fn participated(&self) -> bool {
        self.range.is_some()
    }

    /// Byte range of the group; `0..0` when the group did not participate
    pub fn range(&self) -> Range<usize> {
        self.range.clone().unwrap_or(0..0)
    }

    pub fn as_str(&self) -> &'t str {
        match &self.range {
            Some(range) => &self.text[range.clone()],
            None => "",
        }
    }
}

impl<'t> Match<'t> {
    pub(crate) fn new(
        text: &'t str,
        groups: Vec<Option<Range<usize>>>,
        names: Arc<HashMap<String, usize>>,
    ) -> Self {
        Self {
            text,
            groups,
            names,
        }
    }

    /// Number of groups including the overall match
    pub fn count(&self) -> usize {
        self.groups.len()
    }

    pub fn range(&self) -> Range<usize> {
        self.groups
            .first()
            .cloned()
            .flatten()
            .unwrap_or(0..0)
    }

    pub fn start(&self) -> usize {
        self.range().start
    }

    pub fn end(&self) -> usize {
        self.range().end
    }

    pub fn is_empty(&self) -> bool {
        self.range().is_empty()
    }

    /// The matched text
    pub fn as_str(&self) -> &'t str {
        &self.text[self.range()]
    }

    /// The string the match was found in
    pub fn text(&self) -> &'t str {
        self.text
    }

    /// Looks up a group by index; 0 is the whole match
    pub fn group(&self, index: usize) -> Result<Group<'t>> {
        let range = self
            .groups
            .get(index)
            .ok_or_else(|| SearchError::no_such_group(index))?;
        Ok(Group {
            index,
            range: range.clone(),
            text: self.text,
        })
    }

    /// Looks up a group by name, reporting participation through [`Group::participated`]
    pub fn named(&self, name: &str) -> Result<Group<'t>> {
        let index = *self
            .names
            .get(name)
            .ok_or_else(|| SearchError::no_such_group(name))?;
        self.group(index)
    }

    /// Text of a named group
    ///
    /// Fails with `NoSuchGroup` when the pattern has no group of that name or
    /// the group did not participate in this match.
    pub fn group_named(&self, name: &str) -> Result<&'t str> {
        let group = self.named(name)?;
        if !group.participated() {
            return Err(SearchError::no_such_group(name));
        }
        Ok(group.as_str())
    }

    /// Detaches the match from its source text
    pub fn span(&self) -> MatchSpan {
        MatchSpan {
            range: self.range(),
            groups: self.groups.iter().skip(1).cloned().collect(),
        }
    }
}

/// Owned byte ranges of a match, stored in search results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchSpan {
    pub range: Range<usize>,
    /// Capture groups 1..n; `None` for groups that did not participate
    pub groups: Vec<Option<Range<usize>>>,
}

impl MatchSpan {
    pub fn start(&self) -> usize {
        self.range.start
    }

    pub fn end(&self) -> usize {
        self.range.end
    }

    /// Slices the matched text out of the transcript it was found in
    pub fn text<'a>(&self, content: &'a str) -> Option<&'a str> {
        content.get(self.range.clone())
    }
}
