use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use tracing::trace;

use super::matches::Match;
use super::options::PatternOptions;
use crate::errors::{Result, SearchError};
use crate::metrics::ScanMetrics;

/// Most compiled patterns kept by the process-wide cache
pub const PATTERN_CACHE_CAPACITY: usize = 256;

static PATTERN_CACHE: Lazy<PatternCache> = Lazy::new(|| PatternCache::new(PATTERN_CACHE_CAPACITY));

static GROUP_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\$|\$\{([^}]*)\}|\$([0-9A-Za-z_]+)").expect("group reference pattern is valid")
});

/// Compiles `pattern` with the given option flags
pub fn compile(pattern: &str, options: PatternOptions) -> Result<CompiledPattern> {
    CompiledPattern::new(pattern, options)
}

/// Compiled patterns keyed by source text and flags, holding at most `capacity` entries
///
/// When full, an arbitrary entry is evicted to make room. Search terms are
/// user input, so the set of distinct keys is unbounded.
pub struct PatternCache {
    entries: DashMap<(String, PatternOptions), CompiledPattern>,
    capacity: usize,
}

impl PatternCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn get_or_compile(
        &self,
        pattern: &str,
        options: PatternOptions,
        metrics: &ScanMetrics,
    ) -> Result<CompiledPattern> {
        let key = (pattern.to_string(), options);
        if let Some(entry) = self.entries.get(&key) {
            metrics.record_cache_operation(true);
            return Ok(entry.clone());
        }

        let compiled = CompiledPattern::new(pattern, options)?;
        metrics.record_cache_operation(false);
        self.make_room();
        self.entries.insert(key, compiled.clone());
        Ok(compiled)
    }

    fn make_room(&self) {
        while self.entries.len() >= self.capacity {
            // The shard guard must be released before `remove` takes the write lock
            let victim = self.entries.iter().next().map(|entry| entry.key().clone());
            match victim {
                Some(key) => {
                    trace!("Evicting cached pattern '{}'", key.0);
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A compiled, immutable pattern that can be matched against any number of strings
///
/// Cloning is cheap; clones share the compiled program.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    source: Arc<str>,
    options: PatternOptions,
    regex: Regex,
    names: Arc<HashMap<String, usize>>,
}

impl CompiledPattern {
    pub fn new(pattern: &str, options: PatternOptions) -> Result<Self> {
        let regex = options
            .builder(pattern)
            .build()
            .map_err(|e| compile_error(pattern, options, e))?;

        let names = regex
            .capture_names()
            .enumerate()
            .filter_map(|(index, name)| name.map(|name| (name.to_string(), index)))
            .collect();

        Ok(Self {
            source: Arc::from(pattern),
            options,
            regex,
            names: Arc::new(names),
        })
    }

    /// Compiles through the process-wide pattern cache
    pub fn cached(pattern: &str, options: PatternOptions, metrics: &ScanMetrics) -> Result<Self> {
        PATTERN_CACHE.get_or_compile(pattern, options, metrics)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn options(&self) -> PatternOptions {
        self.options
    }

    /// Number of capture groups including the implicit whole-match group
    pub fn capture_count(&self) -> usize {
        self.regex.captures_len()
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.regex.capture_names().flatten()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Leftmost match in `text`
    pub fn find_first<'t>(&self, text: &'t str) -> Option<Match<'t>> {
        self.find_first_in(text, 0..text.len())
    }

    /// Leftmost match inside `range`
    pub fn find_first_in<'t>(&self, text: &'t str, range: Range<usize>) -> Option<Match<'t>> {
        self.find_iter_in(text, range).next()
    }

    pub fn find_all<'t>(&self, text: &'t str) -> Vec<Match<'t>> {
        self.find_iter(text).collect()
    }

    pub fn find_all_in<'t>(&self, text: &'t str, range: Range<usize>) -> Vec<Match<'t>> {
        self.find_iter_in(text, range).collect()
    }

    pub fn find_iter<'p, 't>(&'p self, text: &'t str) -> Matches<'p, 't> {
        self.find_iter_in(text, 0..text.len())
    }

    /// Successive non-overlapping matches inside `range`, left to right
    ///
    /// An invalid range (reversed, out of bounds, or splitting a character)
    /// produces no matches.
    pub fn find_iter_in<'p, 't>(&'p self, text: &'t str, range: Range<usize>) -> Matches<'p, 't> {
        Matches {
            walk: CaptureWalk::new(&self.regex, text, range),
            pattern: self,
        }
    }

    /// Replaces the first `limit` matches (all when `None`)
    ///
    /// `$1`, `${1}`, `${name}` in `replacement` expand to the corresponding group
    /// of each match; `$$` is a literal dollar.
    pub fn replace(&self, text: &str, replacement: &str, limit: Option<usize>) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        let walk = CaptureWalk::new(&self.regex, text, 0..text.len());
        for caps in walk.take(limit.unwrap_or(usize::MAX)) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&text[last..whole.start()]);
            caps.expand(replacement, &mut out);
            last = whole.end();
        }
        out.push_str(&text[last..]);
        out
    }

    pub fn replace_all(&self, text: &str, replacement: &str) -> String {
        self.replace(text, replacement, None)
    }

    /// Cuts `text` at the first `limit` matches (all when `None`)
    ///
    /// The delimiters are dropped; joining the segments with the delimiters
    /// returned by `find_iter(text).take(limit)` rebuilds `text`.
    pub fn split<'t>(&self, text: &'t str, limit: Option<usize>) -> Vec<&'t str> {
        let mut segments = Vec::new();
        let mut last = 0;
        for m in self.find_iter(text).take(limit.unwrap_or(usize::MAX)) {
            segments.push(&text[last..m.start()]);
            last = m.end();
        }
        segments.push(&text[last..]);
        segments
    }

    /// Verifies every group referenced by `replacement` exists in this pattern
    pub fn check_replacement(&self, replacement: &str) -> Result<()> {
        for cap in GROUP_REFERENCE.captures_iter(replacement) {
            let Some(reference) = cap.get(1).or_else(|| cap.get(2)) else {
                continue;
            };
            let reference = reference.as_str();
            let known = match reference.parse::<usize>() {
                Ok(index) => index < self.capture_count(),
                Err(_) => self.names.contains_key(reference),
            };
            if !known {
                return Err(SearchError::no_such_group(reference));
            }
        }
        Ok(())
    }

    fn to_match<'t>(&self, text: &'t str, caps: &Captures<'t>) -> Match<'t> {
        let groups = (0..caps.len())
            .map(|i| caps.get(i).map(|m| m.range()))
            .collect();
        Match::new(text, groups, Arc::clone(&self.names))
    }
}

/// Iterator over the matches of a [`CompiledPattern`]
#[derive(Debug)]
pub struct Matches<'p, 't> {
    walk: CaptureWalk<'p, 't>,
    pattern: &'p CompiledPattern,
}

impl<'p, 't> Iterator for Matches<'p, 't> {
    type Item = Match<'t>;

    fn next(&mut self) -> Option<Match<'t>> {
        let caps = self.walk.next()?;
        Some(self.pattern.to_match(self.walk.text, &caps))
    }
}

/// Drives the regex forward one match at a time
///
/// Each search starts where the previous match ended. After a zero-length
/// match the position moves one character further so the walk always
/// terminates and start offsets strictly increase.
#[derive(Debug)]
struct CaptureWalk<'p, 't> {
    regex: &'p Regex,
    text: &'t str,
    end: usize,
    pos: usize,
    done: bool,
}

impl<'p, 't> CaptureWalk<'p, 't> {
    fn new(regex: &'p Regex, text: &'t str, range: Range<usize>) -> Self {
        let valid = range.start <= range.end
            && range.end <= text.len()
            && text.is_char_boundary(range.start)
            && text.is_char_boundary(range.end);
        if !valid {
            trace!("Ignoring invalid search range {:?}", range);
        }
        Self {
            regex,
            text,
            end: range.end,
            pos: range.start,
            done: !valid,
        }
    }
}

impl<'p, 't> Iterator for CaptureWalk<'p, 't> {
    type Item = Captures<'t>;

    fn next(&mut self) -> Option<Captures<'t>> {
        if self.done || self.pos > self.end {
            return None;
        }

        let text = self.text;
        let haystack = &text[..self.end];
        let Some(caps) = self.regex.captures_at(haystack, self.pos) else {
            self.done = true;
            return None;
        };
        let whole = caps.get(0)?;

        if whole.is_empty() {
            match haystack[whole.end()..].chars().next() {
                Some(c) => self.pos = whole.end() + c.len_utf8(),
                None => self.done = true,
            }
        } else {
            self.pos = whole.end();
        }
        Some(caps)
    }
}

fn compile_error(pattern: &str, options: PatternOptions, err: regex::Error) -> SearchError {
    match locate_syntax_error(pattern, options) {
        Some((offset, message)) => SearchError::invalid_pattern(pattern, Some(offset), message),
        None => SearchError::invalid_pattern(pattern, None, err.to_string()),
    }
}

fn locate_syntax_error(pattern: &str, options: PatternOptions) -> Option<(usize, String)> {
    let err = regex_syntax::ParserBuilder::new()
        .case_insensitive(options.case_insensitive)
        .dot_matches_new_line(options.dot_all)
        .ignore_whitespace(options.extended)
        .swap_greed(options.lazy)
        .multi_line(options.multiline)
        .build()
        .parse(pattern)
        .err()?;

    match err {
        regex_syntax::Error::Parse(e) => Some((e.span().start.offset, e.kind().to_string())),
        regex_syntax::Error::Translate(e) => Some((e.span().start.offset, e.kind().to_string())),
        _ => None,
    }
}
