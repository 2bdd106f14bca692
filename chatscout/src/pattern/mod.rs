/// Pattern matching used by the search engine and by anything that needs to
/// highlight, rewrite or cut transcript text.
///
/// A pattern is compiled once together with its [`PatternOptions`] and can then
/// be matched against any number of strings from any number of threads:
///
/// ```rust
/// use chatscout::pattern::{compile, PatternOptions};
///
/// let pattern = compile(r"(?P<word>w\w+)", PatternOptions::case_insensitive()).unwrap();
/// let m = pattern.find_first("Hello World").unwrap();
/// assert_eq!(m.group_named("word").unwrap(), "World");
/// assert_eq!(pattern.replace("Wide world", "<$word>", None), "<Wide> <world>");
/// assert_eq!(pattern.split("a world b", None), vec!["a ", " b"]);
/// ```
pub mod compiled;
pub mod matches;
pub mod options;

pub use compiled::{compile, CompiledPattern, Matches, PatternCache, PATTERN_CACHE_CAPACITY};
pub use matches::{Group, Match, MatchSpan};
pub use options::PatternOptions;
