pub mod config;
pub mod corpus;
pub mod errors;
pub mod metrics;
pub mod pattern;
pub mod results;
pub mod search;

pub use config::{CliOverrides, EncodingMode, MatchMode, SearchConfig};
pub use corpus::{archive::load_archive, Buddy, BuddyId, Chat, ChatId, Corpus, TranscriptSource};
pub use errors::{Result, SearchError};
pub use metrics::ScanMetrics;
pub use pattern::{compile, CompiledPattern, Match, MatchSpan, PatternOptions};
pub use results::{ResultSet, SearchResult};
pub use search::{search, Generation, SearchEngine, SearchEvent, SearchSession, SessionStatus};
