use memmap2::Mmap;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{trace, warn};

use crate::config::{EncodingMode, MatchMode};
use crate::corpus::{Chat, ChatSource};
use crate::errors::{Result, SearchError};
use crate::metrics::ScanMetrics;
use crate::pattern::{CompiledPattern, MatchSpan};

// Constants for transcript reading
const BUFFER_CAPACITY: usize = 65536;
pub(crate) const SMALL_FILE_THRESHOLD: u64 = 32 * 1024; // 32KB
pub(crate) const LARGE_FILE_THRESHOLD: u64 = 10 * 1024 * 1024; // 10MB

/// Decodes transcript bytes according to the encoding mode
fn decode_bytes(bytes: &[u8], path: &Path, encoding_mode: EncodingMode) -> Result<String> {
    match encoding_mode {
        EncodingMode::FailFast => String::from_utf8(bytes.to_vec())
            .map_err(|e| SearchError::encoding_error(path, e)),
        EncodingMode::Lossy => {
            let cow = String::from_utf8_lossy(bytes);
            // Owned means at least one invalid sequence was replaced
            if let Cow::Owned(_) = cow {
                warn!("Invalid UTF-8 replaced in transcript: {}", path.display());
            }
            Ok(cow.into_owned())
        }
    }
}

/// Loads chat text and runs the pattern over it
#[derive(Debug, Clone)]
pub struct ChatProcessor {
    pattern: CompiledPattern,
    match_mode: MatchMode,
    encoding_mode: EncodingMode,
    metrics: ScanMetrics,
}

impl ChatProcessor {
    pub fn new(
        pattern: CompiledPattern,
        match_mode: MatchMode,
        encoding_mode: EncodingMode,
        metrics: ScanMetrics,
    ) -> Self {
        Self {
            pattern,
            match_mode,
            encoding_mode,
            metrics,
        }
    }

    pub fn pattern(&self) -> &CompiledPattern {
        &self.pattern
    }

    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    /// Matches one chat
    ///
    /// Returns `Ok(None)` when the pattern does not occur, and an error when the
    /// transcript cannot be read.
    pub fn process_chat(&self, chat: &Chat) -> Result<Option<Vec<MatchSpan>>> {
        trace!("Processing chat: {}", chat.source_id());

        let text = self.load_text(chat)?;
        self.metrics.record_chat_scanned(text.len() as u64);

        let matches: Vec<MatchSpan> = match self.match_mode {
            MatchMode::First => self
                .pattern
                .find_first(&text)
                .map(|m| m.span())
                .into_iter()
                .collect(),
            MatchMode::All => self.pattern.find_iter(&text).map(|m| m.span()).collect(),
        };

        if matches.is_empty() {
            Ok(None)
        } else {
            Ok(Some(matches))
        }
    }

    /// Reads the full text of a chat
    pub fn load_text<'c>(&self, chat: &'c Chat) -> Result<Cow<'c, str>> {
        match chat.source() {
            ChatSource::Inline { text, .. } => Ok(Cow::Borrowed(&**text)),
            ChatSource::File(path) => self.read_file(path).map(Cow::Owned),
            ChatSource::External(source) => source.read_text().map(Cow::Owned),
        }
    }

    /// Reads a transcript file, choosing a strategy by size
    fn read_file(&self, path: &Path) -> Result<String> {
        match path.metadata() {
            Ok(metadata) => {
                let size = metadata.len();
                self.metrics.record_file_read(size);

                if size < SMALL_FILE_THRESHOLD {
                    self.read_small_file(path)
                } else if size >= LARGE_FILE_THRESHOLD {
                    self.read_mmap_file(path)
                } else {
                    self.read_file_buffered(path)
                }
            }
            Err(e) => Err(SearchError::from_io(path, e)),
        }
    }

    fn read_small_file(&self, path: &Path) -> Result<String> {
        trace!("Using simple read for: {}", path.display());
        let bytes = std::fs::read(path).map_err(|e| SearchError::from_io(path, e))?;
        decode_bytes(&bytes, path, self.encoding_mode)
    }

    fn read_file_buffered(&self, path: &Path) -> Result<String> {
        let file = File::open(path).map_err(|e| SearchError::from_io(path, e))?;
        let mut reader = BufReader::with_capacity(BUFFER_CAPACITY, file);
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| SearchError::from_io(path, e))?;
        decode_bytes(&bytes, path, self.encoding_mode)
    }

    fn read_mmap_file(&self, path: &Path) -> Result<String> {
        let file = File::open(path).map_err(|e| SearchError::from_io(path, e))?;
        // SAFETY: the map is read-only and dropped before this function returns
        let mmap = unsafe { Mmap::map(&file) }.map_err(SearchError::IoError)?;
        decode_bytes(&mmap, path, self.encoding_mode)
    }
}
