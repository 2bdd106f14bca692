use parking_lot::Mutex;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::events::{CompletionSummary, Progress, SearchEvent};
use super::processor::ChatProcessor;
use super::session::{Generation, SearchSession};
use crate::config::SearchConfig;
use crate::corpus::{Corpus, CorpusSnapshot};
use crate::errors::{Result, SearchError};
use crate::metrics::ScanMetrics;
use crate::pattern::{CompiledPattern, PatternOptions};
use crate::results::{ResultSet, SearchResult};

/// Runs searches over a corpus on background workers
///
/// Each call to [`SearchEngine::start_search`] creates a new session with the
/// next generation and supersedes the previous one. Workers never touch the
/// corpus; they scan a snapshot taken when the session starts. A worker's
/// results are installed, and its completion event sent, only if its
/// generation is still current at that moment.
pub struct SearchEngine {
    config: SearchConfig,
    metrics: ScanMetrics,
    pool: Arc<ThreadPool>,
    events: Sender<SearchEvent>,
    shared: Arc<EngineShared>,
}

#[derive(Debug, Default)]
struct EngineShared {
    current: AtomicU64,
    published: Mutex<Published>,
}

#[derive(Debug, Default)]
struct Published {
    active: Option<SearchSession>,
    results: Option<Arc<ResultSet>>,
}

impl SearchEngine {
    /// Creates an engine together with the receiving end of its event channel
    pub fn new(config: SearchConfig) -> Result<(Self, Receiver<SearchEvent>)> {
        let (tx, rx) = mpsc::channel();
        Ok((Self::with_events(config, tx)?, rx))
    }

    /// Creates an engine that publishes events into an existing channel
    pub fn with_events(config: SearchConfig, events: Sender<SearchEvent>) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.thread_count.get())
            .thread_name(|i| format!("chatscout-scan-{}", i))
            .build()
            .map_err(|e| SearchError::config_error(format!("Cannot start scan threads: {}", e)))?;

        Ok(Self {
            config,
            metrics: ScanMetrics::new(),
            pool: Arc::new(pool),
            events,
            shared: Arc::new(EngineShared::default()),
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    pub fn current_generation(&self) -> Generation {
        Generation(self.shared.current.load(Ordering::Acquire))
    }

    /// The most recent session, whatever its state
    pub fn active_session(&self) -> Option<SearchSession> {
        self.shared.published.lock().active.clone()
    }

    /// Results of the current session once it has completed
    pub fn results(&self) -> Option<Arc<ResultSet>> {
        self.shared.published.lock().results.clone()
    }

    /// Starts a search with the configured default options
    pub fn search(&self, corpus: &Corpus, term: &str) -> Result<SearchSession> {
        self.start_search(corpus, term, self.config.options)
    }

    /// Compiles `term` and scans a snapshot of `corpus` on a new worker
    ///
    /// Returns as soon as the worker is running. A pattern that does not
    /// compile is reported here and no session is created.
    pub fn start_search(
        &self,
        corpus: &Corpus,
        term: &str,
        options: PatternOptions,
    ) -> Result<SearchSession> {
        let pattern = CompiledPattern::cached(term, options, &self.metrics)?;
        let snapshot = corpus.snapshot();

        let session = {
            let mut published = self.shared.published.lock();
            let generation = Generation(self.shared.current.fetch_add(1, Ordering::AcqRel) + 1);
            if let Some(previous) = published.active.take() {
                debug!(
                    "Search {} superseded by {}",
                    previous.generation(),
                    generation
                );
                previous.supersede();
            }
            published.results = None;

            let session = SearchSession::new(generation, term, options);
            published.active = Some(session.clone());
            session
        };

        let generation = session.generation();
        let total = snapshot.number_of_buddies();
        info!(
            "Starting search {} for {:?} across {} buddies",
            generation, term, total
        );
        let _ = self.events.send(SearchEvent::Progress {
            generation,
            progress: Progress { scanned: 0, total },
        });

        let worker = Worker {
            session: session.clone(),
            shared: Arc::clone(&self.shared),
            processor: ChatProcessor::new(
                pattern,
                self.config.match_mode,
                self.config.encoding_mode,
                self.metrics.clone(),
            ),
            pool: Arc::clone(&self.pool),
            events: self.events.clone(),
            snapshot,
        };

        let handle = thread::Builder::new()
            .name(format!("chatscout-search-{}", generation.0))
            .spawn(move || worker.run());
        match handle {
            Ok(handle) => session.attach_worker(handle),
            Err(e) => {
                session.supersede();
                return Err(SearchError::IoError(e));
            }
        }

        Ok(session)
    }

    /// Cancels the current session, if any
    pub fn cancel(&self) {
        if let Some(session) = self.shared.published.lock().active.as_ref() {
            session.cancel();
        }
    }
}

impl Drop for SearchEngine {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct Worker {
    session: SearchSession,
    shared: Arc<EngineShared>,
    processor: ChatProcessor,
    pool: Arc<ThreadPool>,
    events: Sender<SearchEvent>,
    snapshot: CorpusSnapshot,
}

impl Worker {
    fn run(self) {
        let started = Instant::now();
        let generation = self.session.generation();

        let is_stale = || {
            self.session.is_superseded()
                || self.shared.current.load(Ordering::Acquire) != generation.0
        };

        let scanned = scan_snapshot(
            &self.snapshot,
            &self.processor,
            Some(&*self.pool),
            generation,
            &is_stale,
            |progress| {
                let _ = self.events.send(SearchEvent::Progress {
                    generation,
                    progress,
                });
            },
        );

        let Some(results) = scanned else {
            debug!("Search {} stopped early", generation);
            return;
        };

        let results = Arc::new(results);
        let mut published = self.shared.published.lock();
        if self.shared.current.load(Ordering::Acquire) != generation.0 || !self.session.complete() {
            debug!("Discarding results of superseded search {}", generation);
            return;
        }

        published.results = Some(Arc::clone(&results));
        let summary = CompletionSummary {
            skipped: results.chats_skipped,
            elapsed: started.elapsed(),
            results: Arc::clone(&results),
        };
        let _ = self.events.send(SearchEvent::Completed {
            generation,
            summary,
        });
        drop(published);

        info!(
            "Search {} complete. Found {} matches in {} chats ({} skipped)",
            generation, results.total_matches, results.chats_with_matches, results.chats_skipped
        );
        self.processor.metrics().log_stats();
    }
}

/// Searches `corpus` on the calling thread and returns the ordered results
///
/// Chats of each buddy are matched on the global rayon pool.
pub fn search(
    corpus: &Corpus,
    term: &str,
    options: PatternOptions,
    config: &SearchConfig,
) -> Result<ResultSet> {
    let metrics = ScanMetrics::new();
    let pattern = CompiledPattern::cached(term, options, &metrics)?;
    let processor = ChatProcessor::new(pattern, config.match_mode, config.encoding_mode, metrics);
    let snapshot = corpus.snapshot();

    let results = scan_snapshot(
        &snapshot,
        &processor,
        None,
        Generation::default(),
        &|| false,
        |_| {},
    )
    .unwrap_or_default();

    info!(
        "Search complete. Found {} matches in {} chats",
        results.total_matches, results.chats_with_matches
    );
    Ok(results)
}

/// Walks the snapshot in corpus order
///
/// Returns `None` as soon as `is_stale` reports the session is no longer
/// wanted. The chats of one buddy are matched in parallel; the ordered collect
/// keeps them in chat order.
fn scan_snapshot<S, P>(
    snapshot: &CorpusSnapshot,
    processor: &ChatProcessor,
    pool: Option<&ThreadPool>,
    generation: Generation,
    is_stale: &S,
    mut on_progress: P,
) -> Option<ResultSet>
where
    S: Fn() -> bool + Sync,
    P: FnMut(Progress),
{
    let mut accumulator = ResultSet::new(generation);
    let total = snapshot.number_of_buddies();

    if processor.pattern().as_str().is_empty() {
        debug!("Empty search term, returning empty result");
        on_progress(Progress {
            scanned: total,
            total,
        });
        return Some(accumulator);
    }

    for (scanned, buddy) in snapshot.buddies.iter().enumerate() {
        if is_stale() {
            return None;
        }

        let match_chats = || {
            buddy
                .chats
                .par_iter()
                .map(|chat| {
                    if is_stale() {
                        None
                    } else {
                        Some(processor.process_chat(chat))
                    }
                })
                .collect::<Vec<_>>()
        };
        let outcomes = match pool {
            Some(pool) => pool.install(match_chats),
            None => match_chats(),
        };

        for (chat_index, (chat, outcome)) in buddy.chats.iter().zip(outcomes).enumerate() {
            match outcome {
                None => return None,
                Some(Ok(Some(matches))) => {
                    accumulator.chats_searched += 1;
                    accumulator.add_result(SearchResult {
                        buddy_index: buddy.index,
                        buddy: buddy.id,
                        buddy_name: Arc::clone(&buddy.name),
                        chat_index,
                        chat: Arc::clone(chat),
                        matches,
                    });
                }
                Some(Ok(None)) => accumulator.chats_searched += 1,
                Some(Err(e)) => {
                    warn!("Skipping chat {}: {}", chat.source_id(), e);
                    processor.metrics().record_chat_skipped();
                    accumulator.chats_skipped += 1;
                }
            }
        }

        accumulator.buddies_searched += 1;
        debug!(
            "Search {} scanned {} ({}/{})",
            generation,
            buddy.name,
            scanned + 1,
            total
        );
        on_progress(Progress {
            scanned: scanned + 1,
            total,
        });
    }

    Some(accumulator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;

    fn config() -> SearchConfig {
        SearchConfig {
            thread_count: NonZeroUsize::new(2).unwrap(),
            ..SearchConfig::default()
        }
    }

    fn corpus() -> Corpus {
        let mut corpus = Corpus::new();
        let alice = corpus.add_buddy("Alice");
        alice.add_chat("a0", "hello world");
        alice.add_chat("a1", "bye");
        corpus.add_buddy("Bob").add_chat("b0", "WORLD peace");
        corpus
    }

    #[test]
    fn test_search_sync_orders_by_corpus() {
        let results = search(
            &corpus(),
            "world",
            PatternOptions::case_insensitive(),
            &config(),
        )
        .unwrap();

        let order: Vec<_> = results
            .results
            .iter()
            .map(|r| (&*r.buddy_name, r.chat_index))
            .collect();
        assert_eq!(order, vec![("Alice", 0), ("Bob", 0)]);
        assert_eq!(results.chats_searched, 3);
        assert_eq!(results.buddies_searched, 2);
    }

    #[test]
    fn test_search_sync_compile_error() {
        let err = search(&corpus(), "(", PatternOptions::default(), &config()).unwrap_err();
        assert!(matches!(err, SearchError::PatternCompile { .. }));
    }

    #[test]
    fn test_empty_term_has_no_results() {
        let results = search(&corpus(), "", PatternOptions::default(), &config()).unwrap();
        assert!(results.is_empty());
        assert_eq!(results.chats_searched, 0);
    }

    #[test]
    fn test_scan_stops_when_stale() {
        let snapshot = corpus().snapshot();
        let processor = ChatProcessor::new(
            CompiledPattern::new("world", PatternOptions::default()).unwrap(),
            config().match_mode,
            config().encoding_mode,
            ScanMetrics::new(),
        );
        let mut progress = Vec::new();
        let outcome = scan_snapshot(
            &snapshot,
            &processor,
            None,
            Generation(1),
            &|| true,
            |p| progress.push(p),
        );
        assert!(outcome.is_none());
        assert!(progress.is_empty());
    }

    #[test]
    fn test_scan_reports_progress_per_buddy() {
        let snapshot = corpus().snapshot();
        let processor = ChatProcessor::new(
            CompiledPattern::new("world", PatternOptions::default()).unwrap(),
            config().match_mode,
            config().encoding_mode,
            ScanMetrics::new(),
        );
        let mut progress = Vec::new();
        let outcome = scan_snapshot(
            &snapshot,
            &processor,
            None,
            Generation(1),
            &|| false,
            |p| progress.push(p),
        )
        .unwrap();

        assert_eq!(outcome.len(), 1);
        assert_eq!(
            progress,
            vec![
                Progress {
                    scanned: 1,
                    total: 2
                },
                Progress {
                    scanned: 2,
                    total: 2
                }
            ]
        );
    }

    #[test]
    fn test_empty_term_reports_final_progress() {
        let snapshot = corpus().snapshot();
        let processor = ChatProcessor::new(
            CompiledPattern::new("", PatternOptions::default()).unwrap(),
            config().match_mode,
            config().encoding_mode,
            ScanMetrics::new(),
        );
        let mut progress = Vec::new();
        let outcome = scan_snapshot(
            &snapshot,
            &processor,
            None,
            Generation(1),
            &|| false,
            |p| progress.push(p),
        )
        .unwrap();

        assert!(outcome.is_empty());
        assert_eq!(
            progress,
            vec![Progress {
                scanned: 2,
                total: 2
            }]
        );
    }
}
