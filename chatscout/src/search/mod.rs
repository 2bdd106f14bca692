/// This module implements background searching over a transcript corpus,
/// demonstrating how Rust threads, Rayon and atomics replace the cancellation
/// tokens and dispatchers a .NET implementation would use.
///
/// # .NET vs Rust Background Work
///
/// In .NET, a restartable search is usually a `Task` with a cancellation token:
/// ```csharp
/// _cts?.Cancel();
/// _cts = new CancellationTokenSource();
/// var results = await Task.Run(() => Search(corpus, term, _cts.Token));
/// Dispatcher.Invoke(() => Show(results));
/// ```
///
/// In Rust, each search is a [`SearchSession`] scanning an immutable snapshot on
/// its own thread. Starting a new session bumps a generation counter; the old
/// worker sees it and stops:
/// ```rust,ignore
/// let (engine, events) = SearchEngine::new(config)?;
/// let session = engine.start_search(&corpus, "world", PatternOptions::case_insensitive())?;
/// for event in events {
///     if let SearchEvent::Completed { summary, .. } = event {
///         // summary.results is in corpus order
///     }
/// }
/// ```
///
/// # Ordering
///
/// Buddies are scanned one after another and the chats of each buddy are matched
/// on a Rayon pool. The ordered `collect` keeps chat order, so a result set is
/// always in corpus order regardless of how many threads did the work:
/// ```rust,ignore
/// let outcomes: Vec<_> = pool.install(|| {
///     buddy.chats.par_iter().map(|chat| processor.process_chat(chat)).collect()
/// });
/// ```
///
/// # Stale Results
///
/// A worker only publishes if its generation is still current when it finishes,
/// and the check happens under the same lock a new session takes to bump the
/// generation. Events from a superseded session can still be in the channel;
/// every event carries its generation so consumers can drop them.
pub mod engine;
pub mod events;
pub mod processor;
pub mod session;

pub use engine::{search, SearchEngine};
pub use events::{CompletionSummary, Progress, SearchEvent};
pub use processor::ChatProcessor;
pub use session::{Generation, SearchSession, SessionStatus};
