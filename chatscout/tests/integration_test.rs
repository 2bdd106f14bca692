use anyhow::Result;
use chatscout::search::{CompletionSummary, Progress};
use chatscout::{
    load_archive, search, Corpus, Generation, PatternOptions, SearchConfig, SearchEngine,
    SearchError, SearchEvent, SessionStatus, TranscriptSource,
};
use std::fs;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

/// A transcript that blocks its reader until the test opens the gate
#[derive(Debug)]
struct GatedSource {
    id: String,
    text: String,
    entered: Arc<AtomicBool>,
    gate: Arc<AtomicBool>,
}

impl GatedSource {
    fn new(id: &str, text: &str) -> (Arc<Self>, Arc<AtomicBool>, Arc<AtomicBool>) {
        let entered = Arc::new(AtomicBool::new(false));
        let gate = Arc::new(AtomicBool::new(false));
        let source = Arc::new(Self {
            id: id.to_string(),
            text: text.to_string(),
            entered: Arc::clone(&entered),
            gate: Arc::clone(&gate),
        });
        (source, entered, gate)
    }
}

impl TranscriptSource for GatedSource {
    fn source_id(&self) -> &str {
        &self.id
    }

    fn read_text(&self) -> chatscout::Result<String> {
        self.entered.store(true, Ordering::SeqCst);
        while !self.gate.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }
        Ok(self.text.clone())
    }
}

#[derive(Debug)]
struct Unreadable;

impl TranscriptSource for Unreadable {
    fn source_id(&self) -> &str {
        "importer://broken"
    }

    fn read_text(&self) -> chatscout::Result<String> {
        Err(SearchError::transcript_unavailable(
            self.source_id(),
            "unexpected end of log",
        ))
    }
}

fn test_config() -> SearchConfig {
    SearchConfig {
        thread_count: NonZeroUsize::new(2).unwrap(),
        ..SearchConfig::default()
    }
}

fn wait_until(flag: &AtomicBool) {
    for _ in 0..10_000 {
        if flag.load(Ordering::SeqCst) {
            return;
        }
        thread::sleep(Duration::from_millis(1));
    }
    panic!("worker never reached the gated transcript");
}

fn wait_for_completion(
    events: &Receiver<SearchEvent>,
    generation: Generation,
) -> CompletionSummary {
    loop {
        match events
            .recv_timeout(Duration::from_secs(10))
            .expect("search did not complete")
        {
            SearchEvent::Completed {
                generation: g,
                summary,
            } if g == generation => return summary,
            _ => {}
        }
    }
}

fn completed_generations(events: &Receiver<SearchEvent>) -> Vec<Generation> {
    events
        .try_iter()
        .filter_map(|event| match event {
            SearchEvent::Completed { generation, .. } => Some(generation),
            _ => None,
        })
        .collect()
}

fn alice_and_bob() -> Corpus {
    let mut corpus = Corpus::new();
    let alice = corpus.add_buddy("Alice");
    alice.add_chat("alice-1", "hello world");
    alice.add_chat("alice-2", "nothing to see");
    corpus.add_buddy("Bob").add_chat("bob-1", "WORLD peace");
    corpus
}

#[test]
fn test_results_follow_corpus_order() -> Result<()> {
    let corpus = alice_and_bob();
    let (engine, events) = SearchEngine::new(test_config())?;

    let session = engine.start_search(&corpus, "world", PatternOptions::case_insensitive())?;
    let summary = wait_for_completion(&events, session.generation());
    session.join();

    let results = &summary.results;
    assert_eq!(results.len(), 2);
    assert_eq!(&*results.results[0].buddy_name, "Alice");
    assert_eq!(results.results[0].chat_index, 0);
    assert_eq!(results.results[0].matches[0].range, 6..11);
    assert_eq!(&*results.results[1].buddy_name, "Bob");
    assert_eq!(results.results[1].matches[0].range, 0..5);
    assert_eq!(results.chats_searched, 3);
    assert_eq!(summary.skipped, 0);

    assert_eq!(session.status(), SessionStatus::Completed);
    let published = engine.results().expect("results installed");
    assert_eq!(published.generation, session.generation());
    Ok(())
}

#[test]
fn test_progress_precedes_completion() -> Result<()> {
    let corpus = alice_and_bob();
    let (engine, events) = SearchEngine::new(test_config())?;

    let session = engine.start_search(&corpus, "world", PatternOptions::default())?;
    session.join();

    let received: Vec<_> = events.try_iter().collect();
    let progress: Vec<Progress> = received
        .iter()
        .filter_map(|event| match event {
            SearchEvent::Progress { progress, .. } => Some(*progress),
            _ => None,
        })
        .collect();

    assert_eq!(progress.first(), Some(&Progress { scanned: 0, total: 2 }));
    assert!(progress.windows(2).all(|w| w[0].scanned <= w[1].scanned));
    assert!(progress.last().unwrap().is_done());
    assert!(matches!(
        received.last(),
        Some(SearchEvent::Completed { .. })
    ));
    Ok(())
}

#[test]
fn test_no_matches_still_completes() -> Result<()> {
    let corpus = alice_and_bob();
    let (engine, events) = SearchEngine::new(test_config())?;

    let session = engine.start_search(&corpus, "xyzzy", PatternOptions::default())?;
    let summary = wait_for_completion(&events, session.generation());

    assert!(summary.results.is_empty());
    assert_eq!(summary.results.chats_searched, 3);
    Ok(())
}

#[test]
fn test_empty_term_completes_empty() -> Result<()> {
    let corpus = alice_and_bob();
    let (engine, events) = SearchEngine::new(test_config())?;

    let session = engine.start_search(&corpus, "", PatternOptions::default())?;
    session.join();

    let received: Vec<_> = events.try_iter().collect();
    let last_progress = received
        .iter()
        .filter_map(|event| match event {
            SearchEvent::Progress { progress, .. } => Some(*progress),
            _ => None,
        })
        .last();
    assert_eq!(last_progress, Some(Progress { scanned: 2, total: 2 }));

    match received.last() {
        Some(SearchEvent::Completed { summary, .. }) => assert!(summary.results.is_empty()),
        other => panic!("expected completion, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_invalid_pattern_creates_no_session() -> Result<()> {
    let corpus = alice_and_bob();
    let (engine, events) = SearchEngine::new(test_config())?;

    let err = engine
        .start_search(&corpus, "ab(cd", PatternOptions::default())
        .unwrap_err();
    match err {
        SearchError::PatternCompile { offset, .. } => assert_eq!(offset, Some(2)),
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(engine.current_generation(), Generation(0));
    assert!(engine.active_session().is_none());
    assert!(events.try_recv().is_err());
    Ok(())
}

#[test]
fn test_superseded_search_never_completes() -> Result<()> {
    let mut corpus = Corpus::new();
    let (gated, entered, gate) = GatedSource::new("importer://slow", "hello world");
    corpus.add_buddy("Alice").add_chat_from(gated);
    corpus.add_buddy("Bob").add_chat("bob-1", "world peace");

    let (engine, events) = SearchEngine::new(test_config())?;
    let first = engine.start_search(&corpus, "world", PatternOptions::default())?;
    wait_until(&entered);

    let second = engine.start_search(&corpus, "peace", PatternOptions::default())?;
    assert!(first.is_superseded());
    assert!(engine.results().is_none());

    gate.store(true, Ordering::SeqCst);
    first.join();
    second.join();

    let completed = completed_generations(&events);
    assert_eq!(completed, vec![second.generation()]);
    assert_eq!(first.status(), SessionStatus::Superseded);
    assert_eq!(second.status(), SessionStatus::Completed);

    let published = engine.results().expect("second search published");
    assert_eq!(published.generation, second.generation());
    assert_eq!(published.len(), 1);
    assert_eq!(&*published.results[0].buddy_name, "Bob");
    Ok(())
}

#[test]
fn test_cancel_discards_results() -> Result<()> {
    let mut corpus = Corpus::new();
    let (gated, entered, gate) = GatedSource::new("importer://slow", "hello world");
    corpus.add_buddy("Alice").add_chat_from(gated);

    let (engine, events) = SearchEngine::new(test_config())?;
    let session = engine.start_search(&corpus, "world", PatternOptions::default())?;
    wait_until(&entered);

    assert!(session.cancel());
    gate.store(true, Ordering::SeqCst);
    session.join();

    assert!(completed_generations(&events).is_empty());
    assert!(engine.results().is_none());
    assert!(session.is_superseded());
    Ok(())
}

#[test]
fn test_cancel_after_completion_is_ignored() -> Result<()> {
    let corpus = alice_and_bob();
    let (engine, events) = SearchEngine::new(test_config())?;

    let session = engine.start_search(&corpus, "world", PatternOptions::default())?;
    wait_for_completion(&events, session.generation());
    session.join();

    assert!(!session.cancel());
    engine.cancel();
    assert_eq!(session.status(), SessionStatus::Completed);
    let published = engine.results().expect("results stay installed");
    assert_eq!(published.generation, session.generation());
    Ok(())
}

#[test]
fn test_unreadable_chat_is_skipped() -> Result<()> {
    let mut corpus = Corpus::new();
    let alice = corpus.add_buddy("Alice");
    alice.add_chat_from(Arc::new(Unreadable));
    alice.add_chat("alice-2", "world");

    let (engine, events) = SearchEngine::new(test_config())?;
    let session = engine.start_search(&corpus, "world", PatternOptions::default())?;
    let summary = wait_for_completion(&events, session.generation());

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.results.len(), 1);
    assert_eq!(summary.results.results[0].chat_index, 1);
    assert_eq!(engine.metrics().get_stats().chats_skipped, 1);
    Ok(())
}

#[test]
fn test_corpus_edits_do_not_disturb_running_search() -> Result<()> {
    let mut corpus = Corpus::new();
    let (gated, entered, gate) = GatedSource::new("importer://slow", "world one");
    let alice = corpus.add_buddy("Alice");
    alice.add_chat_from(gated);
    let doomed = alice.add_chat("alice-2", "world two");
    corpus.add_buddy("Aaron").add_chat("aaron-1", "world three");

    let (engine, events) = SearchEngine::new(test_config())?;
    let session = engine.start_search(&corpus, "world", PatternOptions::default())?;
    wait_until(&entered);

    assert!(corpus.delete_chat(&doomed).is_some());
    corpus.sort();
    assert_eq!(corpus.buddy_for_row(0).unwrap().name(), "Aaron");

    gate.store(true, Ordering::SeqCst);
    let summary = wait_for_completion(&events, session.generation());

    let names: Vec<_> = summary
        .results
        .results
        .iter()
        .map(|r| (r.buddy_name.to_string(), r.chat.source_id().to_string()))
        .collect();
    assert_eq!(
        names,
        vec![
            ("Alice".to_string(), "importer://slow".to_string()),
            ("Alice".to_string(), "alice-2".to_string()),
            ("Aaron".to_string(), "aaron-1".to_string()),
        ]
    );
    Ok(())
}

#[test]
fn test_capture_groups_in_results() -> Result<()> {
    let mut corpus = Corpus::new();
    corpus
        .add_buddy("Alice")
        .add_chat("alice-1", "alice: hi\nbob: hello");

    let (engine, events) = SearchEngine::new(test_config())?;
    let session = engine.start_search(&corpus, r"^(\w+): (?P<msg>.*)$", {
        let mut options = PatternOptions::default();
        options.multiline = true;
        options
    })?;
    let summary = wait_for_completion(&events, session.generation());

    let result = &summary.results.results[0];
    let text = "alice: hi\nbob: hello";
    assert_eq!(result.matches.len(), 2);
    let second = &result.matches[1];
    assert_eq!(second.text(text), Some("bob: hello"));
    let who = second.groups[0].clone().unwrap();
    assert_eq!(&text[who], "bob");
    let msg = second.groups[1].clone().unwrap();
    assert_eq!(&text[msg], "hello");
    Ok(())
}

#[test]
fn test_archive_search() -> Result<()> {
    let dir = tempdir()?;
    fs::create_dir_all(dir.path().join("bob"))?;
    fs::create_dir_all(dir.path().join("alice"))?;
    fs::write(dir.path().join("bob/2023-01-02.txt"), "see you tomorrow")?;
    fs::write(dir.path().join("alice/2023-01-01.txt"), "hello world")?;
    fs::write(dir.path().join("alice/2023-01-03.log"), "world again")?;
    fs::write(dir.path().join("alice/notes.md"), "world")?;

    let extensions = vec!["txt".to_string(), "log".to_string()];
    let corpus = load_archive(dir.path(), Some(&extensions))?;
    assert_eq!(corpus.number_of_buddies(), 2);
    assert_eq!(corpus.total_chats(), 3);

    let results = search(&corpus, "world", PatternOptions::default(), &test_config())?;
    assert_eq!(results.len(), 2);
    assert!(results.results.iter().all(|r| &*r.buddy_name == "alice"));
    assert!(results.results[0]
        .chat
        .path()
        .unwrap()
        .ends_with("2023-01-01.txt"));
    Ok(())
}

#[test]
fn test_new_search_after_completion_replaces_results() -> Result<()> {
    let corpus = alice_and_bob();
    let (engine, events) = SearchEngine::new(test_config())?;

    let first = engine.start_search(&corpus, "hello", PatternOptions::default())?;
    wait_for_completion(&events, first.generation());
    let second = engine.start_search(&corpus, "peace", PatternOptions::default())?;
    let summary = wait_for_completion(&events, second.generation());

    assert!(second.generation() > first.generation());
    assert_eq!(first.status(), SessionStatus::Superseded);
    assert_eq!(summary.results.len(), 1);
    assert_eq!(engine.results().unwrap().generation, second.generation());
    Ok(())
}
