use anyhow::{bail, Context, Result};
use chatscout::{
    compile, load_archive,
    search::ChatProcessor,
    CliOverrides, Corpus, EncodingMode, MatchMode, MatchSpan, PatternOptions, ResultSet,
    ScanMetrics, SearchConfig, SearchEngine, SearchEvent,
};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use serde_json::json;
use std::{num::NonZeroUsize, path::PathBuf, time::Duration};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SearchArgs {
    /// Pattern to search for
    pattern: String,

    /// Archive directory, one subdirectory per buddy
    #[arg(short = 'a', long, default_value = ".")]
    archive: PathBuf,

    /// Case-insensitive matching
    #[arg(short = 'i', long)]
    ignore_case: bool,

    /// Let `.` match newlines
    #[arg(short = 's', long)]
    dot_all: bool,

    /// Ignore whitespace and `#` comments in the pattern
    #[arg(short = 'x', long)]
    extended: bool,

    /// Make quantifiers lazy by default
    #[arg(short = 'l', long)]
    lazy: bool,

    /// Let `^` and `$` match at line boundaries
    #[arg(short = 'm', long)]
    multiline: bool,

    /// Keep only the first match of each chat
    #[arg(long)]
    first: bool,

    /// Show only statistics, not matches
    #[arg(long)]
    stats: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Number of threads to use
    #[arg(short = 'j', long)]
    threads: Option<NonZeroUsize>,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// How to handle invalid UTF-8 sequences (failfast|lossy)
    #[arg(long)]
    encoding: Option<String>,

    /// Transcript extensions to load (e.g. txt,log)
    #[arg(short = 'e', long)]
    extensions: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search chat transcripts for a pattern
    Search(Box<SearchArgs>),

    /// List buddies in an archive
    List {
        /// Archive directory, one subdirectory per buddy
        #[arg(short = 'a', long, default_value = ".")]
        archive: PathBuf,

        /// Transcript extensions to load (e.g. txt,log)
        #[arg(short = 'e', long)]
        extensions: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Search(args) => run_search(*args),
        Commands::List {
            archive,
            extensions,
        } => {
            let extensions = parse_extensions(extensions.as_deref());
            init_tracing("warn");
            let corpus = load_archive(&archive, extensions.as_deref())?;
            print_buddies(&corpus);
            Ok(())
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn parse_extensions(extensions: Option<&str>) -> Option<Vec<String>> {
    extensions.map(|e| {
        e.split(',')
            .map(|s| s.trim().trim_start_matches('.').to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

fn parse_encoding(encoding: &str) -> Result<EncodingMode> {
    match encoding.to_lowercase().as_str() {
        "lossy" => Ok(EncodingMode::Lossy),
        "failfast" => Ok(EncodingMode::FailFast),
        other => bail!("Unknown encoding mode '{}' (expected failfast or lossy)", other),
    }
}

fn run_search(args: SearchArgs) -> Result<()> {
    let file_config = SearchConfig::load_from(args.config.as_deref())
        .context("Failed to load configuration")?;

    let defaults = file_config.options;
    let options = PatternOptions {
        case_insensitive: args.ignore_case || defaults.case_insensitive,
        dot_all: args.dot_all || defaults.dot_all,
        extended: args.extended || defaults.extended,
        lazy: args.lazy || defaults.lazy,
        multiline: args.multiline || defaults.multiline,
    };

    let config = file_config.merge_with_cli(CliOverrides {
        options: Some(options),
        match_mode: args.first.then_some(MatchMode::First),
        thread_count: args.threads,
        encoding_mode: args.encoding.as_deref().map(parse_encoding).transpose()?,
        file_extensions: parse_extensions(args.extensions.as_deref()),
        log_level: None,
    });
    init_tracing(&config.log_level);

    let corpus = load_archive(&args.archive, config.file_extensions.as_deref())?;
    debug!(
        "Searching {} chats of {} buddies with {} threads",
        corpus.total_chats(),
        corpus.number_of_buddies(),
        config.thread_count
    );
    let (engine, events) = SearchEngine::new(config.clone())?;
    let session = engine.start_search(&corpus, &args.pattern, options)?;

    let progress = if args.json || args.stats {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(corpus.number_of_buddies() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} buddies")?
                .progress_chars("=>-"),
        );
        bar
    };

    let summary = loop {
        match events.recv() {
            Ok(SearchEvent::Progress {
                generation,
                progress: p,
            }) if generation == session.generation() => {
                progress.set_position(p.scanned as u64);
            }
            Ok(SearchEvent::Completed {
                generation,
                summary,
            }) if generation == session.generation() => break summary,
            Ok(_) => {}
            Err(_) => bail!("Search {} ended without results", session.generation()),
        }
    };
    progress.finish_and_clear();
    session.join();

    // Used only to read transcripts back for display
    let reader = ChatProcessor::new(
        compile(&args.pattern, options)?,
        config.match_mode,
        config.encoding_mode,
        ScanMetrics::new(),
    );

    if args.json {
        print_json(&summary.results, &reader)?;
    } else {
        if !args.stats {
            print_results(&summary.results, &reader);
        }
        println!(
            "\nFound {} matches in {} chats ({} skipped) in {}",
            summary.results.total_matches,
            summary.results.chats_with_matches,
            summary.skipped,
            humantime::format_duration(round_to_millis(summary.elapsed))
        );
    }
    Ok(())
}

fn round_to_millis(elapsed: Duration) -> Duration {
    Duration::from_millis(elapsed.as_millis() as u64)
}

/// Line number and bounds of the line containing `offset`
///
/// `None` if `offset` is past the end of `text` or splits a character.
fn line_around(text: &str, offset: usize) -> Option<(usize, usize, usize)> {
    let before = text.get(..offset)?;
    let start = before.rfind('\n').map_or(0, |i| i + 1);
    let end = text[offset..].find('\n').map_or(text.len(), |i| offset + i);
    let line_number = text[..start].matches('\n').count() + 1;
    Some((line_number, start, end))
}

/// The line holding `span` with the matched part highlighted, plus its number
///
/// `None` when the span no longer fits the transcript, i.e. the file changed
/// after the scan.
fn render_match(text: &str, span: &MatchSpan) -> Option<(usize, String)> {
    span.text(text)?;
    let (line_number, line_start, line_end) = line_around(text, span.start())?;
    let highlight_end = span.end().min(line_end);
    let line = format!(
        "{}{}{}",
        &text[line_start..span.start()],
        text[span.start()..highlight_end].red().bold(),
        &text[highlight_end..line_end]
    );
    Some((line_number, line))
}

fn print_results(results: &ResultSet, reader: &ChatProcessor) {
    let grouped = results.results.iter().group_by(|r| r.buddy_name.clone());
    for (buddy, chats) in &grouped {
        println!("\n{}", buddy.blue().bold());
        for result in chats {
            let text = match reader.load_text(&result.chat) {
                Ok(text) => text,
                Err(e) => {
                    println!("  {}: {}", result.chat.source_id(), e.to_string().yellow());
                    continue;
                }
            };
            for span in &result.matches {
                match render_match(&text, span) {
                    Some((line_number, line)) => println!(
                        "  {}:{}: {}",
                        result.chat.source_id(),
                        line_number.to_string().green(),
                        line
                    ),
                    None => {
                        println!(
                            "  {}: {}",
                            result.chat.source_id(),
                            "transcript changed since the search, skipping".yellow()
                        );
                        break;
                    }
                }
            }
        }
    }
}

fn print_json(results: &ResultSet, reader: &ChatProcessor) -> Result<()> {
    let entries: Vec<_> = results
        .results
        .iter()
        .map(|result| {
            let text = reader.load_text(&result.chat).ok();
            let matches: Vec<_> = result
                .matches
                .iter()
                .map(|span| {
                    json!({
                        "start": span.start(),
                        "end": span.end(),
                        "text": text.as_deref().and_then(|t| span.text(t)),
                        "groups": span.groups,
                    })
                })
                .collect();
            json!({
                "buddy": &*result.buddy_name,
                "chat": result.chat.source_id(),
                "chat_index": result.chat_index,
                "matches": matches,
            })
        })
        .collect();

    let output = json!({
        "results": entries,
        "total_matches": results.total_matches,
        "chats_searched": results.chats_searched,
        "chats_with_matches": results.chats_with_matches,
        "chats_skipped": results.chats_skipped,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_buddies(corpus: &Corpus) {
    for buddy in corpus.buddies() {
        let count = buddy.number_of_chats();
        println!(
            "{} ({} {})",
            buddy.name().blue(),
            count,
            if count == 1 { "chat" } else { "chats" }
        );
    }
    println!(
        "\n{} buddies, {} chats",
        corpus.number_of_buddies(),
        corpus.total_chats()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_around() {
        let text = "first line\nsecond line\nthird";
        assert_eq!(line_around(text, 0), Some((1, 0, 10)));
        assert_eq!(line_around(text, 14), Some((2, 11, 22)));
        assert_eq!(line_around(text, 25), Some((3, 23, 28)));
        assert_eq!(line_around(text, 40), None);
        assert_eq!(line_around("caf\u{e9}", 4), None);
    }

    #[test]
    fn test_parse_extensions() {
        assert_eq!(
            parse_extensions(Some("txt, .log,,")),
            Some(vec!["txt".to_string(), "log".to_string()])
        );
        assert_eq!(parse_extensions(None), None);
    }

    #[test]
    fn test_parse_encoding() {
        assert_eq!(parse_encoding("LOSSY").unwrap(), EncodingMode::Lossy);
        assert_eq!(parse_encoding("failfast").unwrap(), EncodingMode::FailFast);
        assert!(parse_encoding("utf-16").is_err());
    }

    #[test]
    fn test_render_match_stays_on_line() {
        colored::control::set_override(false);
        let text = "hello world\nbye";
        let span = MatchSpan {
            range: 6..13,
            groups: vec![],
        };
        assert_eq!(render_match(text, &span), Some((1, "hello world".to_string())));
    }

    #[test]
    fn test_render_match_on_shrunk_transcript() {
        colored::control::set_override(false);
        let span = MatchSpan {
            range: 20..25,
            groups: vec![],
        };
        assert_eq!(render_match("short text", &span), None);

        let split_char = MatchSpan {
            range: 4..5,
            groups: vec![],
        };
        assert_eq!(render_match("caf\u{e9}s", &split_char), None);
    }
}
