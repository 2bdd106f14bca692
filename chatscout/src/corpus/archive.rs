use ignore::WalkBuilder;
use std::path::{Component, Path};
use tracing::{debug, info, warn};

use super::Corpus;
use crate::errors::{Result, SearchError};

/// Builds a corpus from a directory of plain-text transcripts
///
/// Layout: `<root>/<buddy>/**/<transcript>`. The first directory below the
/// root names the buddy; files directly under the root are not attributed to
/// anyone and are skipped. Hidden entries and ignore files are honoured.
/// Buddies end up in case-insensitive name order and each buddy's chats in
/// file name order.
pub fn load_archive(root: &Path, file_extensions: Option<&[String]>) -> Result<Corpus> {
    if !root.is_dir() {
        return Err(SearchError::archive_error(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let mut corpus = Corpus::new();
    let mut walker = WalkBuilder::new(root);
    walker
        .hidden(true)
        .ignore(true)
        .git_ignore(false)
        .sort_by_file_path(|a, b| a.cmp(b));

    for entry in walker.build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable archive entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let path = entry.path();
        if !has_valid_extension(path, file_extensions) {
            continue;
        }

        let Some(buddy) = buddy_name(root, path) else {
            debug!("No buddy directory for {}", path.display());
            continue;
        };
        corpus.add_buddy(&buddy).add_chat_file(path);
    }

    corpus.sort();
    for buddy in corpus.buddies.iter_mut() {
        buddy.sort();
    }

    info!(
        "Loaded {} chats for {} buddies from {}",
        corpus.total_chats(),
        corpus.number_of_buddies(),
        root.display()
    );
    Ok(corpus)
}

fn buddy_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut components = relative.components();
    let first = components.next()?;
    // A lone component is a file sitting directly in the root
    components.next()?;
    match first {
        Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
        _ => None,
    }
}

/// Checks if a transcript should be loaded based on its extension
fn has_valid_extension(path: &Path, extensions: Option<&[String]>) -> bool {
    match extensions {
        None => true,
        Some(exts) => path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| exts.iter().any(|e| e.eq_ignore_ascii_case(ext))),
    }
}
