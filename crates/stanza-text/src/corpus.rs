//! Local poem folders: plain-text and saved HTML pages turned into paragraph
//! markup.
//!
//! For `.txt` files each source line becomes one `<p>`; blank lines become
//! `<p></p>` so stanza breaks survive extraction. `.html` pages are mined for
//! the block of `<br>`-separated lines that holds the poem, with page chrome
//! filtered out. Slugs come from file stems, categories from the first folder
//! below the corpus root.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;

use crate::markup::{first_element_body, flatten, paragraph_bodies};

/// Lines containing any of these are site navigation, not verse.
const NAVIGATION_MARKERS: [&str; 7] = [
    "Précédent",
    "Suivant",
    "Previous",
    "Next",
    "Anna Livebardon",
    "Poésie",
    "The Anna Livebardon Homepage is maintained",
];

const UNTITLED: &str = "Untitled";

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("failed to read corpus directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A poem ready to be handed to the importer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CorpusPoem {
    pub slug: String,
    pub title: String,
    pub markup: String,
    pub category: Option<String>,
    pub path: PathBuf,
}

/// Title and paragraph markup converted from a source file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConvertedText {
    pub title: String,
    pub markup: String,
}

/// Convert plain text into one paragraph per line.
///
/// Leading and trailing blank lines are dropped, interior ones kept as empty
/// paragraphs. Tabs and runs of spaces collapse to one space. Returns `None`
/// when the text has no content at all.
pub fn text_to_markup(raw: &str) -> Option<ConvertedText> {
    let lines: Vec<String> = raw.lines().map(collapse_spaces).collect();
    let first = lines.iter().position(|l| !l.is_empty())?;
    let last = lines.iter().rposition(|l| !l.is_empty())?;
    let core = &lines[first..=last];

    let mut markup = String::new();
    for line in core {
        markup.push_str("<p>");
        markup.push_str(&escape_markup(line));
        markup.push_str("</p>");
    }
    Some(ConvertedText {
        title: core[0].clone(),
        markup,
    })
}

/// Convert a saved poem page into one paragraph per verse line.
///
/// The title is the first `<h1>`, else `<title>`, else the first `<b>` inside
/// a paragraph. The verse is the paragraph with the longest body among those
/// holding a `<br>`; without one, the page body is split on newlines. Lines
/// echoing the title or carrying navigation text are dropped, as are blank
/// ones. Returns `None` when no verse line is left.
pub fn html_to_markup(raw: &str) -> Option<ConvertedText> {
    let title = page_title(raw);
    let paragraphs = paragraph_bodies(raw);
    let verse = paragraphs
        .iter()
        .filter(|body| body.to_ascii_lowercase().contains("<br"))
        .max_by_key(|body| body.len());
    let text = match verse {
        Some(body) => flatten(body),
        None => flatten(first_element_body(raw, "body").unwrap_or(raw)),
    };

    let mut markup = String::new();
    for line in text.lines().map(squash) {
        if line.is_empty()
            || line == title
            || NAVIGATION_MARKERS.iter().any(|marker| line.contains(marker))
        {
            continue;
        }
        markup.push_str("<p>");
        markup.push_str(&escape_markup(&line));
        markup.push_str("</p>");
    }
    if markup.is_empty() {
        return None;
    }
    Some(ConvertedText { title, markup })
}

fn page_title(raw: &str) -> String {
    let bold = || {
        paragraph_bodies(raw)
            .into_iter()
            .find_map(|body| first_element_body(body, "b"))
    };
    ["h1", "title"]
        .iter()
        .filter_map(|name| first_element_body(raw, name))
        .chain(std::iter::once_with(bold).flatten())
        .map(|body| squash(&flatten(body)))
        .find(|title| !title.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string())
}

/// Trim and collapse every run of whitespace, non-breaking spaces included,
/// into one space.
fn squash(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collapse_spaces(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut pending_space = false;
    for c in line.trim().chars() {
        if c == ' ' || c == '\t' {
            pending_space = true;
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);
    }
    out
}

fn escape_markup(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Kebab-case ASCII slug: accents folded away, anything else non-alphanumeric
/// collapsed into single hyphens.
pub fn slugify(raw: &str) -> String {
    let folded: String = raw
        .nfkd()
        .filter(|c| !('\u{300}'..='\u{36f}').contains(c))
        .flat_map(char::to_lowercase)
        .collect();
    let mut slug = String::with_capacity(folded.len());
    let mut pending_hyphen = false;
    for c in folded.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

/// First directory below `root` on the way to `path`, if any.
pub fn derive_category(path: &Path, root: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut parts = rel.components();
    let first = parts.next()?;
    parts.next()?;
    Some(first.as_os_str().to_string_lossy().into_owned())
}

/// Collect every `.txt` and `.html` poem below `root`, sorted by path.
///
/// `index.*` files are skipped, as are files that cannot be read or hold no
/// text; both are logged.
pub fn scan_dir(root: impl AsRef<Path>) -> Result<Vec<CorpusPoem>, CorpusError> {
    let root = root.as_ref();
    let mut files = Vec::new();
    collect_files(root, &mut files)?;
    files.sort();

    let mut poems = Vec::with_capacity(files.len());
    for path in files {
        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        if stem.eq_ignore_ascii_case("index") {
            debug!("skipping {}", path.display());
            continue;
        }
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("skipping unreadable poem {}: {err}", path.display());
                continue;
            }
        };
        let converted = if has_extension(&path, "html") {
            html_to_markup(&raw)
        } else {
            text_to_markup(&raw)
        };
        let Some(converted) = converted else {
            warn!("skipping empty poem {}", path.display());
            continue;
        };
        let slug = slugify(&stem);
        if slug.is_empty() {
            warn!("skipping {}: file name yields an empty slug", path.display());
            continue;
        }
        poems.push(CorpusPoem {
            slug,
            title: converted.title,
            markup: converted.markup,
            category: derive_category(&path, root),
            path,
        });
    }
    Ok(poems)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), CorpusError> {
    let io_err = |source| CorpusError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(io_err)?;
        if file_type.is_dir() {
            collect_files(&path, out)?;
        } else if has_extension(&path, "txt") || has_extension(&path, "html") {
            out.push(path);
        }
    }
    Ok(())
}

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted))
}
