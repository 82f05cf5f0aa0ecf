//! Unicode word segmentation for single lines.
//!
//! A word starts on a letter and runs through letters, combining marks and
//! digits. An apostrophe (`'`, `’`) or hyphen (`-`, U+2010, U+2011) joins
//! two letter runs only when a letter follows it, so `l'amour` and
//! `grand-mère` stay whole while a trailing hyphen or bullet does not attach.
//!
//! Offsets count Unicode scalar values, not bytes.

use std::iter::FusedIterator;
use std::sync::LazyLock;

use regex::{Matches, Regex};

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\p{L}[\p{L}\p{M}\p{N}]*(?:['\x{2019}\-\x{2010}\x{2011}]\p{L}[\p{L}\p{M}\p{N}]*)*")
        .expect("word pattern compiles")
});

/// One word occurrence: `start..end` in characters, plus the matched text.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TokenSpan<'a> {
    pub start: usize,
    pub end: usize,
    pub surface: &'a str,
}

/// Lazy iterator over the words of one line.
///
/// Holds no shared state; calling [`tokenize_line`] again on the same text
/// replays the same spans.
pub struct Tokens<'a> {
    text: &'a str,
    matches: Option<Matches<'static, 'a>>,
    byte_cursor: usize,
    char_cursor: usize,
}

/// Segment `text` into word spans. Blank text yields nothing.
pub fn tokenize_line(text: &str) -> Tokens<'_> {
    let matches = if text.trim().is_empty() {
        None
    } else {
        Some(WORD_RE.find_iter(text))
    };
    Tokens {
        text,
        matches,
        byte_cursor: 0,
        char_cursor: 0,
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = TokenSpan<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let m = self.matches.as_mut()?.next()?;
        let start = self.char_cursor + self.text[self.byte_cursor..m.start()].chars().count();
        let end = start + m.as_str().chars().count();
        self.byte_cursor = m.end();
        self.char_cursor = end;
        Some(TokenSpan {
            start,
            end,
            surface: m.as_str(),
        })
    }
}

impl FusedIterator for Tokens<'_> {}

/// Current lemma policy: the lowercased surface form.
pub fn placeholder_lemma(surface: &str) -> String {
    surface.to_lowercase()
}

/// Substring of `text` between two character offsets.
pub fn char_slice(text: &str, start: usize, end: usize) -> Option<&str> {
    if start > end {
        return None;
    }
    let mut indices = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()));
    let from = indices.nth(start)?;
    let to = if end == start {
        from
    } else {
        indices.nth(end - start - 1)?
    };
    Some(&text[from..to])
}
