//! Text side of the poem pipeline: markup in, lines and word spans out.
//!
//! - [`markup::extract_lines`] turns poem markup into display lines, keeping
//!   empty paragraphs as stanza breaks and in-paragraph breaks as embedded
//!   newlines.
//! - [`tokenize::tokenize_line`] lazily segments one line into word spans with
//!   character offsets.
//! - [`corpus`] converts folders of plain-text poems and saved poem pages into
//!   importable markup.
//!
//! Everything here is pure and synchronous; nothing touches shared state.
//!
//! ```rust
//! use stanza_text::{extract_lines, tokenize_line};
//!
//! let lines = extract_lines("<p>l'amour vit</p><p></p><p>à Paris</p>");
//! assert_eq!(lines, vec!["l'amour vit", "", "à Paris"]);
//! let words: Vec<_> = tokenize_line(&lines[0]).map(|s| s.surface).collect();
//! assert_eq!(words, vec!["l'amour", "vit"]);
//! ```

pub mod corpus;
pub mod markup;
pub mod tokenize;

pub use corpus::{CorpusError, CorpusPoem, html_to_markup, scan_dir, slugify, text_to_markup};
pub use markup::extract_lines;
pub use tokenize::{TokenSpan, Tokens, char_slice, placeholder_lemma, tokenize_line};
