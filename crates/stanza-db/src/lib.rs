//! Persistence port for poems and lexicon entries.
//!
//! The pipeline never reaches a database directly; it talks to
//! [`PoemStore`] and [`LexiconStore`], which callers inject. A poem's lines
//! and tokens live in one immutable [`PoemText`] snapshot that
//! [`PoemStore::publish`] and [`PoemStore::swap_text`] replace as a whole, so
//! a reader holding a snapshot never sees lines from one import paired with
//! tokens of another. `publish` writes metadata and snapshot together, and
//! [`PoemStore::snapshot_by_slug`] reads them together.
//!
//! [`MemoryStore`] implements both traits on top of `DashMap`s. The
//! [`lexicon`] module holds the offline import and backfill paths.
//!
//! # Example
//! ```rust
//! use stanza_db::{MemoryStore, PoemStore};
//! use stanza_types::{PoemDraft, PoemText};
//!
//! # fn main() -> Result<(), stanza_db::StoreError> {
//! let store = MemoryStore::new();
//! let id = store.poem_id("rain-song")?;
//! let draft = PoemDraft {
//!     slug: "rain-song".into(),
//!     title: "Rain Song".into(),
//!     markup: "<p>She sang in the rain.</p>".into(),
//!     ..PoemDraft::default()
//! };
//! let (poem, previous) = store.publish(id, draft, PoemText::default())?;
//! assert!(previous.is_empty());
//! let (current, text) = store.snapshot_by_slug("rain-song")?.unwrap();
//! assert_eq!(current, poem);
//! assert!(text.is_empty());
//! # Ok(()) }
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use stanza_types::{AuditEntry, LexemeEntry, LexemeKey, Poem, PoemDraft, PoemId, PoemText, Token};
use thiserror::Error;

pub mod lexicon;
pub mod memory;

pub use lexicon::{
    BackfillReport, ImportMode, ImportReport, LexiconRow, backfill_lexemes, import_lexicon,
    import_lexicon_from_reader,
};
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("poem {0} not found")]
    PoemNotFound(PoemId),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Poems, their line/token snapshots and the audit trail.
pub trait PoemStore: Send + Sync {
    /// Id for `slug`, assigned on first use. The poem stays invisible to
    /// readers until it is published.
    fn poem_id(&self, slug: &str) -> Result<PoemId>;

    /// Upsert the metadata for `id` and replace its snapshot in one step.
    /// Title and markup are always replaced; `None` optionals keep the
    /// stored values. Returns the stored poem and the previous snapshot.
    fn publish(&self, id: PoemId, draft: PoemDraft, text: PoemText)
    -> Result<(Poem, Arc<PoemText>)>;

    fn poem(&self, id: PoemId) -> Result<Option<Poem>>;

    fn poem_by_slug(&self, slug: &str) -> Result<Option<Poem>>;

    /// Metadata and snapshot of one poem, read together.
    fn snapshot_by_slug(&self, slug: &str) -> Result<Option<(Poem, Arc<PoemText>)>>;

    /// Current snapshot. A poem that was never tokenized has an empty one.
    fn text(&self, id: PoemId) -> Result<Arc<PoemText>>;

    /// Replace the snapshot in a single step and hand back the previous one.
    fn swap_text(&self, id: PoemId, text: PoemText) -> Result<Arc<PoemText>>;

    /// First stored token for `key`, ordered by poem id, line and offset.
    fn representative_token(&self, key: &LexemeKey) -> Result<Option<Token>>;

    /// Every distinct `(lemma, pos)` among stored tokens.
    fn token_keys(&self) -> Result<BTreeSet<LexemeKey>>;

    fn append_audit(&self, entry: AuditEntry) -> Result<()>;
}

/// Dictionary entries keyed by `(lemma, pos)`.
pub trait LexiconStore: Send + Sync {
    fn lexeme(&self, key: &LexemeKey) -> Result<Option<LexemeEntry>>;

    /// Insert or replace the entry under its lexeme key.
    fn put_lexeme(&self, entry: LexemeEntry) -> Result<()>;
}
