//! Ingestion synchronizer.
//!
//! Import and reannotate both end in a replace-all: the poem's complete
//! line/token snapshot is rebuilt off to the side and swapped into the store
//! in one step, while a per-slug lock keeps two calls for the same poem from
//! interleaving.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::Deserialize;
use stanza_db::{PoemStore, StoreError};
use stanza_text::{extract_lines, placeholder_lemma, tokenize_line};
use stanza_types::{
    AuditAction, AuditEntry, Line, LooseJson, PLACEHOLDER_POS, Poem, PoemDraft, PoemId, PoemText,
    Token,
};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Actor recorded on audit entries when none is configured.
pub const DEFAULT_ACTOR: &str = "admin";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("poem {0} not found")]
    PoemNotFound(PoemId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Body of an import call. Every field is optional at the wire level so a
/// missing one surfaces as [`IngestError::MissingField`] instead of a parse
/// failure.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    #[serde(default, alias = "html")]
    pub content: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub category: Option<String>,
}

impl ImportRequest {
    /// Check required fields and build the store draft.
    pub fn into_draft(self) -> Result<PoemDraft, IngestError> {
        let markup = required(self.content, "content")?;
        let title = required(self.title, "title")?;
        let slug = required(self.slug, "slug")?.trim().to_string();
        Ok(PoemDraft {
            slug,
            title,
            source_url: self.source_url,
            year: self.year,
            category: self.category,
            markup,
        })
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, IngestError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(IngestError::MissingField(field))
}

/// One mutex per poem slug.
#[derive(Clone, Debug, Default)]
pub struct PoemLocks {
    inner: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl PoemLocks {
    /// Run `f` while holding the lock for `slug`.
    pub fn with_poem_lock<T>(&self, slug: &str, f: impl FnOnce() -> T) -> T {
        let lock = Arc::clone(self.inner.entry(slug.to_string()).or_default().value());
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }
}

pub struct Synchronizer {
    store: Arc<dyn PoemStore>,
    locks: PoemLocks,
    actor: String,
}

impl Synchronizer {
    pub fn new(store: Arc<dyn PoemStore>) -> Self {
        Self {
            store,
            locks: PoemLocks::default(),
            actor: DEFAULT_ACTOR.to_string(),
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    /// Upsert the poem and replace all of its lines and tokens with the ones
    /// extracted from the submitted markup. Metadata and snapshot are
    /// published together.
    ///
    /// Validation happens before any store call, so a rejected request leaves
    /// the store untouched.
    pub fn import(&self, request: ImportRequest) -> Result<Poem, IngestError> {
        let draft = request.into_draft()?;
        let extracted = extract_lines(&draft.markup);
        let slug = draft.slug.clone();

        let (poem, (lines, tokens)) = self.locks.with_poem_lock(&slug, || {
            let id = self.store.poem_id(&slug)?;
            let text = build_text(id, extracted);
            let stats = (text.lines.len(), text.tokens.len());
            let (poem, previous) = self.store.publish(id, draft, text)?;
            debug!(
                "poem {} ({}): replaced {} lines/{} tokens",
                poem.slug,
                poem.id,
                previous.lines.len(),
                previous.tokens.len()
            );
            Ok::<_, IngestError>((poem, stats))
        })?;

        info!(
            "imported poem {} as {}: {} lines, {} tokens",
            poem.slug, poem.id, lines, tokens
        );
        self.audit(AuditAction::Import, &poem.slug);
        Ok(poem)
    }

    /// Re-tokenize the lines already stored for `id`, replacing every token.
    ///
    /// Lines are kept as they are; the markup is not re-extracted.
    pub fn reannotate(&self, id: PoemId) -> Result<Poem, IngestError> {
        let poem = self
            .store
            .poem(id)?
            .ok_or(IngestError::PoemNotFound(id))?;

        let tokens = self.locks.with_poem_lock(&poem.slug, || {
            let current = self.store.text(id)?;
            let text = PoemText {
                lines: current.lines.clone(),
                tokens: annotate(id, &current.lines),
            };
            let count = text.tokens.len();
            self.store.swap_text(id, text)?;
            Ok::<_, IngestError>(count)
        })?;

        info!("reannotated poem {} ({}): {} tokens", poem.slug, id, tokens);
        self.audit(AuditAction::Reannotate, &poem.slug);
        Ok(poem)
    }

    fn audit(&self, action: AuditAction, slug: &str) {
        let entry = AuditEntry {
            actor: self.actor.clone(),
            action,
            entity: format!("Poem:{slug}"),
            at_unix: unix_now(),
        };
        info!("audit: {} {} by {}", entry.action, entry.entity, entry.actor);
        if let Err(err) = self.store.append_audit(entry) {
            warn!("failed to record {action} audit for {slug}: {err}");
        }
    }
}

/// Number the extracted lines and tokenize them.
pub fn build_text(poem_id: PoemId, lines: Vec<String>) -> PoemText {
    let lines: Vec<Line> = lines
        .into_iter()
        .enumerate()
        .map(|(index, text)| Line { index, text })
        .collect();
    let tokens = annotate(poem_id, &lines);
    PoemText { lines, tokens }
}

/// Placeholder annotation: lowercased surface as lemma, `X` as pos, no
/// features. Blank lines produce no tokens.
pub fn annotate(poem_id: PoemId, lines: &[Line]) -> Vec<Token> {
    let mut tokens = Vec::new();
    for line in lines.iter().filter(|l| !l.is_blank()) {
        tokens.extend(tokenize_line(&line.text).map(|span| Token {
            poem_id,
            line_index: line.index,
            start: span.start,
            end: span.end,
            surface: span.surface.to_string(),
            lemma: placeholder_lemma(span.surface),
            pos: PLACEHOLDER_POS.to_string(),
            feats: LooseJson::empty_object(),
        }));
    }
    tokens
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
