use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use stanza_types::{AuditEntry, LexemeEntry, LexemeKey, Poem, PoemDraft, PoemId, PoemText, Token};

use crate::{LexiconStore, PoemStore, Result, StoreError};

#[derive(Debug)]
struct PoemRecord {
    poem: Poem,
    text: Arc<PoemText>,
}

/// Process-local store backing both ports.
#[derive(Debug, Default)]
pub struct MemoryStore {
    next_id: AtomicU64,
    poems: DashMap<PoemId, PoemRecord>,
    slugs: DashMap<String, PoemId>,
    lexemes: DashMap<LexemeKey, LexemeEntry>,
    audit: Mutex<Vec<AuditEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poem_count(&self) -> usize {
        self.poems.len()
    }

    pub fn lexeme_count(&self) -> usize {
        self.lexemes.len()
    }

    /// Audit entries in append order.
    pub fn audit_log(&self) -> Vec<AuditEntry> {
        self.audit
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    fn sorted_ids(&self) -> Vec<PoemId> {
        let mut ids: Vec<PoemId> = self.poems.iter().map(|r| *r.key()).collect();
        ids.sort();
        ids
    }
}

impl PoemStore for MemoryStore {
    fn poem_id(&self, slug: &str) -> Result<PoemId> {
        Ok(*self
            .slugs
            .entry(slug.to_string())
            .or_insert_with(|| PoemId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)))
    }

    fn publish(
        &self,
        id: PoemId,
        draft: PoemDraft,
        text: PoemText,
    ) -> Result<(Poem, Arc<PoemText>)> {
        let mut record = self.poems.entry(id).or_insert_with(|| PoemRecord {
            poem: Poem {
                id,
                slug: draft.slug.clone(),
                title: String::new(),
                source_url: None,
                year: None,
                category: None,
                markup: String::new(),
            },
            text: Arc::default(),
        });
        let poem = &mut record.poem;
        poem.title = draft.title;
        poem.markup = draft.markup;
        if draft.source_url.is_some() {
            poem.source_url = draft.source_url;
        }
        if draft.year.is_some() {
            poem.year = draft.year;
        }
        if draft.category.is_some() {
            poem.category = draft.category;
        }
        let poem = poem.clone();
        let previous = std::mem::replace(&mut record.text, Arc::new(text));
        Ok((poem, previous))
    }

    fn poem(&self, id: PoemId) -> Result<Option<Poem>> {
        Ok(self.poems.get(&id).map(|r| r.poem.clone()))
    }

    fn poem_by_slug(&self, slug: &str) -> Result<Option<Poem>> {
        let Some(id) = self.slugs.get(slug).map(|r| *r) else {
            return Ok(None);
        };
        self.poem(id)
    }

    fn snapshot_by_slug(&self, slug: &str) -> Result<Option<(Poem, Arc<PoemText>)>> {
        let Some(id) = self.slugs.get(slug).map(|r| *r) else {
            return Ok(None);
        };
        Ok(self
            .poems
            .get(&id)
            .map(|r| (r.poem.clone(), Arc::clone(&r.text))))
    }

    fn text(&self, id: PoemId) -> Result<Arc<PoemText>> {
        self.poems
            .get(&id)
            .map(|r| Arc::clone(&r.text))
            .ok_or(StoreError::PoemNotFound(id))
    }

    fn swap_text(&self, id: PoemId, text: PoemText) -> Result<Arc<PoemText>> {
        let mut record = self
            .poems
            .get_mut(&id)
            .ok_or(StoreError::PoemNotFound(id))?;
        Ok(std::mem::replace(&mut record.text, Arc::new(text)))
    }

    fn representative_token(&self, key: &LexemeKey) -> Result<Option<Token>> {
        for id in self.sorted_ids() {
            let Ok(text) = self.text(id) else {
                continue;
            };
            if let Some(token) = text
                .tokens
                .iter()
                .find(|t| t.lemma == key.lemma && t.pos == key.pos)
            {
                return Ok(Some(token.clone()));
            }
        }
        Ok(None)
    }

    fn token_keys(&self) -> Result<BTreeSet<LexemeKey>> {
        let mut keys = BTreeSet::new();
        for id in self.sorted_ids() {
            let Ok(text) = self.text(id) else {
                continue;
            };
            keys.extend(
                text.tokens
                    .iter()
                    .map(|t| LexemeKey::new(t.lemma.clone(), t.pos.clone())),
            );
        }
        Ok(keys)
    }

    fn append_audit(&self, entry: AuditEntry) -> Result<()> {
        self.audit
            .lock()
            .map_err(|_| StoreError::Unavailable("audit log lock poisoned".into()))?
            .push(entry);
        Ok(())
    }
}

impl LexiconStore for MemoryStore {
    fn lexeme(&self, key: &LexemeKey) -> Result<Option<LexemeEntry>> {
        Ok(self.lexemes.get(key).map(|r| r.clone()))
    }

    fn put_lexeme(&self, entry: LexemeEntry) -> Result<()> {
        self.lexemes.insert(entry.lexeme.key(), entry);
        Ok(())
    }
}
