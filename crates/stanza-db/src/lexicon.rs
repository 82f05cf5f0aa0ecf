//! Offline lexicon maintenance: JSON-lines import and placeholder backfill.
//!
//! Rows come from dictionary exports and from the enrichment provider, so
//! they are semi-trusted. `forms` and `collocations` may arrive as native JSON
//! or as JSON-encoded strings; both are normalized to native values on write,
//! and anything that does not decode to the expected shape is ignored.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::Value;
use stanza_types::{Lexeme, LexemeEntry, LexemeKey, LooseJson, Sense};
use tracing::{info, warn};

use crate::{LexiconStore, PoemStore, StoreError};

/// How imported values combine with what is already stored.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ImportMode {
    /// Only fill fields that are currently empty.
    #[default]
    UpdateMissing,
    /// Replace every field the row provides.
    Overwrite,
}

impl FromStr for ImportMode {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "update-missing" => Ok(ImportMode::UpdateMissing),
            "overwrite" => Ok(ImportMode::Overwrite),
            other => bail!("unknown lexicon import mode: {other}"),
        }
    }
}

/// One line of a lexicon JSON-lines file.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LexiconRow {
    #[serde(default)]
    pub lemma: Option<String>,
    #[serde(default)]
    pub pos: Option<String>,
    #[serde(default)]
    pub definition: Option<String>,
    #[serde(default)]
    pub ipa: Option<String>,
    #[serde(default, rename = "audioUrlUS")]
    pub audio_url_us: Option<String>,
    #[serde(default, rename = "audioUrlUK")]
    pub audio_url_uk: Option<String>,
    #[serde(default)]
    pub cefr: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub etymology: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub forms: Option<LooseJson>,
    #[serde(default)]
    pub collocations: Option<LooseJson>,
    #[serde(default)]
    pub senses: Vec<Sense>,
    /// `lang -> text`
    #[serde(default)]
    pub translations: BTreeMap<String, String>,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ImportReport {
    pub rows: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub translations: usize,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BackfillReport {
    pub created: usize,
    pub already_present: usize,
}

/// Import a lexicon JSON-lines file.
pub fn import_lexicon(
    store: &dyn LexiconStore,
    path: impl AsRef<Path>,
    mode: ImportMode,
) -> Result<ImportReport> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("failed to open lexicon file {}", path.display()))?;
    let report = import_lexicon_from_reader(store, BufReader::new(file), mode)
        .with_context(|| format!("failed to import lexicon {}", path.display()))?;
    info!(
        "lexicon import from {}: {} rows, {} created, {} updated, {} unchanged, {} skipped",
        path.display(),
        report.rows,
        report.created,
        report.updated,
        report.unchanged,
        report.skipped
    );
    Ok(report)
}

/// Import JSON-lines rows from any reader. Malformed rows and rows without
/// lemma or pos are skipped and counted, never fatal.
pub fn import_lexicon_from_reader<R: BufRead>(
    store: &dyn LexiconStore,
    reader: R,
    mode: ImportMode,
) -> Result<ImportReport> {
    let mut report = ImportReport::default();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.context("failed to read lexicon line")?;
        if line.trim().is_empty() {
            continue;
        }
        report.rows += 1;

        let row: LexiconRow = match serde_json::from_str(&line) {
            Ok(row) => row,
            Err(err) => {
                warn!("skipping lexicon line {}: {err}", line_no + 1);
                report.skipped += 1;
                continue;
            }
        };
        let (Some(lemma), Some(pos)) = (non_blank(&row.lemma), non_blank(&row.pos)) else {
            warn!("skipping lexicon line {}: lemma and pos are required", line_no + 1);
            report.skipped += 1;
            continue;
        };

        let key = LexemeKey::new(lemma, pos);
        let existing = store.lexeme(&key)?;
        let mut entry = existing.clone().unwrap_or_else(|| {
            LexemeEntry::new(Lexeme {
                lemma: key.lemma.clone(),
                pos: key.pos.clone(),
                ..Lexeme::default()
            })
        });
        apply_row(&mut entry, &row, mode);
        for (lang, text) in &row.translations {
            if lang.trim().is_empty() {
                continue;
            }
            entry.set_translation(lang.trim(), text);
            report.translations += 1;
        }

        match existing {
            None => {
                store.put_lexeme(entry)?;
                report.created += 1;
            }
            Some(previous) if previous != entry => {
                store.put_lexeme(entry)?;
                report.updated += 1;
            }
            Some(_) => report.unchanged += 1,
        }
    }
    Ok(report)
}

/// Create placeholder lexemes for every token `(lemma, pos)` that has none.
pub fn backfill_lexemes(
    poems: &dyn PoemStore,
    lexicon: &dyn LexiconStore,
) -> Result<BackfillReport, StoreError> {
    let mut report = BackfillReport::default();
    for key in poems.token_keys()? {
        if lexicon.lexeme(&key)?.is_some() {
            report.already_present += 1;
            continue;
        }
        lexicon.put_lexeme(LexemeEntry::new(Lexeme {
            lemma: key.lemma,
            pos: key.pos,
            definition: Some(String::new()),
            forms: Some(LooseJson::empty_object()),
            collocations: Some(LooseJson::empty_array()),
            ..Lexeme::default()
        }))?;
        report.created += 1;
    }
    info!(
        "lexeme backfill: created={}, already-present={}",
        report.created, report.already_present
    );
    Ok(report)
}

fn apply_row(entry: &mut LexemeEntry, row: &LexiconRow, mode: ImportMode) {
    let lexeme = &mut entry.lexeme;
    merge_text(&mut lexeme.definition, &row.definition, mode);
    merge_text(&mut lexeme.ipa, &row.ipa, mode);
    merge_text(&mut lexeme.audio_url_us, &row.audio_url_us, mode);
    merge_text(&mut lexeme.audio_url_uk, &row.audio_url_uk, mode);
    merge_text(&mut lexeme.cefr, &row.cefr, mode);
    merge_text(&mut lexeme.frequency, &row.frequency, mode);
    merge_text(&mut lexeme.etymology, &row.etymology, mode);
    merge_text(&mut lexeme.notes, &row.notes, mode);
    merge_json(&mut lexeme.forms, &row.forms, mode, Value::is_object);
    merge_json(&mut lexeme.collocations, &row.collocations, mode, Value::is_array);

    if !row.senses.is_empty() && (mode == ImportMode::Overwrite || entry.senses.is_empty()) {
        entry.senses = row
            .senses
            .iter()
            .cloned()
            .map(|sense| Sense {
                examples: sense.examples.map(LooseJson::normalized),
                ..sense
            })
            .collect();
    }
}

fn merge_text(slot: &mut Option<String>, incoming: &Option<String>, mode: ImportMode) {
    let Some(value) = non_blank(incoming) else {
        return;
    };
    let vacant = slot.as_deref().is_none_or(|s| s.trim().is_empty());
    if mode == ImportMode::Overwrite || vacant {
        *slot = Some(value.to_string());
    }
}

fn merge_json(
    slot: &mut Option<LooseJson>,
    incoming: &Option<LooseJson>,
    mode: ImportMode,
    shape: fn(&Value) -> bool,
) {
    let Some(value) = incoming.clone().map(LooseJson::normalized) else {
        return;
    };
    let LooseJson::Native(native) = &value else {
        return;
    };
    if !shape(native) || value.is_vacant() {
        return;
    }
    let vacant = slot.as_ref().is_none_or(LooseJson::is_vacant);
    if mode == ImportMode::Overwrite || vacant {
        *slot = Some(value);
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
