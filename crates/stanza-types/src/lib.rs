//! Shared records for poem ingestion and lexicon lookups.
//!
//! Poems are stored as metadata ([`Poem`]) plus one immutable text snapshot
//! ([`PoemText`]) holding the ordered [`Line`]s and their [`Token`]s. Lexicon
//! data ([`Lexeme`], [`Sense`], [`Translation`]) is read through
//! [`LexemeEntry`] and projected into the UI-facing [`LexemeCard`].
//!
//! Several lexicon fields were historically written either as native JSON or
//! as JSON-encoded strings. [`LooseJson`] keeps both shapes at the boundary so
//! callers decode once instead of sniffing representations.
//!
//! ```rust
//! use stanza_types::LooseJson;
//!
//! let native: LooseJson = serde_json::from_str(r#"["a","b"]"#).unwrap();
//! let encoded: LooseJson = serde_json::from_str(r#""[\"a\",\"b\"]""#).unwrap();
//! assert_eq!(native.resolve(), encoded.resolve());
//! ```

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Part-of-speech tag given to every token until real tagging exists.
pub const PLACEHOLDER_POS: &str = "X";

/// Opaque poem identity assigned by the store.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoemId(pub u64);

impl fmt::Display for PoemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PoemId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(PoemId)
    }
}

/// Poem metadata and its raw source markup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poem {
    pub id: PoemId,
    pub slug: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub markup: String,
}

/// Validated input for an upsert keyed by `slug`.
///
/// `None` optionals leave an existing poem's values untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PoemDraft {
    pub slug: String,
    pub title: String,
    pub source_url: Option<String>,
    pub year: Option<i32>,
    pub category: Option<String>,
    pub markup: String,
}

/// One display line. Empty text marks a stanza break; an embedded `\n` is a
/// soft break inside a single paragraph.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub index: usize,
    pub text: String,
}

impl Line {
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A word occurrence inside one line.
///
/// `start`/`end` count Unicode scalar values into the line text, `end`
/// exclusive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub poem_id: PoemId,
    pub line_index: usize,
    pub start: usize,
    pub end: usize,
    pub surface: String,
    pub lemma: String,
    pub pos: String,
    pub feats: LooseJson,
}

/// Lines and tokens of one poem, replaced as a unit.
///
/// Tokens are kept sorted by `(line_index, start)`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PoemText {
    pub lines: Vec<Line>,
    pub tokens: Vec<Token>,
}

impl PoemText {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Tokens belonging to the line at `index`.
    pub fn tokens_for_line(&self, index: usize) -> &[Token] {
        let lo = self.tokens.partition_point(|t| t.line_index < index);
        let hi = self.tokens.partition_point(|t| t.line_index <= index);
        &self.tokens[lo..hi]
    }
}

/// A JSON field that may hold the value itself or a string encoding of it.
///
/// Strings always deserialize into [`LooseJson::Encoded`]; anything else is
/// [`LooseJson::Native`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LooseJson {
    Encoded(String),
    Native(Value),
}

impl LooseJson {
    pub fn empty_object() -> Self {
        LooseJson::Native(Value::Object(serde_json::Map::new()))
    }

    pub fn empty_array() -> Self {
        LooseJson::Native(Value::Array(Vec::new()))
    }

    /// Decode to a JSON value. Malformed encodings and `null` yield `None`.
    pub fn resolve(&self) -> Option<Cow<'_, Value>> {
        match self {
            LooseJson::Native(Value::Null) => None,
            LooseJson::Native(v) => Some(Cow::Borrowed(v)),
            LooseJson::Encoded(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Null) | Err(_) => None,
                Ok(v) => Some(Cow::Owned(v)),
            },
        }
    }

    /// Rewrite decodable strings as native values; malformed strings are kept
    /// as-is so no stored data is lost.
    pub fn normalized(self) -> Self {
        match self {
            LooseJson::Encoded(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(v) => LooseJson::Native(v),
                Err(_) => LooseJson::Encoded(raw),
            },
            native => native,
        }
    }

    /// True when the field carries no usable data: `null`, blank strings,
    /// empty objects and empty arrays.
    pub fn is_vacant(&self) -> bool {
        match self {
            LooseJson::Encoded(raw) => raw.trim().is_empty(),
            LooseJson::Native(Value::Null) => true,
            LooseJson::Native(Value::Object(map)) => map.is_empty(),
            LooseJson::Native(Value::Array(items)) => items.is_empty(),
            LooseJson::Native(_) => false,
        }
    }
}

impl From<Value> for LooseJson {
    fn from(value: Value) -> Self {
        LooseJson::Native(value)
    }
}

/// `(lemma, pos)` pair uniquely identifying a lexeme.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct LexemeKey {
    pub lemma: String,
    pub pos: String,
}

impl LexemeKey {
    pub fn new(lemma: impl Into<String>, pos: impl Into<String>) -> Self {
        Self {
            lemma: lemma.into(),
            pos: pos.into(),
        }
    }
}

impl fmt::Display for LexemeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.lemma, self.pos)
    }
}

/// Dictionary entry as stored. Every descriptive field is optional.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lexeme {
    pub lemma: String,
    pub pos: String,
    #[serde(default)]
    pub definition: Option<String>,
    #[serde(default)]
    pub ipa: Option<String>,
    #[serde(default)]
    pub cefr: Option<String>,
    #[serde(default, rename = "audioUrlUS")]
    pub audio_url_us: Option<String>,
    #[serde(default, rename = "audioUrlUK")]
    pub audio_url_uk: Option<String>,
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
}

impl Lexeme {
    pub fn key(&self) -> LexemeKey {
        LexemeKey::new(self.lemma.clone(), self.pos.clone())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Sense {
    #[serde(default, alias = "def")]
    pub definition: Option<String>,
    #[serde(default)]
    pub examples: Option<LooseJson>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub lang: String,
    pub text: String,
}

/// A lexeme together with its senses (primary first) and translations.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LexemeEntry {
    pub lexeme: Lexeme,
    pub senses: Vec<Sense>,
    pub translations: Vec<Translation>,
}

impl LexemeEntry {
    pub fn new(lexeme: Lexeme) -> Self {
        Self {
            lexeme,
            senses: Vec::new(),
            translations: Vec::new(),
        }
    }

    /// Insert or replace the translation for `lang`.
    pub fn set_translation(&mut self, lang: &str, text: &str) {
        match self.translations.iter_mut().find(|t| t.lang == lang) {
            Some(existing) => existing.text = text.to_string(),
            None => self.translations.push(Translation {
                lang: lang.to_string(),
                text: text.to_string(),
            }),
        }
    }
}

/// Normalized word card served to readers. Never persisted.
///
/// Absent optionals mean "no data"; only `definition` is always present.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LexemeCard {
    pub lemma: String,
    pub pos: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cefr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipa: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<CardAudio>,
    pub definition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<CardExample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub morphology: Option<Morphology>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forms: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collocations: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etymology: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translations: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl LexemeCard {
    /// Minimal card for a word with no lexicon entry.
    pub fn stub(lemma: impl Into<String>, pos: impl Into<String>) -> Self {
        Self {
            lemma: lemma.into(),
            pos: pos.into(),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct CardAudio {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub us: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uk: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CardExample {
    pub text: String,
}

/// Token-level analysis shown when a card is opened from a specific word.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Morphology {
    pub surface: String,
    pub lemma: String,
    pub pos: String,
    pub features: BTreeMap<String, String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Import,
    Reannotate,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuditAction::Import => "import",
            AuditAction::Reannotate => "reannotate",
        })
    }
}

/// Trace record of a mutation touching one poem.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor: String,
    pub action: AuditAction,
    pub entity: String,
    pub at_unix: u64,
}
