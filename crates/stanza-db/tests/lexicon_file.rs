use std::io::Write;

use stanza_db::{
    ImportMode, LexiconStore, MemoryStore, PoemStore, backfill_lexemes, import_lexicon,
};
use stanza_types::{
    LexemeKey, Line, LooseJson, PLACEHOLDER_POS, PoemDraft, PoemId, PoemText, Token,
};
use tempfile::NamedTempFile;

fn token(poem_id: PoemId, surface: &str, start: usize) -> Token {
    Token {
        poem_id,
        line_index: 0,
        start,
        end: start + surface.chars().count(),
        surface: surface.into(),
        lemma: surface.to_lowercase(),
        pos: PLACEHOLDER_POS.into(),
        feats: LooseJson::empty_object(),
    }
}

#[test]
fn imports_lexicon_file_from_disk() {
    let mut file = NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        r#"{{"lemma":"amour","pos":"X","definition":"love","translations":{{"en":"love","de":"Liebe"}}}}"#
    )
    .unwrap();
    writeln!(file, r#"{{"lemma":"vit","pos":"X","ipa":"vi"}}"#).unwrap();

    let store = MemoryStore::new();
    let report = import_lexicon(&store, file.path(), ImportMode::UpdateMissing).unwrap();
    assert_eq!(report.created, 2);
    assert_eq!(report.translations, 2);
    assert_eq!(store.lexeme_count(), 2);
}

#[test]
fn missing_lexicon_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = import_lexicon(
        &MemoryStore::new(),
        dir.path().join("absent.jsonl"),
        ImportMode::Overwrite,
    )
    .unwrap_err();
    assert!(format!("{err:#}").contains("absent.jsonl"));
}

#[test]
fn backfill_creates_placeholders_for_unknown_tokens() {
    let store = MemoryStore::new();
    let id = store.poem_id("paris").unwrap();
    store
        .publish(
            id,
            PoemDraft {
                slug: "paris".into(),
                title: "Paris".into(),
                markup: "<p>l'amour vit à Paris</p>".into(),
                ..PoemDraft::default()
            },
            PoemText {
                lines: vec![Line {
                    index: 0,
                    text: "l'amour vit à Paris".into(),
                }],
                tokens: vec![
                    token(id, "l'amour", 0),
                    token(id, "vit", 8),
                    token(id, "à", 12),
                    token(id, "Paris", 14),
                ],
            },
        )
        .unwrap();

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"lemma":"vit","pos":"X","definition":"lives"}}"#).unwrap();
    import_lexicon(&store, file.path(), ImportMode::UpdateMissing).unwrap();

    let report = backfill_lexemes(&store, &store).unwrap();
    assert_eq!(report.created, 3);
    assert_eq!(report.already_present, 1);

    let placeholder = store
        .lexeme(&LexemeKey::new("paris", PLACEHOLDER_POS))
        .unwrap()
        .expect("placeholder created");
    assert_eq!(placeholder.lexeme.definition.as_deref(), Some(""));
    assert_eq!(placeholder.lexeme.forms, Some(LooseJson::empty_object()));

    let again = backfill_lexemes(&store, &store).unwrap();
    assert_eq!(again.created, 0);
    assert_eq!(again.already_present, 4);
}
