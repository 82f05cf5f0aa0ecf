//! Lexeme card projection.
//!
//! [`project_card`] is total: stored lexicon data is semi-trusted, so every
//! field decodes on its own and a field that fails to decode is left out of
//! the card instead of failing the lookup.

use std::collections::BTreeMap;

use serde_json::Value;
use stanza_db::{LexiconStore, PoemStore, StoreError};
use stanza_types::{
    CardAudio, CardExample, Lexeme, LexemeCard, LexemeEntry, LexemeKey, LooseJson, Morphology,
    Sense, Token, Translation,
};

/// Merge a lexeme, its senses and translations, and optionally the token the
/// reader clicked, into one card.
pub fn project_card(entry: &LexemeEntry, token: Option<&Token>) -> LexemeCard {
    let lexeme = &entry.lexeme;
    let primary = entry.senses.first();

    let definition = primary
        .and_then(|sense| non_empty(&sense.definition))
        .or_else(|| non_empty(&lexeme.definition))
        .unwrap_or_default()
        .to_string();

    LexemeCard {
        lemma: lexeme.lemma.clone(),
        pos: lexeme.pos.clone(),
        cefr: lexeme.cefr.clone(),
        ipa: lexeme.ipa.clone(),
        audio: audio(lexeme),
        definition,
        example: primary.and_then(first_example),
        morphology: token.map(morphology),
        forms: lexeme.forms.as_ref().and_then(decode_forms),
        collocations: lexeme.collocations.as_ref().and_then(decode_collocations),
        frequency: lexeme.frequency.clone(),
        etymology: lexeme.etymology.clone(),
        translations: translations(&entry.translations),
        notes: lexeme.notes.clone(),
    }
}

/// Card for `key`, falling back to a stub when the lexicon has no entry.
///
/// Morphology comes from the first stored token with the same lemma and pos.
/// Only store failures are errors.
pub fn lookup_card(
    poems: &dyn PoemStore,
    lexicon: &dyn LexiconStore,
    key: &LexemeKey,
) -> Result<LexemeCard, StoreError> {
    let Some(entry) = lexicon.lexeme(key)? else {
        return Ok(LexemeCard::stub(key.lemma.clone(), key.pos.clone()));
    };
    let token = poems.representative_token(key)?;
    Ok(project_card(&entry, token.as_ref()))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn audio(lexeme: &Lexeme) -> Option<CardAudio> {
    let us = non_empty(&lexeme.audio_url_us).map(str::to_string);
    let uk = non_empty(&lexeme.audio_url_uk).map(str::to_string);
    if us.is_none() && uk.is_none() {
        return None;
    }
    Some(CardAudio { us, uk })
}

fn first_example(sense: &Sense) -> Option<CardExample> {
    let examples = sense.examples.as_ref()?.resolve()?;
    let text = examples.as_array()?.first()?.get("text")?.as_str()?;
    if text.is_empty() {
        return None;
    }
    Some(CardExample {
        text: text.to_string(),
    })
}

fn decode_forms(raw: &LooseJson) -> Option<BTreeMap<String, String>> {
    let value = raw.resolve()?;
    let map = value.as_object()?;
    Some(
        map.iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect(),
    )
}

fn decode_collocations(raw: &LooseJson) -> Option<Vec<String>> {
    let value = raw.resolve()?;
    let items = value.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
    )
}

fn morphology(token: &Token) -> Morphology {
    let features = token
        .feats
        .resolve()
        .and_then(|value| {
            value.as_object().map(|map| {
                map.iter()
                    .map(|(k, v)| (k.clone(), feature_text(v)))
                    .collect::<BTreeMap<_, _>>()
            })
        })
        .unwrap_or_default();
    Morphology {
        surface: token.surface.clone(),
        lemma: token.lemma.clone(),
        pos: token.pos.clone(),
        features,
    }
}

fn feature_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn translations(records: &[Translation]) -> Option<BTreeMap<String, String>> {
    if records.is_empty() {
        return None;
    }
    Some(
        records
            .iter()
            .map(|t| (t.lang.clone(), t.text.clone()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stanza_db::MemoryStore;
    use stanza_types::{PLACEHOLDER_POS, PoemId};

    fn entry(lexeme: Lexeme) -> LexemeEntry {
        LexemeEntry::new(Lexeme {
            lemma: "chat".into(),
            pos: "NOUN".into(),
            ..lexeme
        })
    }

    fn token(feats: LooseJson) -> Token {
        Token {
            poem_id: PoemId(1),
            line_index: 0,
            start: 3,
            end: 8,
            surface: "Chats".into(),
            lemma: "chats".into(),
            pos: PLACEHOLDER_POS.into(),
            feats,
        }
    }

    #[test]
    fn collocations_accept_both_representations() {
        let encoded = project_card(
            &entry(Lexeme {
                collocations: Some(LooseJson::Encoded(r#"["a","b"]"#.into())),
                ..Lexeme::default()
            }),
            None,
        );
        let native = project_card(
            &entry(Lexeme {
                collocations: Some(LooseJson::Native(json!(["a", "b"]))),
                ..Lexeme::default()
            }),
            None,
        );
        assert_eq!(encoded.collocations, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(encoded, native);
    }

    #[test]
    fn malformed_fields_are_omitted() {
        let card = project_card(
            &entry(Lexeme {
                definition: Some("cat".into()),
                collocations: Some(LooseJson::Encoded("{not json".into())),
                forms: Some(LooseJson::Native(json!(["not", "a", "map"]))),
                ..Lexeme::default()
            }),
            None,
        );
        assert_eq!(card.definition, "cat");
        assert_eq!(card.collocations, None);
        assert_eq!(card.forms, None);
        let value = serde_json::to_value(&card).unwrap();
        assert!(value.get("collocations").is_none());
    }

    #[test]
    fn definition_prefers_primary_sense() {
        let mut with_sense = entry(Lexeme {
            definition: Some("lexeme".into()),
            ..Lexeme::default()
        });
        with_sense.senses.push(Sense {
            definition: Some("sense".into()),
            examples: None,
        });
        assert_eq!(project_card(&with_sense, None).definition, "sense");

        with_sense.senses[0].definition = Some(String::new());
        assert_eq!(project_card(&with_sense, None).definition, "lexeme");

        let bare = entry(Lexeme::default());
        assert_eq!(project_card(&bare, None).definition, "");
    }

    #[test]
    fn example_reads_native_or_encoded_lists() {
        let mut card_entry = entry(Lexeme::default());
        card_entry.senses.push(Sense {
            definition: None,
            examples: Some(LooseJson::Encoded(
                r#"[{"text":"le chat dort"},{"text":"second"}]"#.into(),
            )),
        });
        assert_eq!(
            project_card(&card_entry, None).example,
            Some(CardExample {
                text: "le chat dort".into()
            })
        );

        card_entry.senses[0].examples = Some(LooseJson::Native(json!([{"text": "natif"}])));
        assert_eq!(
            project_card(&card_entry, None).example.map(|e| e.text),
            Some("natif".to_string())
        );

        card_entry.senses[0].examples = Some(LooseJson::Encoded("[{".into()));
        assert_eq!(project_card(&card_entry, None).example, None);

        card_entry.senses[0].examples = Some(LooseJson::Native(json!([{"text": ""}])));
        assert_eq!(project_card(&card_entry, None).example, None);
    }

    #[test]
    fn forms_drop_non_string_values() {
        let card = project_card(
            &entry(Lexeme {
                forms: Some(LooseJson::Encoded(r#"{"pl":"chats","count":2}"#.into())),
                ..Lexeme::default()
            }),
            None,
        );
        let forms = card.forms.unwrap();
        assert_eq!(forms.len(), 1);
        assert_eq!(forms["pl"], "chats");
    }

    #[test]
    fn scalars_pass_through_only_when_present() {
        let card = project_card(
            &entry(Lexeme {
                ipa: Some("ʃa".into()),
                notes: Some(String::new()),
                audio_url_uk: Some("uk.mp3".into()),
                audio_url_us: Some(String::new()),
                ..Lexeme::default()
            }),
            None,
        );
        assert_eq!(card.ipa.as_deref(), Some("ʃa"));
        assert_eq!(card.notes.as_deref(), Some(""));
        assert_eq!(card.cefr, None);
        assert_eq!(card.etymology, None);
        assert_eq!(
            card.audio,
            Some(CardAudio {
                us: None,
                uk: Some("uk.mp3".into())
            })
        );

        let silent = project_card(&entry(Lexeme::default()), None);
        assert_eq!(silent.audio, None);
        assert_eq!(silent.translations, None);
    }

    #[test]
    fn translations_become_a_language_map() {
        let mut card_entry = entry(Lexeme::default());
        card_entry.set_translation("en", "cat");
        card_entry.set_translation("de", "Katze");
        let translations = project_card(&card_entry, None).translations.unwrap();
        assert_eq!(translations["en"], "cat");
        assert_eq!(translations["de"], "Katze");
    }

    #[test]
    fn morphology_only_with_token_context() {
        let card_entry = entry(Lexeme::default());
        assert_eq!(project_card(&card_entry, None).morphology, None);

        let card = project_card(
            &card_entry,
            Some(&token(LooseJson::Encoded(
                r#"{"Number":"Plur","Gender":"Masc","Count":2}"#.into(),
            ))),
        );
        let morphology = card.morphology.unwrap();
        assert_eq!(morphology.surface, "Chats");
        assert_eq!(morphology.features["Number"], "Plur");
        assert_eq!(morphology.features["Count"], "2");

        let card = project_card(&card_entry, Some(&token(LooseJson::Encoded("oops".into()))));
        assert!(card.morphology.unwrap().features.is_empty());
    }

    #[test]
    fn lookup_returns_stub_for_unknown_words() {
        let store = MemoryStore::new();
        let card = lookup_card(&store, &store, &LexemeKey::new("inconnu", "X")).unwrap();
        assert_eq!(card, LexemeCard::stub("inconnu", "X"));
    }

    #[test]
    fn lookup_projects_stored_entries() {
        let store = MemoryStore::new();
        store
            .put_lexeme(entry(Lexeme {
                definition: Some("cat".into()),
                ..Lexeme::default()
            }))
            .unwrap();
        let card = lookup_card(&store, &store, &LexemeKey::new("chat", "NOUN")).unwrap();
        assert_eq!(card.definition, "cat");
        assert_eq!(card.morphology, None);
    }
}
