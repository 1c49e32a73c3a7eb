//! Testes de ponta a ponta da API pública do anotador.

use std::fs;
use std::sync::Arc;

use lookup_core::{
    AttrValue, Document, DuplicateTextPolicy, EntityAnnotator, EntityConfig, EntityMention,
    LookupPipeline, OverlapMode, PresetEntities,
};

fn nyc_annotator() -> EntityAnnotator {
    let config = EntityConfig::new()
        .with_label("GPE")
        .with_keywords("nyc", &["New York"]);
    EntityAnnotator::new(config).unwrap()
}

fn city_annotator() -> EntityAnnotator {
    let config = EntityConfig::new()
        .with_name("cidades")
        .with_label("GPE")
        .with_keywords_list(&["Recife"])
        .with_keywords("sp", &["São Paulo"]);
    EntityAnnotator::new(config).unwrap()
}

#[test]
fn test_new_york_is_annotated_and_merged() {
    let annotator = nyc_annotator();
    let doc = annotator.annotate(Document::new("I live in New York City"));

    let texts: Vec<&str> = doc.tokens().iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, vec!["I", "live", "in", "New York", "City"]);

    assert_eq!(doc.ents().len(), 1);
    let ent = &doc.ents()[0];
    assert_eq!((ent.start, ent.end), (3, 4));
    assert_eq!(doc.span_text(ent), "New York");
    assert_eq!(ent.label, "GPE");

    let merged = &doc.tokens()[3];
    assert!(annotator.is_entity(&doc, merged));
    assert_eq!(annotator.canonical(&doc, merged), Some("nyc"));
    assert!(!annotator.is_entity(&doc, &doc.tokens()[4]));

    assert_eq!(
        annotator.iter_entities(&doc, doc.tokens()),
        vec![EntityMention {
            text: "New York".to_string(),
            index: 3,
            canonical: Some("nyc".to_string()),
        }]
    );
    assert!(annotator.overlap(&doc).is_empty());
}

#[test]
fn test_existing_entity_blocks_match() {
    let annotator = nyc_annotator();
    let mut doc = Document::new("I live in New York City");
    doc.add_entity(10, 23, "GPE").unwrap();

    let doc = annotator.annotate(doc);

    assert_eq!(doc.ents().len(), 1);
    assert_eq!(doc.span_text(&doc.ents()[0]), "New York City");
    assert_eq!(doc.len(), 6);
    assert!(!annotator.has_entities(&doc, doc.tokens()));

    let overlap = annotator.overlap(&doc);
    assert_eq!(overlap.len(), 1);
    assert_eq!(doc.span_text(&overlap[0]), "New York");
}

#[test]
fn test_empty_keyword_set_is_noop() {
    let annotator = EntityAnnotator::new(EntityConfig::new()).unwrap();
    assert!(annotator.matcher().is_empty());

    for text in ["", "I live in New York City", "Lula visitou Recife"] {
        let before = Document::new(text);
        let after = annotator.annotate(before.clone());
        assert_eq!(after.tokens(), before.tokens());
        assert_eq!(after.ents(), before.ents());
        assert!(!annotator.has_entities(&after, after.tokens()));
        assert!(annotator.overlap(&after).is_empty());
    }
}

#[test]
fn test_ents_are_append_only() {
    let annotator = city_annotator();
    let mut doc = Document::new("Lula visitou Recife e São Paulo");
    doc.add_entity(0, 4, "PER").unwrap();
    let prior = doc.ents()[0].clone();

    let doc = annotator.annotate(doc);

    let labels: Vec<&str> = doc.ents().iter().map(|e| e.label.as_str()).collect();
    assert_eq!(labels, vec!["PER", "GPE", "GPE"]);
    assert_eq!(doc.ents()[0], prior);
    assert_eq!(doc.span_text(&doc.ents()[1]), "Recife");
    assert_eq!(doc.span_text(&doc.ents()[2]), "São Paulo");
}

#[test]
fn test_merge_produces_one_token_per_span() {
    let annotator = city_annotator();
    let doc = annotator.annotate(Document::new("Lula visitou Recife e São Paulo"));

    assert_eq!(doc.len(), 5);
    for ent in doc.ents() {
        let tokens = doc.span_tokens(ent);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].text, doc.span_text(ent));
        assert!(annotator.is_entity(&doc, &tokens[0]));
    }
    let last = &doc.tokens()[4];
    assert_eq!(last.text, "São Paulo");
    assert_eq!(last.index, 4);
    assert_eq!(annotator.canonical(&doc, last), Some("sp"));
    assert_eq!(annotator.canonical(&doc, &doc.tokens()[2]), Some("Recife"));
}

#[test]
fn test_second_pass_adds_nothing() {
    let annotator = city_annotator();
    let once = annotator.annotate(Document::new("Recife e São Paulo"));
    let twice = annotator.annotate(once.clone());

    assert_eq!(twice.ents(), once.ents());
    assert_eq!(twice.tokens(), once.tokens());
    // Os matches reencontrados caem sobre as entidades da primeira passada
    assert_eq!(annotator.overlap(&twice).len(), 2);
}

#[test]
fn test_iter_entities_on_sub_sequence() {
    let annotator = city_annotator();
    let doc = annotator.annotate(Document::new("Lula visitou Recife e São Paulo"));

    let tail = &doc.tokens()[2..];
    let mentions = annotator.iter_entities(&doc, tail);
    let found: Vec<(&str, usize)> = mentions.iter().map(|m| (m.text.as_str(), m.index)).collect();
    assert_eq!(found, vec![("Recife", 0), ("São Paulo", 2)]);

    assert!(!annotator.has_entities(&doc, &doc.tokens()[..2]));
}

#[test]
fn test_duplicate_text_policies() {
    let text = "Recife e Recife";
    let config = EntityConfig::new().with_keywords_list(&["Recife"]);

    let mut doc = Document::new(text);
    doc.add_entity(0, 6, "GPE").unwrap();
    let ignore = EntityAnnotator::new(config.clone()).unwrap();
    let doc = ignore.annotate(doc);
    assert_eq!(doc.ents().len(), 1);
    assert_eq!(ignore.overlap(&doc).len(), 1);

    let mut doc = Document::new(text);
    doc.add_entity(0, 6, "GPE").unwrap();
    let record =
        EntityAnnotator::new(config.with_duplicate_text(DuplicateTextPolicy::Overlap)).unwrap();
    let doc = record.annotate(doc);
    assert_eq!(doc.ents().len(), 1);
    assert_eq!(record.overlap(&doc).len(), 2);
}

#[test]
fn test_both_overlap_modes_protect_existing_entities() {
    for mode in [OverlapMode::Interval, OverlapMode::LegacyInclusive] {
        let config = EntityConfig::new()
            .with_keywords("nyc", &["New York"])
            .with_overlap_mode(mode);
        let annotator = EntityAnnotator::new(config).unwrap();

        let mut doc = Document::new("I live in New York City");
        doc.add_entity(10, 23, "GPE").unwrap();
        let doc = annotator.annotate(doc);

        assert_eq!(doc.ents().len(), 1, "modo {:?}", mode);
        assert_eq!(annotator.overlap(&doc).len(), 1, "modo {:?}", mode);
    }
}

#[test]
fn test_named_attributes() {
    let config = EntityConfig::new()
        .with_name("paises")
        .with_attrs(&["tem_pais", "e_pais", "desc_pais", "paises", "codigo", "sobrepostos"])
        .with_keywords("BR", &["Brasil"]);
    let annotator = EntityAnnotator::new(config).unwrap();
    let doc = annotator.annotate(Document::new("O Brasil venceu"));

    assert_eq!(annotator.doc_attr(&doc, "tem_pais"), Some(AttrValue::Bool(true)));
    assert_eq!(annotator.doc_attr(&doc, "sobrepostos"), Some(AttrValue::Spans(vec![])));
    assert_eq!(annotator.doc_attr(&doc, "has_entities"), None);

    let token = &doc.tokens()[1];
    assert_eq!(
        annotator.token_attr(&doc, token, "codigo"),
        Some(AttrValue::Canonical(Some("BR".to_string())))
    );
    assert_eq!(
        annotator.token_attr(&doc, token, "desc_pais"),
        Some(AttrValue::Text("Brasil".to_string()))
    );

    let span = &doc.ents()[0];
    match annotator.span_attr(&doc, span, "paises") {
        Some(AttrValue::Entities(mentions)) => {
            assert_eq!(mentions.len(), 1);
            assert_eq!(mentions[0].index, 0);
        }
        other => panic!("atributo inesperado: {:?}", other),
    }
}

#[test]
fn test_shared_annotator_across_threads() {
    let annotator = city_annotator();
    let texts = ["Recife", "São Paulo e Recife", "nada", "Lula em São Paulo"];

    let counts: Vec<usize> = std::thread::scope(|scope| {
        let handles: Vec<_> = texts
            .iter()
            .map(|text| {
                let annotator = &annotator;
                scope.spawn(move || annotator.annotate(Document::new(*text)).ents().len())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(counts, vec![1, 2, 0, 1]);
}

#[test]
fn test_pipeline_with_shared_annotator() {
    let annotator = Arc::new(city_annotator());
    let mut pipeline = LookupPipeline::new();
    pipeline
        .add_pipe(PresetEntities::new("ner").with_entity(0, 4, "PER"))
        .unwrap();
    pipeline.add_pipe(Arc::clone(&annotator)).unwrap();

    let docs = pipeline.pipe(&["Lula visitou Recife", "Ana mora em São Paulo"]);
    assert_eq!(docs[0].ents().len(), 2);
    // "Ana " não alinha com [0, 4): só a cidade vira entidade
    assert_eq!(docs[1].ents().len(), 1);
    assert!(annotator.has_entities(&docs[1], docs[1].tokens()));
}

#[test]
fn test_config_from_toml_file_with_keywords_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("cidades.txt"), "Recife\nNova York=>nyc\n").unwrap();
    let config_path = dir.path().join("lookup.toml");
    fs::write(
        &config_path,
        r#"
name = "cidades"
label = "GPE"
keywords_file = "cidades.txt"
overlap_mode = "legacy_inclusive"
"#,
    )
    .unwrap();

    let config = EntityConfig::from_toml_file(&config_path).unwrap();
    assert_eq!(config.overlap_mode, OverlapMode::LegacyInclusive);
    let annotator = EntityAnnotator::new(config).unwrap();
    assert_eq!(annotator.matcher().len(), 2);

    let doc = annotator.annotate(Document::new("De Recife para nova york"));
    let mentions = annotator.iter_entities(&doc, doc.tokens());
    let canonicals: Vec<Option<&str>> = mentions.iter().map(|m| m.canonical.as_deref()).collect();
    assert_eq!(canonicals, vec![Some("Recife"), Some("nyc")]);
}
