//! # Anotador de Entidades por Dicionário
//!
//! Estágio do pipeline que procura palavras-chave no texto do documento e as
//! transforma em entidades **sem tocar nas entidades que estágios anteriores
//! já reconheceram**.
//!
//! ## Algoritmo (uma passada por documento)
//!
//! 1. O [`Matcher`] percorre o texto e devolve matches brutos (canônica,
//!    início, fim), já disjuntos entre si.
//! 2. Se houve algum match, guarda o texto de cada entidade existente.
//! 3. Calcula a cobertura "vista" dos tokens das entidades existentes
//!    (ver [`OverlapMode`]).
//! 4. Para cada match, na ordem do matcher:
//!    - sem alinhamento com tokens → descartado (nada muda);
//!    - algum token coberto → vai para a lista `overlap` da camada;
//!    - mesmo texto de uma entidade existente → descartado ou registrado em
//!      `overlap`, conforme [`DuplicateTextPolicy`];
//!    - caso contrário → aceito: cada token recebe `is_entity = true` e a
//!      forma canônica.
//! 5. Os spans aceitos são acrescentados ao fim de `ents`.
//! 6. Só então cada span aceito é fundido em um único token. Fundir antes
//!    mudaria os índices dos tokens e contaminaria as decisões dos matches
//!    seguintes da mesma passada.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use lookup_core::{Document, EntityAnnotator, EntityConfig};
//!
//! let config = EntityConfig::new()
//!     .with_label("GPE")
//!     .with_keywords("nyc", &["New York"]);
//! let annotator = EntityAnnotator::new(config).unwrap();
//!
//! let doc = annotator.annotate(Document::new("I live in New York City"));
//! let mentions = annotator.iter_entities(&doc, doc.tokens());
//! assert_eq!(mentions.len(), 1);
//! assert_eq!(mentions[0].text, "New York");
//! assert_eq!(mentions[0].canonical.as_deref(), Some("nyc"));
//! ```
//!
//! O texto do documento nunca é reescrito: uma segunda passada com o mesmo
//! matcher reencontra os mesmos matches, que agora caem sobre tokens de
//! entidade e vão para `overlap`.

use std::collections::HashSet;
use std::sync::mpsc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::{Attribute, AttributeNames, DuplicateTextPolicy, EntityConfig, OverlapMode};
use crate::doc::{Document, Span, TokenEntity};
use crate::error::LookupResult;
use crate::matcher::{KeywordMatcher, Matcher};
use crate::pipeline::{emit, PipelineComponent, PipelineEvent};
use crate::tokenizer::Token;

/// Entidade encontrada numa sequência de tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMention {
    /// Texto do token
    pub text: String,
    /// Posição do token na sequência consultada
    pub index: usize,
    pub canonical: Option<String>,
}

/// Valor devolvido ao consultar um atributo pelo nome registrado.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Bool(bool),
    Text(String),
    Canonical(Option<String>),
    Entities(Vec<EntityMention>),
    Spans(Vec<Span>),
}

/// Anotador de entidades por dicionário.
///
/// Imutável depois de construído: pode ser compartilhado entre threads, cada
/// uma processando o seu próprio documento.
pub struct EntityAnnotator<M = KeywordMatcher> {
    name: String,
    label: String,
    attrs: AttributeNames,
    overlap_mode: OverlapMode,
    duplicate_text: DuplicateTextPolicy,
    matcher: M,
}

impl EntityAnnotator<KeywordMatcher> {
    /// Valida os atributos, carrega as palavras-chave e constrói o matcher.
    pub fn new(config: EntityConfig) -> LookupResult<Self> {
        let attrs = config.attribute_names()?;
        let keywords = config.keyword_set()?;
        let matcher = KeywordMatcher::build(&keywords, config.case_sensitive)?;
        Ok(Self::assemble(config, attrs, matcher))
    }
}

impl<M: Matcher> EntityAnnotator<M> {
    /// Usa um matcher já construído; as fontes de palavras-chave e
    /// `case_sensitive` da configuração são ignoradas.
    pub fn with_matcher(config: EntityConfig, matcher: M) -> LookupResult<Self> {
        let attrs = config.attribute_names()?;
        Ok(Self::assemble(config, attrs, matcher))
    }

    fn assemble(config: EntityConfig, attrs: AttributeNames, matcher: M) -> Self {
        Self {
            name: config.name,
            label: config.label,
            attrs,
            overlap_mode: config.overlap_mode,
            duplicate_text: config.duplicate_text,
            matcher,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn attrs(&self) -> &AttributeNames {
        &self.attrs
    }

    pub fn matcher(&self) -> &M {
        &self.matcher
    }

    /// Anota o documento e o devolve para o próximo estágio.
    pub fn annotate(&self, doc: Document) -> Document {
        self.annotate_inner(doc, None)
    }

    /// Igual a [`annotate`](Self::annotate), emitindo um evento por decisão.
    pub fn annotate_streaming(&self, doc: Document, tx: &mpsc::Sender<PipelineEvent>) -> Document {
        self.annotate_inner(doc, Some(tx))
    }

    fn annotate_inner(&self, mut doc: Document, tx: Option<&mpsc::Sender<PipelineEvent>>) -> Document {
        doc.layer_mut(&self.name);

        let matches = self.matcher.extract(doc.text());
        if matches.is_empty() {
            emit(tx, PipelineEvent::TokensMerged { merged: 0, total_tokens: doc.len() });
            return doc;
        }

        let known_texts: HashSet<String> = doc
            .ents()
            .iter()
            .map(|ent| doc.span_text(ent).to_string())
            .collect();
        let seen = Seen::build(&doc, self.overlap_mode);

        let mut accepted: Vec<Span> = Vec::new();
        let mut overlapping = 0usize;

        for raw in &matches {
            emit(tx, PipelineEvent::MatchFound {
                canonical: raw.canonical.clone(),
                start: raw.start,
                end: raw.end,
            });

            let span = match doc.char_span(raw.start, raw.end, &self.label) {
                Some(span) => span,
                None => {
                    trace!(start = raw.start, end = raw.end, "match sem alinhamento com tokens");
                    emit(tx, PipelineEvent::AlignmentSkipped {
                        canonical: raw.canonical.clone(),
                        start: raw.start,
                        end: raw.end,
                    });
                    continue;
                }
            };

            let text = doc.span_text(&span).to_string();
            let is_spanned = doc.span_tokens(&span).iter().any(|t| seen.covers(t));
            let is_duplicate = known_texts.contains(&text);

            if !is_spanned && !is_duplicate {
                debug!(%text, canonical = %raw.canonical, "entidade aceita");
                let tokens: Vec<Token> = doc.span_tokens(&span).to_vec();
                let layer = doc.layer_mut(&self.name);
                for token in &tokens {
                    layer.set_token(
                        token,
                        TokenEntity {
                            is_entity: true,
                            canonical: Some(raw.canonical.clone()),
                        },
                    );
                }
                emit(tx, PipelineEvent::SpanAccepted {
                    text,
                    canonical: raw.canonical.clone(),
                    start: span.start_char,
                    end: span.end_char,
                    tokens: span.len(),
                });
                accepted.push(span);
            } else if is_spanned {
                debug!(%text, "match sobrepõe entidade existente");
                emit(tx, PipelineEvent::SpanOverlapping {
                    text,
                    start: span.start_char,
                    end: span.end_char,
                });
                doc.layer_mut(&self.name).push_overlap(span);
                overlapping += 1;
            } else {
                let recorded = self.duplicate_text == DuplicateTextPolicy::Overlap;
                debug!(%text, recorded, "match repete o texto de uma entidade existente");
                emit(tx, PipelineEvent::DuplicateText {
                    text,
                    start: span.start_char,
                    end: span.end_char,
                    recorded,
                });
                if recorded {
                    doc.layer_mut(&self.name).push_overlap(span);
                }
            }
        }

        let merged = accepted.len();
        doc.extend_ents(accepted.iter().cloned());
        doc.merge_spans(&accepted);

        debug!(
            annotator = %self.name,
            matches = matches.len(),
            accepted = merged,
            overlapping,
            "documento anotado"
        );
        emit(tx, PipelineEvent::TokensMerged { merged, total_tokens: doc.len() });
        doc
    }

    /// Verdadeiro se algum token da sequência é entidade deste anotador.
    pub fn has_entities(&self, doc: &Document, tokens: &[Token]) -> bool {
        tokens.iter().any(|t| self.is_entity(doc, t))
    }

    /// Entidades da sequência, em ordem, com a posição relativa de cada token.
    pub fn iter_entities(&self, doc: &Document, tokens: &[Token]) -> Vec<EntityMention> {
        tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| self.is_entity(doc, t))
            .map(|(index, t)| EntityMention {
                text: t.text.clone(),
                index,
                canonical: self.canonical(doc, t).map(str::to_string),
            })
            .collect()
    }

    /// Descrição da entidade: por enquanto, o próprio texto do token.
    pub fn entity_desc(&self, token: &Token) -> String {
        token.text.clone()
    }

    pub fn is_entity(&self, doc: &Document, token: &Token) -> bool {
        self.token_entity(doc, token).map_or(false, |e| e.is_entity)
    }

    pub fn canonical<'d>(&self, doc: &'d Document, token: &Token) -> Option<&'d str> {
        self.token_entity(doc, token)
            .and_then(|e| e.canonical.as_deref())
    }

    /// Spans rejeitados por sobreposição neste documento.
    pub fn overlap<'d>(&self, doc: &'d Document) -> &'d [Span] {
        doc.layer(&self.name).map_or(&[], |layer| layer.overlap())
    }

    fn token_entity<'d>(&self, doc: &'d Document, token: &Token) -> Option<&'d TokenEntity> {
        doc.layer(&self.name).and_then(|layer| layer.token(token))
    }

    /// Atributo de documento pelo nome registrado (`has_entities`,
    /// `entities` ou `overlap`).
    pub fn doc_attr(&self, doc: &Document, name: &str) -> Option<AttrValue> {
        match self.attrs.resolve(name)? {
            Attribute::HasEntities => Some(AttrValue::Bool(self.has_entities(doc, doc.tokens()))),
            Attribute::Entities => Some(AttrValue::Entities(self.iter_entities(doc, doc.tokens()))),
            Attribute::Overlap => Some(AttrValue::Spans(self.overlap(doc).to_vec())),
            _ => None,
        }
    }

    /// Atributo de span pelo nome registrado (`has_entities` ou `entities`).
    pub fn span_attr(&self, doc: &Document, span: &Span, name: &str) -> Option<AttrValue> {
        let tokens = doc.span_tokens(span);
        match self.attrs.resolve(name)? {
            Attribute::HasEntities => Some(AttrValue::Bool(self.has_entities(doc, tokens))),
            Attribute::Entities => Some(AttrValue::Entities(self.iter_entities(doc, tokens))),
            _ => None,
        }
    }

    /// Atributo de token pelo nome registrado (`is_entity`, `entity_desc` ou
    /// `canonical`).
    pub fn token_attr(&self, doc: &Document, token: &Token, name: &str) -> Option<AttrValue> {
        match self.attrs.resolve(name)? {
            Attribute::IsEntity => Some(AttrValue::Bool(self.is_entity(doc, token))),
            Attribute::EntityDesc => Some(AttrValue::Text(self.entity_desc(token))),
            Attribute::Canonical => Some(AttrValue::Canonical(
                self.canonical(doc, token).map(str::to_string),
            )),
            _ => None,
        }
    }
}

impl<M: Matcher> PipelineComponent for EntityAnnotator<M> {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, doc: Document) -> Document {
        self.annotate(doc)
    }

    fn process_streaming(&self, doc: Document, tx: &mpsc::Sender<PipelineEvent>) -> Document {
        self.annotate_streaming(doc, tx)
    }
}

/// Cobertura dos tokens das entidades existentes.
enum Seen {
    /// Offsets marcados de `início` a `fim` inclusive
    Offsets(HashSet<usize>),
    /// Intervalos semiabertos, ordenados e disjuntos
    Ranges(Vec<(usize, usize)>),
}

impl Seen {
    fn build(doc: &Document, mode: OverlapMode) -> Self {
        let entity_tokens = doc.ents().iter().flat_map(|ent| doc.span_tokens(ent));
        match mode {
            OverlapMode::LegacyInclusive => {
                Seen::Offsets(entity_tokens.flat_map(|t| t.start..=t.end).collect())
            }
            OverlapMode::Interval => {
                let mut ranges: Vec<(usize, usize)> =
                    entity_tokens.map(|t| (t.start, t.end)).collect();
                ranges.sort_unstable();
                Seen::Ranges(ranges)
            }
        }
    }

    fn covers(&self, token: &Token) -> bool {
        match self {
            Seen::Offsets(seen) => seen.contains(&token.start) && seen.contains(&token.end),
            Seen::Ranges(ranges) => {
                // Primeiro intervalo que termina depois do início do token
                let i = ranges.partition_point(|&(_, end)| end <= token.start);
                ranges.get(i).map_or(false, |&(start, _)| start < token.end)
            }
        }
    }
}
