//! # Documento, Spans e Camadas de Anotação
//!
//! O [`Document`] é o substrato que cada estágio do pipeline recebe, modifica
//! e repassa adiante (posse única, sem compartilhamento mutável). Ele guarda:
//!
//! - o texto original, que **nunca** é reescrito;
//! - a sequência de tokens, sempre contígua e indexada `0..n`;
//! - as entidades já reconhecidas (`ents`), em ordem de inserção;
//! - uma [`EntityLayer`] por anotador, com os atributos de token
//!   (`is_entity`, `canonical`) e a lista de spans rejeitados por sobreposição.
//!
//! ## Primitivas usadas pelo anotador
//!
//! - [`Document::char_span`]: mapeia um intervalo de bytes para a sequência de
//!   tokens que o cobre exatamente, ou `None` se cortaria algum token.
//! - [`Document::merge_spans`]: funde cada span em um único token, em lote,
//!   reindexando todos os spans guardados no documento.
//!
//! ```rust
//! use lookup_core::Document;
//!
//! let mut doc = Document::new("I live in New York City");
//! let span = doc.char_span(10, 18, "GPE").unwrap();
//! assert_eq!(doc.span_text(&span), "New York");
//!
//! doc.merge_spans(&[span]);
//! assert_eq!(doc.tokens()[3].text, "New York");
//! assert_eq!(doc.len(), 5);
//! ```

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{LookupError, LookupResult};
use crate::tokenizer::{tokenize_with_mode, Token, TokenizerMode};

/// Um intervalo contíguo de tokens com um rótulo.
///
/// Os índices de token são semiabertos (`start..end`); os offsets de byte
/// (`start_char..end_char`) apontam para o texto do documento e não mudam
/// quando o documento é retokenizado.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Índice do token inicial (inclusivo)
    pub start: usize,
    /// Índice do token final (exclusivo)
    pub end: usize,
    /// Offset de byte inicial no texto
    pub start_char: usize,
    /// Offset de byte final no texto (exclusivo)
    pub end_char: usize,
    /// Rótulo da entidade (ex: "GPE", "ORG")
    pub label: String,
}

impl Span {
    /// Número de tokens cobertos.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Verifica se os dois spans compartilham algum byte do texto.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start_char < other.end_char && other.start_char < self.end_char
    }
}

/// Atributos de token escritos por um anotador.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntity {
    pub is_entity: bool,
    pub canonical: Option<String>,
}

/// Resultado de um anotador sobre um documento.
///
/// Os atributos de token são indexados pelo offset inicial do token: depois de
/// um merge, o token fundido começa no mesmo offset do primeiro token do span
/// e herda seus atributos.
#[derive(Debug, Clone, Default)]
pub struct EntityLayer {
    tokens: BTreeMap<usize, TokenEntity>,
    overlap: Vec<Span>,
}

impl EntityLayer {
    /// Atributos do token, se o anotador escreveu algum.
    pub fn token(&self, token: &Token) -> Option<&TokenEntity> {
        self.tokens.get(&token.start)
    }

    pub fn set_token(&mut self, token: &Token, value: TokenEntity) {
        self.tokens.insert(token.start, value);
    }

    /// Spans rejeitados por sobreposição, em ordem de descoberta.
    pub fn overlap(&self) -> &[Span] {
        &self.overlap
    }

    pub fn push_overlap(&mut self, span: Span) {
        self.overlap.push(span);
    }
}

/// Documento tokenizado que atravessa o pipeline.
#[derive(Debug, Clone)]
pub struct Document {
    text: String,
    tokens: Vec<Token>,
    ents: Vec<Span>,
    layers: BTreeMap<String, EntityLayer>,
}

impl Document {
    /// Cria o documento tokenizando com o modo padrão.
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_mode(text, TokenizerMode::Standard)
    }

    pub fn with_mode(text: impl Into<String>, mode: TokenizerMode) -> Self {
        let text = text.into();
        let tokens = tokenize_with_mode(&text, mode);
        Self {
            text,
            tokens,
            ents: Vec::new(),
            layers: BTreeMap::new(),
        }
    }

    /// Cria o documento a partir de offsets produzidos por outro tokenizador.
    ///
    /// Os intervalos precisam ser não vazios, ordenados, disjuntos e cair em
    /// fronteiras de caractere.
    pub fn from_offsets(text: impl Into<String>, offsets: &[(usize, usize)]) -> LookupResult<Self> {
        let text = text.into();
        let mut tokens = Vec::with_capacity(offsets.len());
        let mut last_end = 0;

        for (index, &(start, end)) in offsets.iter().enumerate() {
            let valid = start < end
                && start >= last_end
                && end <= text.len()
                && text.is_char_boundary(start)
                && text.is_char_boundary(end);
            if !valid {
                return Err(LookupError::Misaligned { start, end });
            }
            tokens.push(Token {
                text: text[start..end].to_string(),
                start,
                end,
                index,
            });
            last_end = end;
        }

        Ok(Self {
            text,
            tokens,
            ents: Vec::new(),
            layers: BTreeMap::new(),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Número de tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Entidades do documento, na ordem em que foram adicionadas.
    pub fn ents(&self) -> &[Span] {
        &self.ents
    }

    /// Tokens cobertos pelo span.
    pub fn span_tokens(&self, span: &Span) -> &[Token] {
        let end = span.end.min(self.tokens.len());
        let start = span.start.min(end);
        &self.tokens[start..end]
    }

    /// Texto coberto pelo span; vazio se os offsets não são válidos no texto.
    pub fn span_text(&self, span: &Span) -> &str {
        self.text.get(span.start_char..span.end_char).unwrap_or("")
    }

    /// Constrói o span que cobre exatamente `start..end` (bytes).
    ///
    /// Retorna `None` se o intervalo for vazio, sair do texto ou não coincidir
    /// com início e fim de tokens.
    pub fn char_span(&self, start: usize, end: usize, label: &str) -> Option<Span> {
        if start >= end || end > self.text.len() {
            return None;
        }
        let first = self.tokens.binary_search_by_key(&start, |t| t.start).ok()?;
        let last = self.tokens.binary_search_by_key(&end, |t| t.end).ok()?;
        if last < first {
            return None;
        }
        Some(Span {
            start: first,
            end: last + 1,
            start_char: start,
            end_char: end,
            label: label.to_string(),
        })
    }

    /// Adiciona uma entidade reconhecida por um estágio anterior.
    pub fn add_entity(&mut self, start: usize, end: usize, label: &str) -> LookupResult<()> {
        let span = self
            .char_span(start, end, label)
            .ok_or(LookupError::Misaligned { start, end })?;
        if self.ents.iter().any(|ent| ent.overlaps(&span)) {
            return Err(LookupError::OverlappingEntity { start, end });
        }
        self.ents.push(span);
        Ok(())
    }

    /// Acrescenta spans ao fim de `ents`, preservando os existentes.
    ///
    /// Os spans precisam estar alinhados e não sobrepor nenhuma entidade; fora
    /// do anotador, use [`add_entity`](Self::add_entity).
    pub(crate) fn extend_ents(&mut self, spans: impl IntoIterator<Item = Span>) {
        self.ents.extend(spans);
    }

    /// Camada de um anotador, se ele já processou este documento.
    pub fn layer(&self, name: &str) -> Option<&EntityLayer> {
        self.layers.get(name)
    }

    pub fn layer_mut(&mut self, name: &str) -> &mut EntityLayer {
        self.layers.entry(name.to_string()).or_default()
    }

    /// Funde cada span em um único token.
    ///
    /// Todos os merges de uma passada são aplicados de uma vez; spans que se
    /// sobrepõem a um span anterior da lista são ignorados. Fundir um span de
    /// um único token não altera nada.
    ///
    /// Depois do merge, `ents` e as listas de `overlap` de todas as camadas são
    /// recalculados a partir dos offsets de byte. Uma borda que cai dentro de um
    /// token fundido é alargada até os limites desse token, de modo que
    /// `span_tokens` e `span_text` continuam cobrindo o mesmo trecho.
    pub fn merge_spans(&mut self, spans: &[Span]) {
        let mut ranges: Vec<(usize, usize)> = spans
            .iter()
            .filter(|s| s.len() > 1 && s.end <= self.tokens.len())
            .map(|s| (s.start, s.end))
            .collect();
        if ranges.is_empty() {
            return;
        }
        ranges.sort_unstable();

        let old_tokens = std::mem::take(&mut self.tokens);
        let mut merged = Vec::with_capacity(old_tokens.len());
        let mut pending = ranges.into_iter().peekable();
        let mut i = 0;

        while i < old_tokens.len() {
            // Descarta ranges já engolidos por um merge anterior
            while pending.peek().map_or(false, |&(start, _)| start < i) {
                pending.next();
            }
            let index = merged.len();
            match pending.peek().copied() {
                Some((start, end)) if start == i => {
                    let first = &old_tokens[start];
                    let last = &old_tokens[end - 1];
                    merged.push(Token {
                        text: self.text[first.start..last.end].to_string(),
                        start: first.start,
                        end: last.end,
                        index,
                    });
                    pending.next();
                    i = end;
                }
                _ => {
                    let mut token = old_tokens[i].clone();
                    token.index = index;
                    merged.push(token);
                    i += 1;
                }
            }
        }
        self.tokens = merged;

        let tokens = &self.tokens;
        self.ents.iter_mut().for_each(|span| realign(tokens, span));

        let starts: HashSet<usize> = tokens.iter().map(|t| t.start).collect();
        for layer in self.layers.values_mut() {
            layer.overlap.iter_mut().for_each(|span| realign(tokens, span));
            layer.tokens.retain(|offset, _| starts.contains(offset));
        }
    }
}

/// Recalcula o span sobre os tokens atuais a partir dos seus offsets de byte.
fn realign(tokens: &[Token], span: &mut Span) {
    let first = tokens.partition_point(|t| t.end <= span.start_char);
    let last = tokens.partition_point(|t| t.start < span.end_char);
    if first >= last {
        return;
    }
    span.start = first;
    span.end = last;
    span.start_char = tokens[first].start;
    span.end_char = tokens[last - 1].end;
}
