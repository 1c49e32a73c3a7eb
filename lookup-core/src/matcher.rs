//! # Matcher de Palavras-chave (Aho-Corasick)
//!
//! Localiza no texto todas as ocorrências das palavras-chave do dicionário e
//! devolve uma lista de [`RawMatch`] **sem sobreposição entre si**.
//!
//! ## Regras de casamento
//!
//! - Só valem ocorrências em fronteira de palavra: o caractere anterior ao
//!   início e o caractere no fim (quando existem) não podem ser alfanuméricos
//!   nem `_`. Assim "York" não casa dentro de "Yorkshire".
//! - Conflitos são resolvidos da esquerda para a direita, preferindo o match
//!   mais longo ("New York City" vence "New York" quando ambos existem).
//! - No modo sem distinção de maiúsculas, texto e palavras-chave passam pela
//!   mesma dobra de caixa caractere a caractere, que preserva o tamanho em
//!   bytes: os offsets devolvidos sempre apontam para o texto original.
//!
//! O [`EntityAnnotator`](crate::entity::EntityAnnotator) depende apenas do
//! trait [`Matcher`], o que permite trocar o motor de busca.

use std::collections::BTreeMap;

use aho_corasick::{AhoCorasick, MatchKind};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{LookupError, LookupResult};
use crate::keywords::KeywordSet;

/// Uma ocorrência bruta: forma canônica e intervalo de bytes semiaberto.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMatch {
    pub canonical: String,
    pub start: usize,
    pub end: usize,
}

/// Motor de busca consumido pelo anotador.
///
/// Implementações devem devolver matches mutuamente disjuntos, em ordem de
/// posição, e uma lista vazia para texto vazio.
pub trait Matcher: Send + Sync {
    fn extract(&self, text: &str) -> Vec<RawMatch>;
}

/// Matcher de dicionário construído uma única vez e somente leitura depois.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    /// `None` quando o dicionário está vazio
    automaton: Option<AhoCorasick>,
    /// Palavras-chave já dobradas, na ordem dos padrões do autômato
    keywords: Vec<String>,
    canonicals: Vec<String>,
    case_sensitive: bool,
}

impl KeywordMatcher {
    /// Constrói o autômato a partir do conjunto de palavras-chave.
    pub fn build(set: &KeywordSet, case_sensitive: bool) -> LookupResult<Self> {
        // Última forma canônica vence para palavras repetidas
        let mut unique: BTreeMap<String, String> = BTreeMap::new();
        for (keyword, canonical) in set.iter() {
            let key = if case_sensitive {
                keyword.to_string()
            } else {
                fold_case(keyword)
            };
            unique.insert(key, canonical.to_string());
        }

        let (keywords, canonicals): (Vec<String>, Vec<String>) = unique.into_iter().unzip();

        let automaton = if keywords.is_empty() {
            None
        } else {
            let ac = AhoCorasick::builder()
                .match_kind(MatchKind::Standard)
                .build(&keywords)
                .map_err(|e| LookupError::MatcherBuild {
                    message: e.to_string(),
                })?;
            Some(ac)
        };

        info!(
            keywords = keywords.len(),
            case_sensitive, "matcher de palavras-chave construído"
        );

        Ok(Self {
            automaton,
            keywords,
            canonicals,
            case_sensitive,
        })
    }

    /// Número de palavras-chave distintas.
    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.canonical_of(keyword).is_some()
    }

    /// Forma canônica de uma palavra-chave, respeitando o modo de caixa.
    pub fn canonical_of(&self, keyword: &str) -> Option<&str> {
        let key = if self.case_sensitive {
            keyword.trim().to_string()
        } else {
            fold_case(keyword.trim())
        };
        self.keywords
            .binary_search(&key)
            .ok()
            .map(|i| self.canonicals[i].as_str())
    }
}

impl Matcher for KeywordMatcher {
    fn extract(&self, text: &str) -> Vec<RawMatch> {
        let automaton = match &self.automaton {
            Some(a) => a,
            None => return vec![],
        };
        if text.is_empty() {
            return vec![];
        }

        let folded;
        let haystack = if self.case_sensitive {
            text
        } else {
            folded = fold_case(text);
            folded.as_str()
        };

        // Todas as ocorrências em fronteira de palavra: (início, fim, padrão)
        let mut candidates: Vec<(usize, usize, usize)> = automaton
            .find_overlapping_iter(haystack)
            .filter(|m| is_word_bounded(text, m.start(), m.end()))
            .map(|m| (m.start(), m.end(), m.pattern().as_usize()))
            .collect();

        // Mais à esquerda primeiro; no mesmo início, o mais longo
        candidates.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(&a.1)));

        let mut matches = Vec::new();
        let mut last_end = 0;
        for (start, end, pattern) in candidates {
            if start < last_end {
                continue;
            }
            last_end = end;
            matches.push(RawMatch {
                canonical: self.canonicals[pattern].clone(),
                start,
                end,
            });
        }
        matches
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_word_bounded(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.map_or(false, is_word_char) && !after.map_or(false, is_word_char)
}

/// Minúsculas caractere a caractere, mantendo o tamanho em bytes de cada um.
///
/// Caracteres cuja forma minúscula mudaria de tamanho ficam como estão.
pub fn fold_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        let mut lower = c.to_lowercase();
        match (lower.next(), lower.next()) {
            (Some(l), None) if l.len_utf8() == c.len_utf8() => out.push(l),
            _ => out.push(c),
        }
    }
    out
}
