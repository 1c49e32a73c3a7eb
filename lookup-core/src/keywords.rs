//! # Fontes de Palavras-chave
//!
//! O dicionário do anotador pode vir de três fontes, combináveis entre si:
//!
//! 1. **Lista**: cada palavra-chave é a sua própria forma canônica.
//! 2. **Mapa**: forma canônica → lista de variantes de superfície.
//! 3. **Arquivo**: uma entrada por linha, `palavra` ou `palavra=>canônica`.
//!
//! Todas acabam no mesmo [`KeywordSet`], que depois alimenta o
//! [`KeywordMatcher`](crate::matcher::KeywordMatcher). Se a mesma palavra-chave
//! aparecer duas vezes, vale a última forma canônica informada.
//!
//! ## Formato do arquivo
//!
//! ```text
//! Brasil
//! Nova York=>nyc
//! NYC=>nyc
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{LookupError, LookupResult};

/// Separador entre palavra-chave e forma canônica no arquivo
pub const CANONICAL_SEPARATOR: &str = "=>";

/// Conjunto ordenado de pares (palavra-chave, forma canônica).
#[derive(Debug, Clone, Default)]
pub struct KeywordSet {
    entries: Vec<(String, String)>,
}

impl KeywordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adiciona uma palavra-chave. Entradas vazias (após `trim`) são ignoradas.
    pub fn add_keyword(&mut self, keyword: &str, canonical: &str) {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return;
        }
        self.entries.push((keyword.to_string(), canonical.trim().to_string()));
    }

    pub fn add_keywords_from_list<S: AsRef<str>>(&mut self, keywords: &[S]) {
        for keyword in keywords {
            let keyword = keyword.as_ref();
            self.add_keyword(keyword, keyword);
        }
    }

    /// Adiciona variantes agrupadas pela forma canônica.
    pub fn add_keywords_from_dict<S: AsRef<str>>(&mut self, dict: &BTreeMap<String, Vec<S>>) {
        for (canonical, variants) in dict {
            for variant in variants {
                self.add_keyword(variant.as_ref(), canonical);
            }
        }
    }

    /// Lê um arquivo de palavras-chave; falha de leitura é fatal.
    pub fn add_keywords_from_file(&mut self, path: &Path) -> LookupResult<()> {
        let content = fs::read_to_string(path).map_err(|source| LookupError::KeywordFile {
            path: path.to_path_buf(),
            source,
        })?;
        self.add_keywords_from_lines(&content);
        Ok(())
    }

    /// Interpreta linhas no formato do arquivo.
    pub fn add_keywords_from_lines(&mut self, content: &str) {
        for line in content.lines() {
            match line.split_once(CANONICAL_SEPARATOR) {
                Some((keyword, canonical)) => self.add_keyword(keyword, canonical),
                None => self.add_keyword(line, line),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, c)| (k.as_str(), c.as_str()))
    }
}
