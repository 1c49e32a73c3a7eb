//! # Configuração do Anotador
//!
//! [`EntityConfig`] reúne tudo que o anotador precisa na construção: nome,
//! rótulo, modo de caixa, os seis nomes de atributo e as fontes de
//! palavras-chave. Pode ser montada em código ou lida de TOML:
//!
//! ```toml
//! name = "cidades"
//! label = "GPE"
//! case_sensitive = false
//! keywords_list = ["Brasília", "Recife"]
//! keywords_file = "cidades.txt"   # relativo ao arquivo TOML
//! overlap_mode = "interval"       # ou "legacy_inclusive"
//! duplicate_text = "ignore"       # ou "overlap"
//!
//! [keywords_dict]
//! nyc = ["New York", "NYC"]
//! ```
//!
//! A configuração é imutável durante a vida do anotador.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LookupError, LookupResult};
use crate::keywords::KeywordSet;

/// Nomes padrão dos seis atributos, na ordem esperada.
pub const DEFAULT_ATTRS: [&str; 6] = [
    "has_entities",
    "is_entity",
    "entity_desc",
    "entities",
    "canonical",
    "overlap",
];

/// Como decidir se um match sobrepõe uma entidade existente.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapMode {
    /// Interseção real entre o intervalo de cada token do match e o intervalo
    /// de cada token das entidades existentes.
    Interval,
    /// Marca como "visto" todo offset de `início` até `fim` **inclusive** de
    /// cada token de entidade; um token do match sobrepõe quando seu início e
    /// seu fim estão ambos marcados. Pode rejeitar tokens apenas adjacentes.
    LegacyInclusive,
}

impl Default for OverlapMode {
    fn default() -> Self {
        OverlapMode::Interval
    }
}

/// Destino de um match cujo texto já é o texto de uma entidade existente
/// (sem sobrepor nenhuma).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateTextPolicy {
    /// Descarta em silêncio: não vira entidade nem entra em `overlap`.
    Ignore,
    /// Registra o span na lista de `overlap`.
    Overlap,
}

impl Default for DuplicateTextPolicy {
    fn default() -> Self {
        DuplicateTextPolicy::Ignore
    }
}

/// Operação à qual cada nome de atributo está ligado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    HasEntities,
    IsEntity,
    EntityDesc,
    Entities,
    Canonical,
    Overlap,
}

/// Os seis nomes sob os quais o anotador expõe seus resultados.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeNames {
    pub has_entities: String,
    pub is_entity: String,
    pub entity_desc: String,
    pub entities: String,
    pub canonical: String,
    pub overlap: String,
}

impl AttributeNames {
    /// Valida e distribui os nomes na ordem de [`DEFAULT_ATTRS`].
    ///
    /// Exige exatamente seis nomes, não vazios e distintos.
    pub fn from_slice<S: AsRef<str>>(names: &[S]) -> LookupResult<Self> {
        if names.len() != 6 {
            return Err(LookupError::configuration(format!(
                "são necessários 6 nomes de atributo, recebidos {}",
                names.len()
            )));
        }
        let mut seen = HashSet::new();
        for name in names {
            let name = name.as_ref();
            if name.trim().is_empty() {
                return Err(LookupError::configuration("nome de atributo vazio"));
            }
            if !seen.insert(name) {
                return Err(LookupError::configuration(format!(
                    "nome de atributo duplicado: {}",
                    name
                )));
            }
        }
        let name = |i: usize| names[i].as_ref().to_string();
        Ok(Self {
            has_entities: name(0),
            is_entity: name(1),
            entity_desc: name(2),
            entities: name(3),
            canonical: name(4),
            overlap: name(5),
        })
    }

    /// Resolve um nome registrado para a operação correspondente.
    pub fn resolve(&self, name: &str) -> Option<Attribute> {
        [
            (&self.has_entities, Attribute::HasEntities),
            (&self.is_entity, Attribute::IsEntity),
            (&self.entity_desc, Attribute::EntityDesc),
            (&self.entities, Attribute::Entities),
            (&self.canonical, Attribute::Canonical),
            (&self.overlap, Attribute::Overlap),
        ]
        .into_iter()
        .find(|(registered, _)| registered.as_str() == name)
        .map(|(_, attr)| attr)
    }
}

impl Default for AttributeNames {
    fn default() -> Self {
        Self {
            has_entities: DEFAULT_ATTRS[0].to_string(),
            is_entity: DEFAULT_ATTRS[1].to_string(),
            entity_desc: DEFAULT_ATTRS[2].to_string(),
            entities: DEFAULT_ATTRS[3].to_string(),
            canonical: DEFAULT_ATTRS[4].to_string(),
            overlap: DEFAULT_ATTRS[5].to_string(),
        }
    }
}

/// Configuração completa de um [`EntityAnnotator`](crate::entity::EntityAnnotator).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EntityConfig {
    /// Identificador do anotador no pipeline
    pub name: String,
    /// Rótulo das entidades produzidas
    pub label: String,
    pub case_sensitive: bool,
    /// Os seis nomes de atributo (validados na construção do anotador)
    pub attrs: Vec<String>,
    pub keywords_list: Vec<String>,
    /// Forma canônica → variantes
    pub keywords_dict: BTreeMap<String, Vec<String>>,
    pub keywords_file: Option<PathBuf>,
    pub overlap_mode: OverlapMode,
    pub duplicate_text: DuplicateTextPolicy,
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            name: "entity".to_string(),
            label: String::new(),
            case_sensitive: false,
            attrs: DEFAULT_ATTRS.iter().map(|s| s.to_string()).collect(),
            keywords_list: Vec::new(),
            keywords_dict: BTreeMap::new(),
            keywords_file: None,
            overlap_mode: OverlapMode::default(),
            duplicate_text: DuplicateTextPolicy::default(),
        }
    }
}

impl EntityConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_attrs<S: AsRef<str>>(mut self, attrs: &[S]) -> Self {
        self.attrs = attrs.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    pub fn with_keywords_list<S: AsRef<str>>(mut self, keywords: &[S]) -> Self {
        self.keywords_list
            .extend(keywords.iter().map(|s| s.as_ref().to_string()));
        self
    }

    /// Adiciona variantes para uma forma canônica.
    pub fn with_keywords<S: AsRef<str>>(mut self, canonical: &str, variants: &[S]) -> Self {
        self.keywords_dict
            .entry(canonical.to_string())
            .or_default()
            .extend(variants.iter().map(|s| s.as_ref().to_string()));
        self
    }

    pub fn with_keywords_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.keywords_file = Some(path.into());
        self
    }

    pub fn with_overlap_mode(mut self, mode: OverlapMode) -> Self {
        self.overlap_mode = mode;
        self
    }

    pub fn with_duplicate_text(mut self, policy: DuplicateTextPolicy) -> Self {
        self.duplicate_text = policy;
        self
    }

    /// Lê a configuração de um documento TOML.
    pub fn from_toml_str(content: &str) -> LookupResult<Self> {
        toml::from_str(content).map_err(|e| LookupError::ConfigParse {
            message: e.to_string(),
        })
    }

    /// Lê a configuração de um arquivo TOML.
    ///
    /// Um `keywords_file` relativo é resolvido a partir do diretório do arquivo.
    pub fn from_toml_file(path: &Path) -> LookupResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| LookupError::ConfigParse {
            message: format!("{}: {}", path.display(), e),
        })?;
        let mut config = Self::from_toml_str(&content)?;
        if let (Some(file), Some(dir)) = (&config.keywords_file, path.parent()) {
            if file.is_relative() {
                config.keywords_file = Some(dir.join(file));
            }
        }
        Ok(config)
    }

    /// Nomes de atributo validados.
    pub fn attribute_names(&self) -> LookupResult<AttributeNames> {
        AttributeNames::from_slice(&self.attrs)
    }

    /// Junta todas as fontes de palavras-chave: lista, mapa e arquivo.
    pub fn keyword_set(&self) -> LookupResult<KeywordSet> {
        let mut set = KeywordSet::new();
        set.add_keywords_from_list(&self.keywords_list);
        set.add_keywords_from_dict(&self.keywords_dict);
        if let Some(path) = &self.keywords_file {
            set.add_keywords_from_file(path)?;
        }
        Ok(set)
    }
}
