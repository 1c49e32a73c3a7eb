//! # lookup-core: Anotação de Entidades por Dicionário
//!
//! Este crate implementa um estágio de pipeline que encontra, num documento já
//! tokenizado, frases conhecidas de um grande dicionário de palavras-chave e as
//! transforma em entidades, **sem perturbar as entidades que estágios
//! anteriores já reconheceram**.
//!
//! ## Arquitetura do Sistema
//!
//! 1.  **Entrada**: Texto bruto, tokenizado em um [`Document`] ([`tokenizer`], [`doc`]).
//! 2.  **Estágios anteriores**: Podem adicionar entidades ao documento (ex: [`PresetEntities`]).
//! 3.  **Matcher** ([`matcher`]): Aho-Corasick sobre o texto, respeitando fronteiras de
//!     palavra, devolve matches disjuntos `(canônica, início, fim)`.
//! 4.  **Anotador** ([`entity`]): Resolve conflitos com as entidades existentes, marca os
//!     tokens aceitos, acrescenta os spans a `ents` e funde cada um num único token.
//! 5.  **Saída**: O mesmo documento, modificado, pronto para o próximo estágio.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use lookup_core::{EntityAnnotator, EntityConfig, LookupPipeline, PresetEntities};
//!
//! let mut pipeline = LookupPipeline::new();
//! // Um reconhecedor anterior já marcou "New York City"
//! pipeline.add_pipe(PresetEntities::new("ner").with_entity(10, 23, "GPE")).unwrap();
//!
//! let config = EntityConfig::new()
//!     .with_label("GPE")
//!     .with_keywords("nyc", &["New York"]);
//! let annotator = EntityAnnotator::new(config).unwrap();
//! pipeline.add_pipe(annotator).unwrap();
//!
//! let doc = pipeline.process("I live in New York City");
//! // O match "New York" sobrepõe a entidade existente: nada é fundido
//! assert_eq!(doc.ents().len(), 1);
//! assert_eq!(doc.layer("entity").unwrap().overlap().len(), 1);
//! ```
//!
//! ## Módulos Principais
//!
//! - [`entity`]: O anotador e suas consultas (`has_entities`, `iter_entities`, ...).
//! - [`matcher`]: O contrato [`Matcher`] e o [`KeywordMatcher`].
//! - [`doc`]: Documento, spans, merge de tokens e camadas por anotador.
//! - [`config`]: Configuração em código ou TOML.
//! - [`pipeline`]: Sequência de estágios, lotes em paralelo e eventos.

pub mod config;
pub mod doc;
pub mod entity;
pub mod error;
pub mod keywords;
pub mod matcher;
pub mod pipeline;
pub mod tokenizer;

pub use config::{Attribute, AttributeNames, DuplicateTextPolicy, EntityConfig, OverlapMode};
pub use doc::{Document, EntityLayer, Span, TokenEntity};
pub use entity::{AttrValue, EntityAnnotator, EntityMention};
pub use error::{LookupError, LookupResult};
pub use keywords::KeywordSet;
pub use matcher::{KeywordMatcher, Matcher, RawMatch};
pub use pipeline::{LookupPipeline, PipelineComponent, PipelineEvent, PresetEntities};
pub use tokenizer::{Token, TokenizerMode};
