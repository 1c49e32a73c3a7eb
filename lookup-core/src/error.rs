//! # Erros do anotador
//!
//! Um único enum cobre as falhas possíveis: configuração inválida (fatal na
//! construção), leitura do arquivo de palavras-chave, construção do autômato
//! e violações do contrato do documento quando um estágio anterior adiciona
//! entidades.
//!
//! Matches que não alinham com fronteiras de token **não** são erros: são
//! descartados individualmente durante a anotação.

use std::path::PathBuf;

use thiserror::Error;

/// Erros que podem ocorrer ao configurar ou usar o pipeline de lookup.
#[derive(Debug, Error)]
pub enum LookupError {
    /// Configuração de atributos ou do anotador inválida.
    #[error("configuração inválida: {message}")]
    Configuration { message: String },

    /// Falha ao ler o arquivo de palavras-chave; nenhum matcher parcial é criado.
    #[error("falha ao ler arquivo de palavras-chave {}: {source}", path.display())]
    KeywordFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// O autômato Aho-Corasick não pôde ser construído.
    #[error("falha ao construir o matcher: {message}")]
    MatcherBuild { message: String },

    /// O documento TOML de configuração não pôde ser interpretado.
    #[error("falha ao interpretar configuração: {message}")]
    ConfigParse { message: String },

    /// O intervalo não coincide com fronteiras de token.
    #[error("intervalo {start}..{end} não alinha com fronteiras de token")]
    Misaligned { start: usize, end: usize },

    /// A entidade sobrepõe outra entidade já presente no documento.
    #[error("entidade {start}..{end} sobrepõe uma entidade existente")]
    OverlappingEntity { start: usize, end: usize },

    /// Já existe um componente com este nome no pipeline.
    #[error("componente duplicado no pipeline: {name}")]
    DuplicateComponent { name: String },
}

impl LookupError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        LookupError::Configuration {
            message: message.into(),
        }
    }
}

/// Alias de resultado para as operações do crate.
pub type LookupResult<T> = Result<T, LookupError>;
