//! # Pipeline: Estágios em Sequência com Eventos Observáveis
//!
//! O pipeline tokeniza o texto, cria o [`Document`] e o passa, por posse
//! única, por cada componente na ordem em que foram adicionados. Cada
//! componente devolve o documento modificado para o próximo.
//!
//! Opcionalmente, os componentes emitem [`PipelineEvent`]s por um canal
//! (`mpsc`), permitindo que o servidor WebSocket transmita cada decisão do
//! anotador em tempo real.
//!
//! Documentos diferentes são independentes: [`LookupPipeline::pipe`] processa
//! um lote em paralelo com `rayon`, compartilhando o pipeline por referência.

use std::sync::{mpsc, Arc};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::doc::{Document, Span};
use crate::error::{LookupError, LookupResult};
use crate::tokenizer::{Token, TokenizerMode};

/// Eventos emitidos durante o processamento de um documento.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PipelineEvent {
    /// **Passo 1**: Tokenização concluída.
    TokenizationDone { tokens: Vec<Token>, total: usize },
    /// Um componente começou a processar o documento.
    ComponentStarted { name: String },
    /// O matcher encontrou uma palavra-chave.
    MatchFound { canonical: String, start: usize, end: usize },
    /// O match não coincide com fronteiras de token e foi descartado.
    AlignmentSkipped { canonical: String, start: usize, end: usize },
    /// O match virou entidade.
    SpanAccepted {
        text: String,
        canonical: String,
        start: usize,
        end: usize,
        /// Quantos tokens serão fundidos
        tokens: usize,
    },
    /// O match sobrepõe uma entidade existente e foi para `overlap`.
    SpanOverlapping { text: String, start: usize, end: usize },
    /// O match repete o texto de uma entidade existente.
    DuplicateText {
        text: String,
        start: usize,
        end: usize,
        /// Se foi registrado em `overlap`
        recorded: bool,
    },
    /// Os spans aceitos foram fundidos.
    TokensMerged { merged: usize, total_tokens: usize },
    /// **Conclusão**: todos os componentes rodaram.
    Done {
        entities: Vec<Span>,
        total_tokens: usize,
        processing_ms: u64,
    },
}

pub(crate) fn emit(tx: Option<&mpsc::Sender<PipelineEvent>>, event: PipelineEvent) {
    if let Some(tx) = tx {
        // Receptor fechado não interrompe o processamento
        let _ = tx.send(event);
    }
}

/// Um estágio do pipeline.
pub trait PipelineComponent: Send + Sync {
    /// Nome único do componente no pipeline.
    fn name(&self) -> &str;

    fn process(&self, doc: Document) -> Document;

    fn process_streaming(&self, doc: Document, _tx: &mpsc::Sender<PipelineEvent>) -> Document {
        self.process(doc)
    }
}

/// Um componente compartilhado também é um componente.
impl<C: PipelineComponent + ?Sized> PipelineComponent for Arc<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn process(&self, doc: Document) -> Document {
        (**self).process(doc)
    }

    fn process_streaming(&self, doc: Document, tx: &mpsc::Sender<PipelineEvent>) -> Document {
        (**self).process_streaming(doc, tx)
    }
}

/// Estágio que adiciona entidades fixas por intervalo de bytes.
///
/// Simula um reconhecedor anterior. Entidades que não alinham com tokens ou
/// sobrepõem outra entidade são descartadas com um aviso.
#[derive(Debug, Clone)]
pub struct PresetEntities {
    name: String,
    entities: Vec<(usize, usize, String)>,
}

impl PresetEntities {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entities: Vec::new(),
        }
    }

    pub fn with_entity(mut self, start: usize, end: usize, label: impl Into<String>) -> Self {
        self.entities.push((start, end, label.into()));
        self
    }
}

impl PipelineComponent for PresetEntities {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, mut doc: Document) -> Document {
        for (start, end, label) in &self.entities {
            if let Err(e) = doc.add_entity(*start, *end, label) {
                warn!(component = %self.name, error = %e, "entidade descartada");
            }
        }
        doc
    }
}

/// O pipeline de anotação.
pub struct LookupPipeline {
    tokenizer_mode: TokenizerMode,
    components: Vec<Box<dyn PipelineComponent>>,
}

impl LookupPipeline {
    pub fn new() -> Self {
        Self::with_tokenizer_mode(TokenizerMode::Standard)
    }

    pub fn with_tokenizer_mode(tokenizer_mode: TokenizerMode) -> Self {
        Self {
            tokenizer_mode,
            components: Vec::new(),
        }
    }

    /// Adiciona um componente ao fim do pipeline.
    pub fn add_pipe(&mut self, component: impl PipelineComponent + 'static) -> LookupResult<()> {
        if self.components.iter().any(|c| c.name() == component.name()) {
            return Err(LookupError::DuplicateComponent {
                name: component.name().to_string(),
            });
        }
        self.components.push(Box::new(component));
        Ok(())
    }

    pub fn component_names(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.name()).collect()
    }

    /// Tokeniza o texto sem rodar nenhum componente.
    pub fn make_doc(&self, text: &str) -> Document {
        Document::with_mode(text, self.tokenizer_mode)
    }

    pub fn process(&self, text: &str) -> Document {
        self.process_doc(self.make_doc(text))
    }

    /// Passa um documento já criado por todos os componentes.
    pub fn process_doc(&self, doc: Document) -> Document {
        self.components
            .iter()
            .fold(doc, |doc, component| component.process(doc))
    }

    /// Processa um lote em paralelo, preservando a ordem de entrada.
    pub fn pipe<S: AsRef<str> + Sync>(&self, texts: &[S]) -> Vec<Document> {
        texts
            .par_iter()
            .map(|text| self.process(text.as_ref()))
            .collect()
    }

    /// Executa o pipeline enviando eventos de progresso pelo canal.
    ///
    /// # Fluxo de Eventos
    /// 1. `TokenizationDone`
    /// 2. por componente: `ComponentStarted` seguido dos eventos do componente
    /// 3. `Done`
    pub fn process_streaming(&self, text: &str, tx: mpsc::Sender<PipelineEvent>) -> Document {
        let doc = self.make_doc(text);
        self.process_doc_streaming(doc, tx)
    }

    pub fn process_doc_streaming(&self, doc: Document, tx: mpsc::Sender<PipelineEvent>) -> Document {
        let start = Instant::now();

        let _ = tx.send(PipelineEvent::TokenizationDone {
            tokens: doc.tokens().to_vec(),
            total: doc.len(),
        });

        let mut doc = doc;
        for component in &self.components {
            let _ = tx.send(PipelineEvent::ComponentStarted {
                name: component.name().to_string(),
            });
            doc = component.process_streaming(doc, &tx);
        }

        let processing_ms = start.elapsed().as_millis() as u64;
        debug!(tokens = doc.len(), entities = doc.ents().len(), processing_ms, "pipeline concluído");
        let _ = tx.send(PipelineEvent::Done {
            entities: doc.ents().to_vec(),
            total_tokens: doc.len(),
            processing_ms,
        });
        doc
    }
}

impl Default for LookupPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EntityConfig;
    use crate::entity::EntityAnnotator;

    fn city_pipeline() -> LookupPipeline {
        let mut pipeline = LookupPipeline::new();
        pipeline
            .add_pipe(PresetEntities::new("ner").with_entity(0, 4, "PER"))
            .unwrap();
        let config = EntityConfig::new()
            .with_name("cidades")
            .with_label("GPE")
            .with_keywords_list(&["Recife", "Lula"]);
        pipeline.add_pipe(EntityAnnotator::new(config).unwrap()).unwrap();
        pipeline
    }

    #[test]
    fn test_pipeline_runs_components_in_order() {
        let pipeline = city_pipeline();
        assert_eq!(pipeline.component_names(), vec!["ner", "cidades"]);

        let doc = pipeline.process("Lula visitou Recife");
        let labels: Vec<&str> = doc.ents().iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["PER", "GPE"]);
    }

    #[test]
    fn test_duplicate_component_name() {
        let mut pipeline = city_pipeline();
        let err = pipeline.add_pipe(PresetEntities::new("ner")).unwrap_err();
        assert!(matches!(err, LookupError::DuplicateComponent { .. }));
    }

    #[test]
    fn test_preset_entities_skip_invalid() {
        let mut pipeline = LookupPipeline::new();
        pipeline
            .add_pipe(
                PresetEntities::new("ner")
                    .with_entity(0, 2, "X")
                    .with_entity(0, 4, "PER")
                    .with_entity(0, 4, "PER"),
            )
            .unwrap();
        let doc = pipeline.process("Lula visitou Recife");
        assert_eq!(doc.ents().len(), 1);
    }

    #[test]
    fn test_pipe_preserves_order() {
        let pipeline = city_pipeline();
        let texts = vec!["Lula em Recife", "sem nomes", "Recife"];
        let docs = pipeline.pipe(&texts);
        assert_eq!(docs.len(), 3);
        for (doc, text) in docs.iter().zip(&texts) {
            assert_eq!(doc.text(), *text);
        }
        assert_eq!(docs[0].ents().len(), 2);
        assert!(docs[1].ents().is_empty());
        // "Recife" ocupa [0, 6) e o preset [0, 4) não alinha: descartado
        assert_eq!(docs[2].ents().len(), 1);
    }

    #[test]
    fn test_pipeline_events_streaming() {
        let pipeline = city_pipeline();
        let (tx, rx) = mpsc::channel();
        pipeline.process_streaming("Lula visitou Recife", tx);

        let events: Vec<PipelineEvent> = rx.try_iter().collect();
        assert!(
            matches!(&events[0], PipelineEvent::TokenizationDone { total: 3, .. }),
            "Primeiro evento deve ser TokenizationDone"
        );
        assert!(events
            .iter()
            .any(|e| matches!(e, PipelineEvent::SpanAccepted { text, .. } if text == "Recife")));
        assert!(events
            .iter()
            .any(|e| matches!(e, PipelineEvent::SpanOverlapping { text, .. } if text == "Lula")));
        assert!(
            matches!(events.last(), Some(PipelineEvent::Done { total_tokens: 3, .. })),
            "Último evento deve ser Done"
        );
    }

    #[test]
    fn test_shared_component() {
        let config = EntityConfig::new().with_keywords_list(&["Recife"]);
        let annotator = Arc::new(EntityAnnotator::new(config).unwrap());

        let mut first = LookupPipeline::new();
        first.add_pipe(Arc::clone(&annotator)).unwrap();
        let mut second = LookupPipeline::new();
        second.add_pipe(Arc::clone(&annotator)).unwrap();

        assert_eq!(first.process("Recife").ents().len(), 1);
        assert_eq!(second.process("em Recife").ents().len(), 1);
        assert_eq!(second.component_names(), vec!["entity"]);
    }

    #[test]
    fn test_events_serialize_as_tagged_json() {
        let accepted = PipelineEvent::SpanAccepted {
            text: "Recife".into(),
            canonical: "Recife".into(),
            start: 13,
            end: 19,
            tokens: 1,
        };
        let json = serde_json::to_value(&accepted).unwrap();
        assert_eq!(json["type"], "SpanAccepted");
        assert_eq!(json["data"]["text"], "Recife");
        assert_eq!(json["data"]["start"], 13);
        assert_eq!(json["data"]["tokens"], 1);

        let doc = city_pipeline().process("Lula visitou Recife");
        let done = PipelineEvent::Done {
            entities: doc.ents().to_vec(),
            total_tokens: doc.len(),
            processing_ms: 2,
        };
        let json = serde_json::to_value(&done).unwrap();
        assert_eq!(json["type"], "Done");
        assert_eq!(json["data"]["total_tokens"], 3);
        assert_eq!(json["data"]["entities"][1]["label"], "GPE");
        assert_eq!(json["data"]["entities"][1]["start_char"], 13);

        let back: PipelineEvent = serde_json::from_value(json).unwrap();
        assert!(matches!(back, PipelineEvent::Done { total_tokens: 3, .. }));
    }

    #[test]
    fn test_pipeline_empty() {
        let pipeline = city_pipeline();
        let doc = pipeline.process("");
        assert!(doc.is_empty());
        assert!(doc.ents().is_empty());
    }
}
