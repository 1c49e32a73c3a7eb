//! Servidor web Axum com WebSocket para anotação por dicionário em tempo real

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::time::Instant;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use lookup_core::{
    Document, EntityAnnotator, EntityConfig, LookupPipeline, LookupResult, PipelineEvent,
    PresetEntities, Span, TokenizerMode,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "0.0.0.0:3000";

/// Estado compartilhado da aplicação
struct AppState {
    annotator: Arc<EntityAnnotator>,
}

impl AppState {
    /// Pipeline de uma requisição: entidades fixas (se houver) e o anotador.
    fn pipeline(&self, presets: &[PresetEntity]) -> LookupResult<LookupPipeline> {
        let mut pipeline = LookupPipeline::with_tokenizer_mode(TokenizerMode::Standard);
        if !presets.is_empty() {
            let stage = presets
                .iter()
                .fold(PresetEntities::new("preset"), |stage, p| {
                    stage.with_entity(p.start, p.end, p.label.clone())
                });
            pipeline.add_pipe(stage)?;
        }
        pipeline.add_pipe(Arc::clone(&self.annotator))?;
        Ok(pipeline)
    }
}

/// Entidade reconhecida por um estágio anterior, enviada pelo cliente
#[derive(Debug, Clone, Deserialize)]
struct PresetEntity {
    start: usize,
    end: usize,
    label: String,
}

#[derive(Deserialize)]
struct AnnotateRequest {
    text: String,
    #[serde(default)]
    entities: Vec<PresetEntity>,
}

#[derive(Serialize)]
struct EntityView {
    text: String,
    label: String,
    start: usize,
    end: usize,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Configuração de demonstração usada quando `LOOKUP_CONFIG` não está definida.
fn demo_config() -> EntityConfig {
    EntityConfig::new()
        .with_name("lugares")
        .with_label("GPE")
        .with_keywords("nyc", &["New York", "NYC"])
        .with_keywords("sp", &["São Paulo", "Sampa"])
        .with_keywords("rj", &["Rio de Janeiro"])
        .with_keywords_list(&["Recife", "Lisboa", "Berlin"])
}

fn load_config() -> LookupResult<EntityConfig> {
    match std::env::var_os("LOOKUP_CONFIG") {
        Some(path) => {
            let path = PathBuf::from(path);
            info!(path = %path.display(), "carregando configuração");
            EntityConfig::from_toml_file(&path)
        }
        None => {
            info!("LOOKUP_CONFIG ausente, usando dicionário de demonstração");
            Ok(demo_config())
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let annotator = match load_config().and_then(EntityAnnotator::new) {
        Ok(annotator) => annotator,
        Err(e) => {
            error!(error = %e, "falha ao construir o anotador");
            std::process::exit(1);
        }
    };
    let state = Arc::new(AppState {
        annotator: Arc::new(annotator),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/annotate", post(annotate_handler))
        .route("/ws", get(ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state);

    let addr = std::env::var("LOOKUP_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let addr: SocketAddr = match addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(%addr, error = %e, "endereço inválido em LOOKUP_ADDR");
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%addr, error = %e, "não foi possível abrir a porta");
            std::process::exit(1);
        }
    };
    info!("🚀 Servidor de anotação iniciado em http://{}", addr);
    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "servidor encerrado com erro");
    }
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "keywords": state.annotator.matcher().len(),
    }))
}

/// Anotação via HTTP POST (sem streaming)
async fn annotate_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnnotateRequest>,
) -> Response {
    if req.text.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Texto vazio");
    }

    let started = Instant::now();
    let annotator = &state.annotator;

    // Entidades fixas inválidas são erro do cliente aqui, não só um aviso
    let mut doc = Document::new(req.text.as_str());
    for preset in &req.entities {
        if let Err(e) = doc.add_entity(preset.start, preset.end, &preset.label) {
            return error_response(StatusCode::BAD_REQUEST, e.to_string());
        }
    }

    let pipeline = match state.pipeline(&[]) {
        Ok(pipeline) => pipeline,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    let doc = pipeline.process_doc(doc);

    let names = annotator.attrs();
    let tokens: Vec<Map<String, Value>> = doc
        .tokens()
        .iter()
        .map(|token| {
            let mut fields = Map::new();
            fields.insert("text".into(), json!(token.text));
            fields.insert("start".into(), json!(token.start));
            fields.insert("end".into(), json!(token.end));
            fields.insert(names.is_entity.clone(), json!(annotator.is_entity(&doc, token)));
            fields.insert(names.entity_desc.clone(), json!(annotator.entity_desc(token)));
            fields.insert(names.canonical.clone(), json!(annotator.canonical(&doc, token)));
            fields
        })
        .collect();

    let view = |span: &Span| EntityView {
        text: doc.span_text(span).to_string(),
        label: span.label.clone(),
        start: span.start_char,
        end: span.end_char,
    };

    let ents: Vec<EntityView> = doc.ents().iter().map(view).collect();
    let overlap: Vec<EntityView> = annotator.overlap(&doc).iter().map(view).collect();
    let processing_ms = started.elapsed().as_millis() as u64;
    info!(
        tokens = doc.len(),
        ents = ents.len(),
        processing_ms,
        "documento anotado via HTTP"
    );

    // Atributos de documento saem sob os nomes registrados no anotador
    let mut response = Map::new();
    response.insert("tokens".into(), json!(tokens));
    response.insert("ents".into(), json!(ents));
    response.insert(names.overlap.clone(), json!(overlap));
    response.insert(
        names.has_entities.clone(),
        json!(annotator.has_entities(&doc, doc.tokens())),
    );
    response.insert(
        names.entities.clone(),
        json!(annotator.iter_entities(&doc, doc.tokens())),
    );
    response.insert("processing_ms".into(), json!(processing_ms));
    response.insert("total_tokens".into(), json!(doc.len()));
    Json(Value::Object(response)).into_response()
}

/// Upgrade HTTP → WebSocket
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Recebe texto, executa o pipeline e envia cada evento como JSON
async fn handle_websocket(mut socket: WebSocket, state: Arc<AppState>) {
    info!("WebSocket conectado");

    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(text) => {
                // JSON {text, entities} ou texto puro
                let req = serde_json::from_str::<AnnotateRequest>(&text).unwrap_or_else(|_| {
                    AnnotateRequest {
                        text: text.to_string(),
                        entities: Vec::new(),
                    }
                });
                if req.text.trim().is_empty() {
                    continue;
                }

                let pipeline = match state.pipeline(&req.entities) {
                    Ok(pipeline) => pipeline,
                    Err(e) => {
                        warn!(error = %e, "pipeline inválido");
                        continue;
                    }
                };
                info!("Anotando via WebSocket: {} bytes", req.text.len());

                // O pipeline é síncrono: roda fora do runtime
                let (tx, rx) = mpsc::channel::<PipelineEvent>();
                let handle = tokio::task::spawn_blocking(move || {
                    pipeline.process_streaming(&req.text, tx);
                });
                if let Err(e) = handle.await {
                    error!(error = %e, "falha no pipeline");
                    continue;
                }

                let events: Vec<PipelineEvent> = rx.try_iter().collect();
                for event in &events {
                    match serde_json::to_string(event) {
                        Ok(json) => {
                            if socket.send(Message::Text(json)).await.is_err() {
                                return; // cliente desconectou
                            }
                        }
                        Err(e) => warn!(error = %e, "evento não serializável"),
                    }
                }
            }
            Message::Close(_) => {
                info!("WebSocket desconectado");
                return;
            }
            Message::Ping(payload) => {
                let _ = socket.send(Message::Pong(payload)).await;
            }
            _ => {}
        }
    }
}
