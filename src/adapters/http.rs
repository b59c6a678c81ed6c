//! HTTP 傳輸層：上傳、下載、進度 WebSocket 與健康檢查。

use crate::config::Delivery;
use crate::core::etl::ExportEngine;
use crate::core::progress::{ObserverSlot, ProgressMessage, ProgressReporter};
use crate::core::{AttributeLookup, ExportOutput, Storage};
use crate::adapters::storage::LocalStorage;
use crate::utils::error::{ExportError, Result};
use crate::utils::validation::validate_file_name;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        DefaultBodyLimit, Multipart, Path, State,
    },
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// 進度訊息在單一連線上的緩衝數量，滿了就丟棄
const PROGRESS_BUFFER: usize = 64;

const UPLOAD_FIELD: &str = "file";

pub struct AppState<L: AttributeLookup> {
    pub engine: Arc<ExportEngine<L>>,
    pub observers: Arc<ObserverSlot>,
    pub storage: LocalStorage,
    pub delivery: Delivery,
    pub public_url: String,
    pub shutdown: CancellationToken,
}

impl<L: AttributeLookup> Clone for AppState<L> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            observers: self.observers.clone(),
            storage: self.storage.clone(),
            delivery: self.delivery,
            public_url: self.public_url.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<L: AttributeLookup> AppState<L> {
    pub fn new(
        engine: ExportEngine<L>,
        storage: LocalStorage,
        delivery: Delivery,
        public_url: String,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            engine: Arc::new(engine),
            observers: Arc::new(ObserverSlot::new()),
            storage,
            delivery,
            public_url,
            shutdown,
        }
    }
}

impl IntoResponse for ExportError {
    fn into_response(self) -> Response {
        let status = match &self {
            ExportError::InputMissing
            | ExportError::DecodeMalformed { .. }
            | ExportError::NoMatchingRecords
            | ExportError::EncodeEmpty => StatusCode::BAD_REQUEST,
            ExportError::RunInProgress => StatusCode::CONFLICT,
            ExportError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(serde_json::json!({
                "code": self.code(),
                "message": self.user_friendly_message(),
            })),
        )
            .into_response()
    }
}

fn attachment(file_name: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        body,
    )
        .into_response()
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "club-export",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// 取出 multipart 中的 `file` 欄位
async fn read_upload(multipart: &mut Multipart) -> Result<(String, axum::body::Bytes)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ExportError::decode(format!("invalid upload: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let name = field.file_name().unwrap_or("upload.csv").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ExportError::decode(format!("invalid upload: {}", e)))?;
        if data.is_empty() {
            return Err(ExportError::InputMissing);
        }
        return Ok((name, data));
    }
    Err(ExportError::InputMissing)
}

async fn deliver<L: AttributeLookup>(state: &AppState<L>, output: ExportOutput) -> Result<Response> {
    match state.delivery {
        Delivery::Inline => Ok(attachment(&output.file_name, output.body)),
        Delivery::Stored => {
            state
                .storage
                .write_file(&output.file_name, &output.body)
                .await?;
            tracing::info!("💾 Stored {}", output.file_name);
            Ok(Json(serde_json::json!({
                "message": format!("CSV file with expired customers created: {}", output.file_name),
                "fileName": output.file_name,
                "downloadUrl": format!("{}/download/{}", state.public_url, output.file_name),
            }))
            .into_response())
        }
    }
}

async fn upload<L: AttributeLookup + 'static>(
    State(state): State<AppState<L>>,
    mut multipart: Multipart,
) -> Result<Response> {
    let (name, data) = read_upload(&mut multipart).await?;
    tracing::info!("📤 Received upload {} ({} bytes)", name, data.len());

    // 請求被放棄（連線中斷或服務關閉）時，guard 釋放即取消這次執行
    let cancel = state.shutdown.child_token();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let progress = ProgressReporter::new(state.observers.clone());
    let output = state
        .engine
        .run(Cursor::new(data), &progress, &cancel)
        .await?;

    deliver(&state, output).await
}

async fn download<L: AttributeLookup + 'static>(
    State(state): State<AppState<L>>,
    Path(filename): Path<String>,
) -> Response {
    if validate_file_name("filename", &filename).is_err() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "code": "invalid_file_name",
                "message": "Invalid file name.",
            })),
        )
            .into_response();
    }

    match state.storage.read_file(&filename).await {
        Ok(body) => attachment(&filename, body),
        Err(ExportError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "code": "not_found",
                "message": "File not found.",
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn progress_socket<L: AttributeLookup + 'static>(
    State(state): State<AppState<L>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| observe(socket, state.observers, state.shutdown))
}

/// 連線期間持有 sender；連線結束時釋放，slot 內的弱參考隨之失效
async fn observe(mut socket: WebSocket, observers: Arc<ObserverSlot>, shutdown: CancellationToken) {
    let (tx, mut rx) = mpsc::channel::<ProgressMessage>(PROGRESS_BUFFER);
    observers.attach(&tx);
    tracing::info!("🔌 Progress observer connected");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            update = rx.recv() => {
                let Some(update) = update else { break };
                let Ok(text) = serde_json::to_string(&update) else { continue };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => tracing::debug!("Received: {}", text),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    drop(tx);
    tracing::info!("🔌 Progress observer disconnected");
}

pub fn create_router<L: AttributeLookup + 'static>(state: AppState<L>, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .expose_headers([header::CONTENT_DISPOSITION]);

    Router::new()
        .route("/", get(progress_socket::<L>))
        .route("/health", get(health))
        .route("/upload", post(upload::<L>))
        .route("/download/:filename", get(download::<L>))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve<L: AttributeLookup + 'static>(
    state: AppState<L>,
    addr: SocketAddr,
    max_upload_bytes: usize,
) -> Result<()> {
    let shutdown = state.shutdown.clone();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("🚀 HTTP server running on http://{}", addr);
    tracing::info!("📤 Upload:   POST /upload");
    tracing::info!("📡 Progress: ws://{}/", addr);

    axum::serve(listener, create_router(state, max_upload_bytes))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}
