//! HTTP Server for the person registry.
//!
//! # API Endpoints
//!
//! | Method | Path                            | Description                        |
//! |--------|---------------------------------|------------------------------------|
//! | GET    | `/health`                       | Health check                       |
//! | GET    | `/api/pessoas`                  | List (`page`, `pageSize`, `search`)|
//! | POST   | `/api/pessoas`                  | Create                             |
//! | GET    | `/api/pessoas/{id}`             | Detail                             |
//! | PUT    | `/api/pessoas/{id}`             | Update                             |
//! | DELETE | `/api/pessoas/{id}`             | Delete                             |
//! | POST   | `/api/pessoas/import`           | Bulk import (multipart `file`)     |
//! | GET    | `/api/pessoas/import/template`  | Import template CSV                |
//! | POST   | `/api/pessoas/import/errors`    | Rejected rows of a result as CSV   |
//! | GET    | `/api/pessoas/export`           | All persons as CSV                 |
//! | GET    | `/api/logs`                     | SSE stream for import logs         |

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use super::logs::{log_info, LOG_BROADCASTER};
use super::types::{csv_attachment, DeletedResponse, ListParams};
use crate::config::Config;
use crate::error::{ServerError, ServerResult};
use crate::export::{export_error_rows, export_people, generate_template};
use crate::import::{import_bytes, ImportMode, ImportOptions, ImportResult};
use crate::models::{Person, PersonCreationRequest};
use crate::people::{Page, PersonService};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub people: PersonService,
}

/// Build the router.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/pessoas", get(list_people).post(create_person))
        .route("/api/pessoas/import", post(import_people))
        .route("/api/pessoas/import/template", get(download_template))
        .route("/api/pessoas/import/errors", post(download_error_rows))
        .route("/api/pessoas/export", get(download_export))
        .route(
            "/api/pessoas/{id}",
            get(get_person).put(update_person).delete(delete_person),
        )
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState {
        people: PersonService::in_memory(config.cache_ttl),
    };
    let app = router(state, config.max_upload_bytes);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    println!("🚀 Cadastro server running on http://localhost:{}", config.port);
    println!("   GET/POST        /api/pessoas");
    println!("   GET/PUT/DELETE  /api/pessoas/{{id}}");
    println!("   POST            /api/pessoas/import");
    println!("   GET             /api/pessoas/import/template");
    println!("   GET             /api/pessoas/export");
    println!("   GET             /api/logs  (SSE)");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "cadastro",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// =============================================================================
// CRUD
// =============================================================================

async fn list_people(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ServerResult<Json<Page<Person>>> {
    Ok(Json(state.people.list(&params.into()).await?))
}

async fn create_person(
    State(state): State<AppState>,
    Json(request): Json<PersonCreationRequest>,
) -> ServerResult<(StatusCode, Json<Person>)> {
    let person = state.people.create(request).await?;
    Ok((StatusCode::CREATED, Json(person)))
}

async fn get_person(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ServerResult<Json<Person>> {
    Ok(Json(state.people.get(id).await?))
}

async fn update_person(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PersonCreationRequest>,
) -> ServerResult<Json<Person>> {
    Ok(Json(state.people.update(id, request).await?))
}

async fn delete_person(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ServerResult<Json<DeletedResponse>> {
    state.people.delete(id).await?;
    Ok(Json(DeletedResponse {
        id: id.to_string(),
        deleted: true,
    }))
}

// =============================================================================
// Import / export
// =============================================================================

/// Upload fields of `POST /api/pessoas/import`
#[derive(Debug, Default)]
struct ImportUpload {
    file_name: Option<String>,
    bytes: Option<Vec<u8>>,
    partial: Option<bool>,
}

async fn read_upload(mut multipart: Multipart) -> ServerResult<ImportUpload> {
    let mut upload = ImportUpload::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                upload.file_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                upload.bytes = Some(bytes.to_vec());
            }
            "partialImport" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                upload.partial = Some(parse_flag(&text)?);
            }
            _ => {}
        }
    }

    Ok(upload)
}

fn parse_flag(text: &str) -> ServerResult<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "" | "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" => Ok(false),
        other => Err(ServerError::BadRequest(format!(
            "partialImport must be true or false, got '{}'",
            other
        ))),
    }
}

/// Bulk import. A file that cannot be read at all answers 400 with the
/// same result shape (one line-0 error).
async fn import_people(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ServerResult<Response> {
    let upload = read_upload(multipart).await?;
    let bytes = upload
        .bytes
        .ok_or_else(|| ServerError::BadRequest("No file provided".to_string()))?;

    let options = ImportOptions {
        mode: ImportMode::from_partial_flag(upload.partial.unwrap_or(true)),
    };

    println!("\n{}", "=".repeat(70));
    println!(
        "📄 NEW IMPORT: {} ({} bytes, {:?})",
        upload.file_name.as_deref().unwrap_or("unknown"),
        bytes.len(),
        options.mode
    );
    println!("{}\n", "=".repeat(70));

    let result = import_bytes(&bytes, upload.file_name.as_deref(), options, &state.people).await;

    let status = if result.is_fatal() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    Ok((status, Json(result)).into_response())
}

async fn download_template() -> ServerResult<Response> {
    let bytes = generate_template()?;
    Ok(csv_attachment("modelo_importacao_pessoas.csv", bytes))
}

async fn download_error_rows(Json(result): Json<ImportResult>) -> ServerResult<Response> {
    let bytes = export_error_rows(&result)?;
    Ok(csv_attachment("pessoas_com_erros.csv", bytes))
}

async fn download_export(State(state): State<AppState>) -> ServerResult<Response> {
    let people = state.people.all().await?;
    log_info(format!("📤 Exporting {} persons", people.len()));
    let bytes = export_people(&people)?;
    Ok(csv_attachment("pessoas.csv", bytes))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        // Lagged subscriber: skip what was missed
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
