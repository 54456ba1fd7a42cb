use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, Sse},
        IntoResponse, Redirect,
    },
    routing::{get, post},
    Json, Router,
};
use coscribe_editor::Operation;
use coscribe_workspace::{DocumentHub, DocumentId, SessionId};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tower_http::cors::CorsLayer;

struct AppState {
    hub: DocumentHub,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut port: u16 = 3002;
    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    port = args[i + 1].parse().expect("Invalid port number");
                    i += 2;
                } else {
                    eprintln!("--port requires a value");
                    std::process::exit(1);
                }
            }
            "--help" | "-h" => {
                println!("Usage: coscribe-server [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -p, --port <PORT>   HTTP port to listen on (default: 3002)");
                println!("  -h, --help          Show this help message");
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                std::process::exit(1);
            }
        }
    }

    let state = Arc::new(AppState {
        hub: DocumentHub::new(),
    });

    let app = Router::new()
        .route("/", get(new_document))
        .route("/documents/:id", get(get_document))
        .route("/documents/:id/events", get(document_events))
        .route("/documents/:id/changes", post(submit_changes))
        .with_state(state)
        .layer(CorsLayer::permissive());

    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("coscribe hub listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// No document in the URL: mint a fresh one and redirect.
async fn new_document() -> Redirect {
    Redirect::temporary(&format!("/documents/{}", DocumentId::random()))
}

async fn get_document(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    match DocumentId::parse(&id) {
        Ok(id) => Json(state.hub.open(id)).into_response(),
        Err(_) => (StatusCode::BAD_REQUEST, "invalid document id").into_response(),
    }
}

/// SSE stream of everything broadcast in the room.
async fn document_events(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, StatusCode> {
    let id = DocumentId::parse(&id).map_err(|_| StatusCode::BAD_REQUEST)?;
    let rx = state.hub.subscribe(id);
    let stream = BroadcastStream::new(rx).filter_map(|envelope| {
        let envelope = envelope.ok()?;
        let data = serde_json::to_string(&envelope.message).ok()?;
        Some(Ok(Event::default().event("receive-changes").data(data)))
    });
    Ok(Sse::new(stream))
}

#[derive(Deserialize)]
struct ChangeSubmission {
    session: SessionId,
    operations: Vec<Operation>,
}

async fn submit_changes(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(submission): Json<ChangeSubmission>,
) -> impl IntoResponse {
    match DocumentId::parse(&id) {
        Ok(id) => {
            let applied =
                state
                    .hub
                    .apply_and_broadcast(id, submission.session, submission.operations);
            Json(serde_json::json!({ "applied": applied })).into_response()
        }
        Err(_) => (StatusCode::BAD_REQUEST, "invalid document id").into_response(),
    }
}
