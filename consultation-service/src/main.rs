use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::Json,
    routing::{get, post},
};
use consult_flow::InMemorySessionStorage;
use consultation_service::agents::{PatientContext, generator_from_env};
use consultation_service::{ConsultationManager, ConversationStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Clone)]
struct AppState {
    manager: Arc<ConsultationManager>,
}

#[derive(Debug, Deserialize)]
struct ExecuteRequest {
    session_id: Option<String>,
    content: String,
    patient_context: Option<PatientContext>,
}

#[derive(Debug, Serialize)]
struct ExecuteResponse {
    session_id: String,
    response: Option<String>,
    status: String,
}

/// Initialize structured tracing based on environment variables
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "consultation_service=debug,consult_flow=debug,tower_http=debug".into());

    match log_format.as_str() {
        "pretty" => {
            // Human-readable logging for development
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            // Structured JSON logging for production
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

/// Middleware to add a correlation ID to all requests
async fn correlation_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> axum::response::Response {
    let correlation_id = Uuid::new_v4().to_string();

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);

    next.run(request).instrument(span).await
}

#[tokio::main]
async fn main() {
    init_tracing();

    // Without an API key the service still runs, on template fallbacks alone
    let generator = generator_from_env();
    if generator.is_none() {
        warn!("OPENROUTER_API_KEY not set - running with template fallbacks only");
    }

    let session_storage = Arc::new(InMemorySessionStorage::new());
    let manager = Arc::new(ConsultationManager::new(generator, session_storage));

    let app_state = AppState { manager };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/execute", post(execute_turn))
        .route("/session/{id}", get(get_session_status))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(from_fn(correlation_id_middleware)),
        )
        .with_state(app_state);

    let bind_addr =
        std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %bind_addr, error = %e, "failed to bind listener");
            std::process::exit(1);
        }
    };

    info!("Consultation service running on http://{bind_addr}");

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "server error");
        std::process::exit(1);
    }
}

async fn health_check() -> &'static str {
    "OK"
}

async fn execute_turn(
    State(state): State<AppState>,
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<ExecuteResponse>, StatusCode> {
    let session_id_provided = request.session_id.is_some();
    let session_id = request
        .session_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    info!(
        session_id = %session_id,
        content_length = %request.content.len(),
        "processing consultation turn"
    );

    if session_id_provided {
        if Uuid::parse_str(&session_id).is_err() {
            error!(session_id = %session_id, "invalid session ID format");
            return Err(StatusCode::BAD_REQUEST);
        }

        match state.manager.session_exists(&session_id).await {
            Ok(true) => {}
            Ok(false) => {
                error!(session_id = %session_id, "session not found");
                return Err(StatusCode::NOT_FOUND);
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "failed to look up session");
                return Err(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }
    }

    let reply = match state
        .manager
        .process_message(&session_id, &request.content, request.patient_context)
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            error!(session_id = %session_id, error = %e, "failed to process message");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let status = if reply.completed {
        "Completed"
    } else {
        "WaitingForInput"
    };

    info!(session_id = %session_id, status = %status, "turn completed");

    Ok(Json(ExecuteResponse {
        session_id,
        response: Some(reply.content),
        status: status.to_string(),
    }))
}

async fn get_session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ConversationStatus>, StatusCode> {
    match state.manager.conversation_status(&session_id).await {
        Ok(Some(status)) => Ok(Json(status)),
        Ok(None) => {
            info!(session_id = %session_id, "session not found");
            Err(StatusCode::NOT_FOUND)
        }
        Err(e) => {
            error!(session_id = %session_id, error = %e, "failed to get session");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
