//! HTTP research gateway built on axum.

use super::{AppState, SERVICE_NAME, SharedState};
use crate::config::MolarConfig;
use crate::error::{AuthError, MolarError, ResearchError, ValidationError};
use crate::research::{ProgressStreamer, ResearchEngine, ResearchRequest, ResearchResponse};
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use chrono::Utc;
use futures::StreamExt;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

/// Buffered progress events per stream.
const STREAM_BUFFER: usize = 32;

/// An error returned to HTTP clients as `{"detail": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Research(#[from] ResearchError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Research(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "detail": self.to_string() }));
        match self {
            Self::Auth(_) => {
                (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
            }
            _ => (status, body).into_response(),
        }
    }
}

/// CORS policy for the configured origins.
///
/// A `*` entry allows any origin without credentials. Otherwise only the
/// listed origins are allowed, with credentials and mirrored methods and headers.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

/// Build an axum Router with the health, research, and streaming routes.
pub fn router(state: SharedState) -> Router {
    let cors = cors_layer(&state.origins);
    Router::new()
        .route("/health", get(health_handler))
        .route("/research", post(research_handler))
        .route("/research/professional", post(professional_handler))
        .route("/research/stream", post(stream_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint.
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Authenticate, then parse and validate the body. Auth always runs first.
fn accept(
    state: &AppState,
    headers: &HeaderMap,
    body: Result<Json<ResearchRequest>, JsonRejection>,
) -> Result<ResearchRequest, ApiError> {
    state.auth.check_headers(headers).inspect_err(|e| {
        debug!(error = %e, "Rejected unauthenticated request");
    })?;
    let Json(request) = body.map_err(|rejection| ValidationError::MalformedBody {
        message: rejection.body_text(),
    })?;
    request.validate()?;
    Ok(request)
}

async fn conduct(state: &AppState, request: ResearchRequest) -> Result<ResearchResponse, ApiError> {
    let span = info_span!("research", request_id = %Uuid::new_v4());
    async {
        info!(
            topic = %request.topic,
            report_type = request.report_type.as_str(),
            sources = request.sources_count,
            "Research request"
        );
        let result = state.orchestrator.run(&request).await?;
        Ok::<_, ApiError>(ResearchResponse::from_result(&request, result))
    }
    .instrument(span)
    .await
}

async fn research_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Result<Json<ResearchRequest>, JsonRejection>,
) -> Result<Json<ResearchResponse>, ApiError> {
    let request = accept(&state, &headers, body)?;
    conduct(&state, request).await.map(Json)
}

/// Same as `/research` after the professional rewrite of the request.
async fn professional_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Result<Json<ResearchRequest>, JsonRejection>,
) -> Result<Json<ResearchResponse>, ApiError> {
    let request = accept(&state, &headers, body)?.into_professional();
    conduct(&state, request).await.map(Json)
}

async fn stream_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Result<Json<ResearchRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = accept(&state, &headers, body)?;
    let span = info_span!("research_stream", request_id = %Uuid::new_v4());
    span.in_scope(|| info!(topic = %request.topic, "Streaming research request"));

    let (tx, rx) = mpsc::channel(STREAM_BUFFER);
    let orchestrator = Arc::clone(&state.orchestrator);
    let streamer = ProgressStreamer::new(tx, state.stage_pacing);
    tokio::spawn(
        async move {
            if let Err(e) = streamer.run(&orchestrator, request).await {
                debug!(error = %e, "Research stream ended early");
            }
        }
        .instrument(span),
    );

    let stream = ReceiverStream::new(rx).map(|event| Event::default().json_data(event));
    let headers = [
        (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        (header::CONNECTION, HeaderValue::from_static("keep-alive")),
        (
            HeaderName::from_static("x-accel-buffering"),
            HeaderValue::from_static("no"),
        ),
    ];
    Ok((headers, Sse::new(stream).keep_alive(KeepAlive::default())))
}

/// Serve the gateway on the configured address until `shutdown` resolves.
pub async fn run<F>(
    config: &MolarConfig,
    engine: Arc<dyn ResearchEngine>,
    shutdown: F,
) -> Result<(), MolarError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = AppState::new(config, engine).shared();
    let app = router(state);
    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Research gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Research gateway stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::MockResearchEngine;
    use axum::body::Body;
    use tower::ServiceExt;

    fn app_with_origins(origins: Vec<String>) -> Router {
        let mut state = AppState::new(&MolarConfig::default(), Arc::new(MockResearchEngine::new()));
        state.origins = origins;
        router(state.shared())
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = app_with_origins(vec!["*".into()]);
        let req = axum::http::Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let resp = ServiceExt::<axum::http::Request<Body>>::oneshot(app, req)
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body = axum::body::to_bytes(resp.into_body(), 10_000)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], SERVICE_NAME);
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_api_error_status() {
        assert_eq!(
            ApiError::from(AuthError::InvalidToken).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(ValidationError::EmptyTopic).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        let err = ApiError::from(ResearchError::Failed {
            message: "boom".into(),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Research failed: boom");
    }

    #[tokio::test]
    async fn test_auth_error_response() {
        let resp = ApiError::from(AuthError::MissingOrMalformedHeader).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(resp.headers()[header::WWW_AUTHENTICATE], "Bearer");
        let body = axum::body::to_bytes(resp.into_body(), 10_000)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["detail"], "Missing or invalid authorization header");
    }

    fn preflight(origin: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method("OPTIONS")
            .uri("/research")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_cors_listed_origin() {
        let app = app_with_origins(vec!["http://localhost:3000".into()]);
        let resp = app.oneshot(preflight("http://localhost:3000")).await.unwrap();
        let headers = resp.headers();
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:3000"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }

    #[tokio::test]
    async fn test_cors_unlisted_origin() {
        let app = app_with_origins(vec!["http://localhost:3000".into()]);
        let resp = app.oneshot(preflight("https://evil.example")).await.unwrap();
        assert!(
            resp.headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_cors_wildcard() {
        let app = app_with_origins(vec!["http://localhost:3000".into(), "*".into()]);
        let resp = app.oneshot(preflight("https://anywhere.example")).await.unwrap();
        assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }
}
