use crate::handler::{ContactFormMessageHandler, HealthResponse};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderValue, Method},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

type HandlerState = State<Arc<ContactFormMessageHandler>>;

pub fn router(handler: Arc<ContactFormMessageHandler>, allowed_origins: Vec<HeaderValue>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);
    let api = Router::new()
        .route("/contact", post(contact))
        .layer(cors);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(handler)
}

async fn health(State(handler): HandlerState) -> Json<HealthResponse> {
    handler.handle_health_check()
}

// The body is taken as raw bytes so that malformed JSON reaches the handler's own error mapping
// instead of axum's extractor rejection.
async fn contact(State(handler): HandlerState, body: Bytes) -> Response {
    handler.handle_contact(&body).await
}
