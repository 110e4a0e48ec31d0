use axum::{
    extract::{Json, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde_json::{json, Value};
use std::{
    borrow::Cow,
    net::SocketAddr,
    sync::{Arc, Mutex},
};
use tokio::net::TcpListener;

const EMAILS_PATH: &str = "/emails";

#[derive(Clone)]
enum Rejection {
    Json(StatusCode, Value),
    Text(StatusCode, String),
}

/// Stands in for the Resend `POST /emails` endpoint.
///
/// Requests must carry the API key given to [`FakeResend::new`] as a bearer token. Accepted
/// payloads are recorded and can be inspected with [`FakeResend::received_emails`], including
/// from clones handed to [`FakeResend::serve`].
#[derive(Clone)]
pub struct FakeResend {
    required_api_key: Cow<'static, str>,
    rejection: Option<Rejection>,
    received_emails: Arc<Mutex<Vec<Value>>>,
}

impl FakeResend {
    pub fn new(required_api_key: impl Into<Cow<'static, str>>) -> Self {
        Self {
            required_api_key: required_api_key.into(),
            rejection: None,
            received_emails: Default::default(),
        }
    }

    pub fn reject_with(self, status: StatusCode, payload: Value) -> Self {
        Self {
            rejection: Some(Rejection::Json(status, payload)),
            ..self
        }
    }

    pub fn reject_with_text(self, status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            rejection: Some(Rejection::Text(status, body.into())),
            ..self
        }
    }

    /// Starts serving on an ephemeral local port and returns its address.
    pub async fn serve(self) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let app = Router::new()
            .route(EMAILS_PATH, post(send_email))
            .with_state(self);
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        address
    }

    pub fn emails_url(address: SocketAddr) -> String {
        format!("http://{address}{EMAILS_PATH}")
    }

    pub fn received_emails(&self) -> Vec<Value> {
        self.received_emails.lock().unwrap().clone()
    }
}

async fn send_email(
    State(state): State<FakeResend>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Response {
    let expected_authorization = format!("Bearer {}", state.required_api_key);
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    if authorization != Some(expected_authorization.as_str()) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Invalid API Key"})),
        )
            .into_response();
    }

    match state.rejection {
        Some(Rejection::Json(status, body)) => (status, Json(body)).into_response(),
        Some(Rejection::Text(status, body)) => {
            (status, [(header::CONTENT_TYPE, "text/plain")], body).into_response()
        }
        None => {
            let mut received_emails = state.received_emails.lock().unwrap();
            received_emails.push(payload);
            let id = format!("fake-email-{}", received_emails.len());
            (StatusCode::OK, Json(json!({ "id": id }))).into_response()
        }
    }
}
