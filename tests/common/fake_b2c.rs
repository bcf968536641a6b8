use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use axum::extract::{Form, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;

pub enum Reply {
    Json(StatusCode, serde_json::Value),
    Text(StatusCode, String),
}

/// One token-endpoint call as the fake saw it.
#[derive(Debug, Clone)]
pub struct TokenCall {
    pub tenant: String,
    pub policy: String,
    pub form: HashMap<String, String>,
}

/// Token endpoint plus a bearer-protected `/hello` resource.
#[derive(Default)]
pub struct FakeB2c {
    pub replies: Mutex<VecDeque<Reply>>,
    pub calls: Mutex<Vec<TokenCall>>,
    pub bearers: Mutex<Vec<String>>,
}

impl FakeB2c {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    pub fn reply(&self, r: Reply) { self.replies.lock().push_back(r); }

    pub fn tokens(&self, access_token: &str, refresh_token: Option<&str>, id_token: &str, expires_in: i64) {
        let mut body = serde_json::json!({
            "access_token": access_token,
            "id_token": id_token,
            "token_type": "Bearer",
            "expires_in": expires_in,
            "scope": format!("{} openid offline_access", super::API_SCOPE),
        });
        if let Some(rt) = refresh_token {
            body["refresh_token"] = serde_json::Value::String(rt.to_string());
        }
        self.reply(Reply::Json(StatusCode::OK, body));
    }

    pub fn error(&self, status: StatusCode, error: &str, description: &str) {
        self.reply(Reply::Json(status, serde_json::json!({"error": error, "error_description": description})));
    }

    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route("/tfp/{tenant}/{policy}/oauth2/v2.0/token", post(token))
            .route("/hello", get(hello))
            .with_state(self.clone())
    }
}

async fn token(
    Path((tenant, policy)): Path<(String, String)>,
    State(fake): State<Arc<FakeB2c>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    fake.calls.lock().push(TokenCall { tenant, policy, form });
    match fake.replies.lock().pop_front() {
        Some(Reply::Json(status, body)) => (status, Json(body)).into_response(),
        Some(Reply::Text(status, body)) => (status, body).into_response(),
        None => (StatusCode::BAD_REQUEST, Json(serde_json::json!({"error": "invalid_request", "error_description": "unscripted"}))).into_response(),
    }
}

async fn hello(State(fake): State<Arc<FakeB2c>>, headers: HeaderMap) -> Response {
    let auth = headers.get("authorization").and_then(|v| v.to_str().ok()).unwrap_or("").to_string();
    let Some(token) = auth.strip_prefix("Bearer ") else {
        return (StatusCode::UNAUTHORIZED, "missing bearer token").into_response();
    };
    fake.bearers.lock().push(token.to_string());
    Json(serde_json::json!({"name": "hello", "token_len": token.len()})).into_response()
}
