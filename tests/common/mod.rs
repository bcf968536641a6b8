#![allow(dead_code)]

pub mod fake_b2c;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use reqwest::Url;
use tokio::task::JoinHandle;

use b2c_desktop_auth::error::AuthError;
use b2c_desktop_auth::identity::{AuthorizationSurface, WindowHandle};
use b2c_desktop_auth::AuthConfig;

pub const REDIRECT: &str = "http://localhost:53123/";
pub const API_SCOPE: &str = "https://fabrikamb2c.onmicrosoft.com/helloapi/demo.read";

// Serve `app` on an ephemeral localhost port. Abort the handle to stop it.
pub async fn serve(app: Router) -> anyhow::Result<(JoinHandle<()>, String)> {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await?;
    let base = format!("http://{}", listener.local_addr()?);
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("fake server error: {e:?}");
        }
    });
    Ok((handle, base))
}

/// Unsigned compact token carrying `claims`.
pub fn id_token(claims: serde_json::Value) -> String {
    format!("eyJhbGciOiJub25lIn0.{}.c2ln", URL_SAFE_NO_PAD.encode(claims.to_string()))
}

pub fn jane() -> String {
    id_token(serde_json::json!({
        "name": "Jane Doe",
        "oid": "ABC-123",
        "emails": ["jane@example.com"],
        "city": "Redmond",
        "idp": "local"
    }))
}

/// Config pointing every policy authority at a fake B2C host.
pub fn config_for(base: &str) -> AuthConfig {
    AuthConfig {
        authority_base: Some(format!("{base}/tfp/fabrikamb2c.onmicrosoft.com")),
        redirect_uri: Some(REDIRECT.to_string()),
        api_scopes: vec![API_SCOPE.to_string()],
        api_endpoint: format!("{base}/hello"),
        ..AuthConfig::default()
    }
}

/// What the fake browser does once it reaches the authorize URL.
#[derive(Clone)]
pub enum BrowserOutcome {
    Code(String),
    Error { error: String, description: String },
    Cancel,
}

/// Surface that skips the browser: records each authorize URL and answers with a scripted redirect.
pub struct ScriptedSurface {
    pub outcomes: Mutex<Vec<BrowserOutcome>>,
    pub seen: Mutex<Vec<Url>>,
}

impl ScriptedSurface {
    pub fn new(outcomes: Vec<BrowserOutcome>) -> Arc<Self> {
        Arc::new(Self { outcomes: Mutex::new(outcomes), seen: Mutex::new(Vec::new()) })
    }

    pub fn query(&self, idx: usize, key: &str) -> Option<String> {
        self.seen.lock().get(idx)?.query_pairs().find(|(k, _)| k == key).map(|(_, v)| v.into_owned())
    }
}

#[async_trait]
impl AuthorizationSurface for ScriptedSurface {
    async fn authorize(&self, _parent: Option<WindowHandle>, url_for: &(dyn for<'a> Fn(&'a str) -> Url + Send + Sync)) -> Result<Url, AuthError> {
        let url = url_for(REDIRECT);
        let state = url.query_pairs().find(|(k, _)| k == "state").map(|(_, v)| v.into_owned()).unwrap_or_default();
        self.seen.lock().push(url);
        let outcome = {
            let mut o = self.outcomes.lock();
            if o.is_empty() { BrowserOutcome::Cancel } else { o.remove(0) }
        };
        let mut redirect = Url::parse(REDIRECT).map_err(|e| AuthError::provider("bad_redirect".to_string(), e.to_string()))?;
        match outcome {
            BrowserOutcome::Code(code) => {
                redirect.query_pairs_mut().append_pair("code", &code).append_pair("state", &state);
            }
            BrowserOutcome::Error { error, description } => {
                redirect.query_pairs_mut().append_pair("error", &error).append_pair("error_description", &description).append_pair("state", &state);
            }
            BrowserOutcome::Cancel => return Err(AuthError::canceled("User canceled authentication.")),
        }
        Ok(redirect)
    }
}
