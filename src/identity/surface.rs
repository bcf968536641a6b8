//! User-facing authentication surface: the system browser plus a loopback listener that
//! captures the provider's redirect.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use reqwest::Url;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::AuthError;

use super::provider::WindowHandle;

#[async_trait]
pub trait AuthorizationSurface: Send + Sync {
    /// Present the provider flow and return the redirect URL it finished on.
    /// `url_for` builds the authorize URL once the surface knows its redirect URI.
    async fn authorize(
        &self,
        parent: Option<WindowHandle>,
        url_for: &(dyn for<'a> Fn(&'a str) -> Url + Send + Sync),
    ) -> Result<Url, AuthError>;
}

const DONE_PAGE: &str = "<html><body><h3>Authentication complete.</h3><p>You can close this window and return to the application.</p></body></html>";

/// How long the listener may drain open browser connections after the redirect arrived.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Opens the system browser and serves `127.0.0.1` until the redirect arrives.
pub struct LoopbackSurface {
    redirect_uri: Option<String>,
    timeout: Duration,
    launch: fn(&str) -> std::io::Result<()>,
}

fn open_system_browser(url: &str) -> std::io::Result<()> { open::that(url) }

/// Shared with the redirect handler; the first hit on the redirect path wins.
struct Capture {
    redirect: Url,
    tx: Mutex<Option<oneshot::Sender<Url>>>,
}

async fn capture(State(cap): State<Arc<Capture>>, Query(pairs): Query<Vec<(String, String)>>) -> Html<&'static str> {
    let mut url = cap.redirect.clone();
    url.set_query(None);
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs.iter());
    }
    if let Some(tx) = cap.tx.lock().take() {
        let _ = tx.send(url);
    }
    Html(DONE_PAGE)
}

async fn not_found() -> StatusCode { StatusCode::NOT_FOUND }

fn invalid_redirect(e: impl std::fmt::Display) -> AuthError { AuthError::provider("invalid_redirect_uri".to_string(), e.to_string()) }
fn bind_failed(e: impl std::fmt::Display) -> AuthError { AuthError::provider("loopback_bind_failed".to_string(), e.to_string()) }

impl LoopbackSurface {
    /// `redirect_uri` must be an `http://localhost[:port][/path]` URI registered for the app;
    /// `None` picks an ephemeral port.
    pub fn new(redirect_uri: Option<String>, timeout: Duration) -> Self {
        Self { redirect_uri, timeout, launch: open_system_browser }
    }

    /// Replace the browser launcher (headless hosts, tests).
    pub fn with_launcher(mut self, launch: fn(&str) -> std::io::Result<()>) -> Self { self.launch = launch; self }

    async fn bind(&self) -> Result<(TcpListener, Url), AuthError> {
        let port = match &self.redirect_uri {
            Some(r) => Url::parse(r).map_err(invalid_redirect)?.port().unwrap_or(80),
            None => 0,
        };
        let listener = TcpListener::bind(("127.0.0.1", port)).await.map_err(bind_failed)?;
        let redirect = match &self.redirect_uri {
            Some(r) => Url::parse(r).map_err(invalid_redirect)?,
            None => {
                let port = listener.local_addr().map_err(bind_failed)?.port();
                Url::parse(&format!("http://localhost:{}/", port)).map_err(invalid_redirect)?
            }
        };
        Ok((listener, redirect))
    }
}

#[async_trait]
impl AuthorizationSurface for LoopbackSurface {
    async fn authorize(
        &self,
        parent: Option<WindowHandle>,
        url_for: &(dyn for<'a> Fn(&'a str) -> Url + Send + Sync),
    ) -> Result<Url, AuthError> {
        let (listener, redirect) = self.bind().await?;
        let (tx, rx) = oneshot::channel();
        let cap = Arc::new(Capture { redirect: redirect.clone(), tx: Mutex::new(Some(tx)) });
        let app = Router::new()
            .route(redirect.path(), get(capture))
            .fallback(not_found)
            .with_state(cap);

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { let _ = stop_rx.await; })
                .await
        });

        // registered redirect URIs are compared verbatim, so hand back what was configured
        let redirect_str = match &self.redirect_uri {
            Some(r) => r.clone(),
            None => redirect.as_str().trim_end_matches('/').to_string(),
        };
        let url = url_for(redirect_str.as_str());
        info!(target: "auth.provider", redirect = %redirect_str, parent = ?parent, "opening browser for interactive sign-in");

        let outcome = match (self.launch)(url.as_str()) {
            Err(e) => Err(AuthError::provider("browser_open_failed".to_string(), e.to_string())),
            Ok(()) => match tokio::time::timeout(self.timeout, rx).await {
                Ok(Ok(u)) => Ok(u),
                Ok(Err(_)) => Err(AuthError::transport("The loopback listener stopped before the redirect arrived.")),
                Err(_) => Err(AuthError::canceled("The interactive sign-in was abandoned before it completed.")),
            },
        };

        let _ = stop_tx.send(());
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
            Ok(Ok(Err(e))) => warn!(target: "auth.provider", error = %e, "loopback listener failed"),
            Ok(_) => {}
            Err(_) => {
                debug!(target: "auth.provider", "loopback listener still draining, aborting");
                server.abort();
            }
        }
        outcome
    }
}

#[cfg(test)]
#[path = "surface_tests.rs"]
mod tests;
