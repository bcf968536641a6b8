//! Azure AD B2C provider: OAuth2 authorization code + PKCE through the browser surface,
//! refresh-token redemption for silent renewal.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::AuthConfig;
use crate::error::{classify_provider_error, AuthError};
use crate::secret::Secret;

use super::provider::{AuthorizeParams, IdentityProvider, ProviderTokens, RefreshParams};
use super::surface::{AuthorizationSurface, LoopbackSurface};

/// Scopes always requested alongside the API scopes so an ID token and refresh token come back.
pub const OIDC_SCOPES: [&str; 2] = ["openid", "offline_access"];

/// 32 random bytes, base64url without padding (43 chars).
pub fn random_token() -> Result<String, AuthError> {
    token_from(getrandom::getrandom)
}

fn token_from(fill: impl FnOnce(&mut [u8]) -> Result<(), getrandom::Error>) -> Result<String, AuthError> {
    let mut buf = [0u8; 32];
    fill(&mut buf).map_err(|e| AuthError::provider("rng_unavailable".to_string(), e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(buf))
}

/// S256 code challenge: BASE64URL(SHA256(verifier)).
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    // numeric or string depending on endpoint version
    #[serde(default)]
    expires_in: Option<Value>,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

pub struct B2cProvider {
    http: reqwest::Client,
    cfg: AuthConfig,
    surface: Arc<dyn AuthorizationSurface>,
}

impl B2cProvider {
    /// Provider with the system browser + loopback surface from `cfg`.
    pub fn new(cfg: AuthConfig) -> Result<Self, AuthError> {
        let surface = Arc::new(LoopbackSurface::new(cfg.redirect_uri.clone(), Duration::from_secs(cfg.interactive_timeout_secs)));
        Self::with_surface(cfg, surface)
    }

    pub fn with_surface(cfg: AuthConfig, surface: Arc<dyn AuthorizationSurface>) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http, cfg, surface })
    }

    pub fn authorize_endpoint(&self, policy: &str) -> String { format!("{}/oauth2/v2.0/authorize", self.cfg.authority_for(policy)) }
    pub fn token_endpoint(&self, policy: &str) -> String { format!("{}/oauth2/v2.0/token", self.cfg.authority_for(policy)) }

    fn scope_param(scopes: &[String]) -> String {
        let mut all: Vec<&str> = scopes.iter().map(|s| s.as_str()).collect();
        for s in OIDC_SCOPES {
            if !all.iter().any(|x| x.eq_ignore_ascii_case(s)) { all.push(s); }
        }
        all.join(" ")
    }

    fn authorize_base(&self, policy: &str) -> Result<Url, AuthError> {
        Url::parse(&self.authorize_endpoint(policy))
            .map_err(|e| AuthError::provider("invalid_authority".to_string(), e.to_string()))
    }

    /// Full authorize URL for one attempt.
    pub fn authorize_url(&self, params: &AuthorizeParams, redirect_uri: &str, state: &str, challenge: &str) -> Result<Url, AuthError> {
        Ok(self.authorize_url_on(self.authorize_base(&params.policy)?, params, redirect_uri, state, challenge))
    }

    fn authorize_url_on(&self, mut url: Url, params: &AuthorizeParams, redirect_uri: &str, state: &str, challenge: &str) -> Url {
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("client_id", &self.cfg.client_id)
                .append_pair("response_type", "code")
                .append_pair("redirect_uri", redirect_uri)
                .append_pair("response_mode", "query")
                .append_pair("scope", &Self::scope_param(&params.scopes))
                .append_pair("state", state)
                .append_pair("code_challenge", challenge)
                .append_pair("code_challenge_method", "S256");
            if let Some(p) = params.prompt.and_then(|p| p.as_param()) {
                q.append_pair("prompt", p);
            }
            if let Some(hint) = &params.login_hint {
                q.append_pair("login_hint", hint);
            }
        }
        url
    }

    async fn post_token(&self, policy: &str, form: &[(&str, &str)]) -> Result<ProviderTokens, AuthError> {
        let resp = self.http.post(self.token_endpoint(policy)).form(form).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<ErrorResponse>(&body) {
                return Err(classify_provider_error(&err.error, err.error_description.as_deref().unwrap_or("")));
            }
            return Err(AuthError::provider(format!("http_{}", status.as_u16()), format!("Token endpoint returned HTTP {}: {}", status, body)));
        }
        let tr: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::provider("invalid_token_response".to_string(), e.to_string()))?;
        into_tokens(tr)
    }
}

fn into_tokens(tr: TokenResponse) -> Result<ProviderTokens, AuthError> {
    let expires_in = match &tr.expires_in {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    };
    let expires_on = chrono::TimeDelta::try_seconds(expires_in)
        .and_then(|d| Utc::now().checked_add_signed(d))
        .ok_or_else(|| AuthError::provider("invalid_token_response".to_string(), format!("expires_in out of range: {}", expires_in)))?;
    Ok(ProviderTokens {
        access_token: Secret::new(tr.access_token.unwrap_or_default()),
        id_token: tr.id_token.unwrap_or_default(),
        refresh_token: tr.refresh_token.filter(|s| !s.is_empty()).map(Secret::new),
        expires_on,
        scopes: tr.scope.map(|s| s.split_whitespace().map(|x| x.to_string()).collect()).unwrap_or_default(),
    })
}

/// Authorization code from a redirect, after checking for provider errors and the state value.
pub fn code_from_redirect(redirect: &Url, expected_state: &str) -> Result<String, AuthError> {
    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut description = String::new();
    for (k, v) in redirect.query_pairs() {
        match k.as_ref() {
            "code" => code = Some(v.into_owned()),
            "state" => state = Some(v.into_owned()),
            "error" => error = Some(v.into_owned()),
            "error_description" => description = v.into_owned(),
            _ => {}
        }
    }
    if let Some(err) = error {
        return Err(classify_provider_error(&err, &description));
    }
    if state.as_deref() != Some(expected_state) {
        return Err(AuthError::provider("state_mismatch", "The redirect state does not match the request."));
    }
    code.filter(|c| !c.is_empty())
        .ok_or_else(|| AuthError::provider("missing_code", "The redirect carried no authorization code."))
}

#[async_trait]
impl IdentityProvider for B2cProvider {
    async fn authorize_interactive(&self, params: &AuthorizeParams) -> Result<ProviderTokens, AuthError> {
        let verifier = Secret::new(random_token()?);
        let challenge = code_challenge(verifier.expose());
        let state = random_token()?;
        let endpoint = self.authorize_base(&params.policy)?;

        // the surface picks the redirect URI; the code redemption must repeat it
        let redirect_cell = parking_lot::Mutex::new(String::new());
        let url_for = |redirect_uri: &str| {
            *redirect_cell.lock() = redirect_uri.to_string();
            self.authorize_url_on(endpoint.clone(), params, redirect_uri, &state, &challenge)
        };
        let redirect = self.surface.authorize(params.parent, &url_for).await?;
        let code = Secret::new(code_from_redirect(&redirect, &state)?);
        let redirect_uri = redirect_cell.lock().clone();
        debug!(target: "auth.provider", policy = %params.policy, "authorization code received");

        let scope = Self::scope_param(&params.scopes);
        let form = [
            ("grant_type", "authorization_code"),
            ("client_id", self.cfg.client_id.as_str()),
            ("scope", scope.as_str()),
            ("code", code.expose()),
            ("redirect_uri", redirect_uri.as_str()),
            ("code_verifier", verifier.expose()),
        ];
        let tokens = self.post_token(&params.policy, &form).await?;
        info!(target: "auth.provider", policy = %params.policy, expires_on = %tokens.expires_on, "authorization code redeemed");
        Ok(tokens)
    }

    async fn redeem_refresh_token(&self, params: &RefreshParams) -> Result<ProviderTokens, AuthError> {
        let scope = Self::scope_param(&params.scopes);
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.cfg.client_id.as_str()),
            ("scope", scope.as_str()),
            ("refresh_token", params.refresh_token.expose()),
        ];
        match self.post_token(&params.policy, &form).await {
            Ok(t) => Ok(t),
            Err(e) => {
                warn!(target: "auth.provider", policy = %params.policy, code = e.code_str(), "refresh token redemption failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[path = "b2c_tests.rs"]
mod tests;
