//! Identity-provider boundary: explicit request/response structs in place of a fluent client API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AuthError;
use crate::secret::Secret;

/// Prompt behaviour for interactive acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prompt {
    /// Send no prompt hint; lets a still-fresh provider session skip re-prompting.
    NoPrompt,
    SelectAccount,
    ForceLogin,
    Consent,
}

impl Prompt {
    /// Value of the OAuth2 `prompt` parameter, if any.
    pub fn as_param(&self) -> Option<&'static str> {
        match self {
            Prompt::NoPrompt => None,
            Prompt::SelectAccount => Some("select_account"),
            Prompt::ForceLogin => Some("login"),
            Prompt::Consent => Some("consent"),
        }
    }
}

/// Opaque host window/display handle the interactive surface is parented to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WindowHandle(pub usize);

/// Parameters for one interactive acquisition.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractiveRequest {
    pub scopes: Vec<String>,
    /// Policy override (profile edit, password reset). `None` uses the sign-in policy.
    pub policy: Option<String>,
    pub prompt: Option<Prompt>,
    pub parent: Option<WindowHandle>,
    pub login_hint: Option<String>,
}

impl InteractiveRequest {
    pub fn new(scopes: &[String]) -> Self {
        Self { scopes: scopes.to_vec(), policy: None, prompt: None, parent: None, login_hint: None }
    }

    pub fn with_policy<S: Into<String>>(mut self, policy: S) -> Self { self.policy = Some(policy.into()); self }
    pub fn with_prompt(mut self, prompt: Prompt) -> Self { self.prompt = Some(prompt); self }
    pub fn with_parent(mut self, parent: Option<WindowHandle>) -> Self { self.parent = parent; self }
    pub fn with_login_hint<S: Into<String>>(mut self, hint: S) -> Self { self.login_hint = Some(hint.into()); self }
}

/// Interactive call as seen by the provider: the policy is already resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizeParams {
    pub scopes: Vec<String>,
    pub policy: String,
    pub prompt: Option<Prompt>,
    pub parent: Option<WindowHandle>,
    pub login_hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshParams {
    pub scopes: Vec<String>,
    pub policy: String,
    pub refresh_token: Secret,
}

/// Raw token endpoint outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderTokens {
    pub access_token: Secret,
    pub id_token: String,
    pub refresh_token: Option<Secret>,
    pub expires_on: DateTime<Utc>,
    /// Scopes actually granted; empty when the provider did not say.
    pub scopes: Vec<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Run the user-facing flow to completion or cancellation.
    async fn authorize_interactive(&self, params: &AuthorizeParams) -> Result<ProviderTokens, AuthError>;
    /// Mint fresh tokens from a refresh credential. Never prompts.
    async fn redeem_refresh_token(&self, params: &RefreshParams) -> Result<ProviderTokens, AuthError>;
}
