use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::claims::decode_id_token;
use crate::config::AuthConfig;
use crate::error::{AuthError, CacheError};
use crate::secret::Secret;

use super::account::Account;
use super::provider::{AuthorizeParams, IdentityProvider, InteractiveRequest, ProviderTokens, RefreshParams};
use super::session::{CacheRecord, SessionCache};

/// Outcome of a successful acquisition. Immutable; not kept beyond the cache's own record.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenResult {
    pub access_token: Secret,
    pub id_token: String,
    pub expires_on: DateTime<Utc>,
    pub account: Account,
    pub scopes: Vec<String>,
    /// Served from the cache without a provider round-trip.
    pub from_cache: bool,
}

impl From<CacheError> for AuthError {
    fn from(err: CacheError) -> Self {
        AuthError::provider("cache_error".to_string(), err.to_string())
    }
}

/// Interactive and silent acquisition against one identity provider, backed by one session cache.
/// Construct once at startup and hand to the orchestrator.
pub struct TokenAcquirer {
    provider: Arc<dyn IdentityProvider>,
    cache: Arc<dyn SessionCache>,
    default_policy: String,
    refresh_skew: Duration,
}

impl TokenAcquirer {
    pub fn new(provider: Arc<dyn IdentityProvider>, cache: Arc<dyn SessionCache>, cfg: &AuthConfig) -> Self {
        Self {
            provider,
            cache,
            default_policy: cfg.policy_sign_up_sign_in.clone(),
            refresh_skew: Duration::seconds(cfg.token_refresh_skew_secs),
        }
    }

    pub fn default_policy(&self) -> &str { &self.default_policy }

    pub async fn accounts(&self, policy: Option<&str>) -> Result<Vec<Account>, CacheError> {
        self.cache.list_accounts(policy).await
    }

    pub async fn remove(&self, account: &Account) -> Result<(), CacheError> {
        info!(target: "auth.cache", account = %account.home_account_id, "removing account");
        self.cache.remove(account).await
    }

    /// Silent acquisition: cached access token if still fresh, else redeem the cached refresh credential.
    /// Without an account this fails with `UiInteractionRequired` and touches neither cache nor network.
    pub async fn acquire_silent(&self, scopes: &[String], account: Option<&Account>) -> Result<TokenResult, AuthError> {
        let Some(account) = account else { return Err(AuthError::no_account()); };
        let Some(record) = self.cache.record(account).await? else {
            return Err(AuthError::ui_required("no_tokens_found", "No cached credentials were found for the account."));
        };

        if record.covers(scopes) && !record.access_token.is_empty() && record.expires_on - self.refresh_skew > Utc::now() {
            debug!(target: "auth", account = %account.home_account_id, "silent: cached access token");
            return Ok(TokenResult {
                access_token: record.access_token.clone(),
                id_token: record.id_token.clone(),
                expires_on: record.expires_on,
                account: record.account.clone(),
                scopes: record.scopes.clone(),
                from_cache: true,
            });
        }

        let Some(refresh_token) = record.refresh_token.clone() else {
            return Err(AuthError::ui_required("no_refresh_token", "The cached session cannot be renewed silently."));
        };
        let params = RefreshParams { scopes: scopes.to_vec(), policy: record.account.policy.clone(), refresh_token };
        let tokens = match self.provider.redeem_refresh_token(&params).await {
            Ok(t) => t,
            Err(e) => {
                warn!(target: "auth", account = %account.home_account_id, code = e.code_str(), "silent renewal failed");
                return Err(e);
            }
        };
        info!(target: "auth", account = %account.home_account_id, "silent renewal succeeded");

        let merged = CacheRecord {
            account: record.account.clone(),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token.or(record.refresh_token),
            id_token: if tokens.id_token.is_empty() { record.id_token } else { tokens.id_token },
            expires_on: tokens.expires_on,
            scopes: granted_or_requested(tokens.scopes, scopes),
        };
        self.store(merged).await
    }

    /// Interactive acquisition. On success the account is upserted for its policy+identity pair.
    pub async fn acquire_interactive(&self, req: &InteractiveRequest) -> Result<TokenResult, AuthError> {
        let policy = req.policy.clone().unwrap_or_else(|| self.default_policy.clone());
        let params = AuthorizeParams {
            scopes: req.scopes.clone(),
            policy: policy.clone(),
            prompt: req.prompt,
            parent: req.parent,
            login_hint: req.login_hint.clone(),
        };
        info!(target: "auth", policy = %policy, prompt = ?req.prompt, "interactive acquisition");
        let tokens = match self.provider.authorize_interactive(&params).await {
            Ok(t) => t,
            Err(e) => {
                warn!(target: "auth", policy = %policy, code = e.code_str(), "interactive acquisition failed");
                return Err(e);
            }
        };
        let record = self.record_for(tokens, &policy, &req.scopes)?;
        self.store(record).await
    }

    fn record_for(&self, tokens: ProviderTokens, policy: &str, requested: &[String]) -> Result<CacheRecord, AuthError> {
        let claims = decode_id_token(&tokens.id_token).map_err(|e| AuthError::provider("invalid_id_token".to_string(), e.to_string()))?;
        let account = Account::from_claims(&claims, policy)?;
        Ok(CacheRecord {
            account,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            id_token: tokens.id_token,
            expires_on: tokens.expires_on,
            scopes: granted_or_requested(tokens.scopes, requested),
        })
    }

    async fn store(&self, record: CacheRecord) -> Result<TokenResult, AuthError> {
        let result = TokenResult {
            access_token: record.access_token.clone(),
            id_token: record.id_token.clone(),
            expires_on: record.expires_on,
            account: record.account.clone(),
            scopes: record.scopes.clone(),
            from_cache: false,
        };
        let account = self.cache.upsert(record).await?;
        Ok(TokenResult { account, ..result })
    }
}

fn granted_or_requested(granted: Vec<String>, requested: &[String]) -> Vec<String> {
    if granted.is_empty() { requested.to_vec() } else { granted }
}

#[cfg(test)]
#[path = "acquirer_tests.rs"]
mod tests;
