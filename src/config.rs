use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tenant, application and policy settings for one B2C client.
/// Unset environment overrides fall back to the sample tenant defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    pub tenant: String,
    pub b2c_hostname: String,
    /// Explicit authority base (custom domain, test endpoint). Derived from hostname and tenant when absent.
    pub authority_base: Option<String>,
    pub client_id: String,
    /// Registered redirect URI. `None` binds a loopback listener on an ephemeral port.
    pub redirect_uri: Option<String>,

    pub policy_sign_up_sign_in: String,
    pub policy_edit_profile: String,
    pub policy_reset_password: String,

    pub api_scopes: Vec<String>,
    pub api_endpoint: String,

    /// The browser surface is abandoned after this many seconds.
    pub interactive_timeout_secs: u64,
    /// Cached access tokens this close to expiry are renewed instead of returned.
    pub token_refresh_skew_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            tenant: "fabrikamb2c.onmicrosoft.com".to_string(),
            b2c_hostname: "fabrikamb2c.b2clogin.com".to_string(),
            authority_base: None,
            client_id: "841e1190-d73a-450c-9d68-f5cf16b78e81".to_string(),
            redirect_uri: None,

            policy_sign_up_sign_in: "b2c_1_susi".to_string(),
            policy_edit_profile: "b2c_1_edit_profile".to_string(),
            policy_reset_password: "b2c_1_reset".to_string(),

            api_scopes: vec!["https://fabrikamb2c.onmicrosoft.com/helloapi/demo.read".to_string()],
            api_endpoint: "https://fabrikamb2chello.azurewebsites.net/hello".to_string(),

            interactive_timeout_secs: 300,
            token_refresh_skew_secs: 300,
        }
    }
}

impl AuthConfig {
    /// Defaults overlaid with `B2C_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(get: F) -> Result<Self, ConfigError> {
        let mut cfg = AuthConfig::default();
        if let Some(v) = get("B2C_TENANT") { cfg.tenant = v; }
        if let Some(v) = get("B2C_HOSTNAME") { cfg.b2c_hostname = v; }
        if let Some(v) = get("B2C_AUTHORITY_BASE") { cfg.authority_base = Some(v).filter(|s| !s.trim().is_empty()); }
        if let Some(v) = get("B2C_CLIENT_ID") { cfg.client_id = v; }
        if let Some(v) = get("B2C_REDIRECT_URI") { cfg.redirect_uri = Some(v).filter(|s| !s.trim().is_empty()); }
        if let Some(v) = get("B2C_POLICY_SUSI") { cfg.policy_sign_up_sign_in = v; }
        if let Some(v) = get("B2C_POLICY_EDIT_PROFILE") { cfg.policy_edit_profile = v; }
        if let Some(v) = get("B2C_POLICY_RESET_PASSWORD") { cfg.policy_reset_password = v; }
        if let Some(v) = get("B2C_API_SCOPES") {
            cfg.api_scopes = v.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect();
        }
        if let Some(v) = get("B2C_API_ENDPOINT") { cfg.api_endpoint = v; }
        if let Some(v) = get("B2C_INTERACTIVE_TIMEOUT_SECS") {
            cfg.interactive_timeout_secs = v.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
                field: "interactive_timeout_secs",
                message: e.to_string(),
            })?;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tenant.trim().is_empty() { return Err(ConfigError::Missing("tenant")); }
        if self.b2c_hostname.trim().is_empty() { return Err(ConfigError::Missing("b2c_hostname")); }
        if self.client_id.trim().is_empty() { return Err(ConfigError::Missing("client_id")); }
        if self.policy_sign_up_sign_in.trim().is_empty() { return Err(ConfigError::Missing("policy_sign_up_sign_in")); }
        if self.policy_edit_profile.trim().is_empty() { return Err(ConfigError::Missing("policy_edit_profile")); }
        if self.policy_reset_password.trim().is_empty() { return Err(ConfigError::Missing("policy_reset_password")); }
        reqwest::Url::parse(&self.api_endpoint).map_err(|e| ConfigError::Invalid { field: "api_endpoint", message: e.to_string() })?;
        if let Some(a) = &self.authority_base {
            reqwest::Url::parse(a).map_err(|e| ConfigError::Invalid { field: "authority_base", message: e.to_string() })?;
        }
        if let Some(r) = &self.redirect_uri {
            reqwest::Url::parse(r).map_err(|e| ConfigError::Invalid { field: "redirect_uri", message: e.to_string() })?;
        }
        Ok(())
    }

    #[inline]
    pub fn authority_base(&self) -> String {
        match &self.authority_base {
            Some(base) if base.ends_with('/') => base.clone(),
            Some(base) => format!("{}/", base),
            None => format!("https://{}/tfp/{}/", self.b2c_hostname, self.tenant),
        }
    }

    #[inline]
    pub fn authority_for(&self, policy: &str) -> String { format!("{}{}", self.authority_base(), policy) }

    #[inline]
    pub fn authority_sign_up_sign_in(&self) -> String { self.authority_for(&self.policy_sign_up_sign_in) }

    #[inline]
    pub fn authority_edit_profile(&self) -> String { self.authority_for(&self.policy_edit_profile) }

    #[inline]
    pub fn authority_reset_password(&self) -> String { self.authority_for(&self.policy_reset_password) }
}
