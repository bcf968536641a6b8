use serde::{Deserialize, Serialize};

use crate::claims::ClaimSet;
use crate::error::AuthError;

/// A previously authenticated principal for one policy. Owned by the session cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Account {
    /// `{oid}-{policy}`, lower-cased. Stable across sign-ins of the same user under the same policy.
    pub home_account_id: String,
    pub policy: String,
    #[serde(default)]
    pub username: Option<String>,
    /// Opaque reference assigned by the cache that stores this account.
    #[serde(default)]
    pub cache_key: String,
}

impl Account {
    pub fn home_account_id_for(object_id: &str, policy: &str) -> String {
        format!("{}-{}", object_id, policy).to_lowercase()
    }

    /// Build the account for `policy` from ID-token claims. `oid` is preferred, `sub` is the fallback.
    pub fn from_claims(claims: &ClaimSet, policy: &str) -> Result<Self, AuthError> {
        let object_id = claims
            .get_str("oid")
            .or_else(|| claims.get_str("sub"))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::provider("invalid_id_token", "The ID token carries neither an 'oid' nor a 'sub' claim."))?;
        let username = claims
            .get_strings("emails")
            .and_then(|v| v.into_iter().next())
            .or_else(|| claims.get_str("name"));
        Ok(Self {
            home_account_id: Self::home_account_id_for(&object_id, policy),
            policy: policy.to_lowercase(),
            username,
            cache_key: String::new(),
        })
    }

    pub fn matches_policy(&self, policy: &str) -> bool { self.policy.eq_ignore_ascii_case(policy) }

    /// Same principal under the same policy; ignores the cache reference.
    pub fn same_identity(&self, other: &Account) -> bool {
        self.home_account_id.eq_ignore_ascii_case(&other.home_account_id) && self.matches_policy(&other.policy)
    }
}
