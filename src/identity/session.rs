use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::CacheError;
use crate::secret::Secret;
use crate::tprintln;

use super::account::Account;

/// Everything the cache keeps for one account: the account itself plus the credentials
/// needed for silent renewal.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord {
    pub account: Account,
    pub access_token: Secret,
    pub refresh_token: Option<Secret>,
    pub id_token: String,
    pub expires_on: DateTime<Utc>,
    pub scopes: Vec<String>,
}

impl CacheRecord {
    /// True if every requested scope was granted to the cached access token (case-insensitive).
    pub fn covers(&self, scopes: &[String]) -> bool {
        scopes.iter().all(|want| self.scopes.iter().any(|have| have.eq_ignore_ascii_case(want)))
    }
}

/// Storage capability behind which the account/session cache lives. The persistence
/// format is the implementation's business.
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Accounts, optionally filtered by policy. Enumeration order is stable within a session.
    async fn list_accounts(&self, policy: Option<&str>) -> Result<Vec<Account>, CacheError>;
    /// Idempotent: removing an absent account is a no-op.
    async fn remove(&self, account: &Account) -> Result<(), CacheError>;
    /// Insert or replace the record for the same policy+identity pair; returns the stored account.
    async fn upsert(&self, record: CacheRecord) -> Result<Account, CacheError>;
    async fn record(&self, account: &Account) -> Result<Option<CacheRecord>, CacheError>;
}

/// First account in the cache's own enumeration order.
pub fn first_or_none(accounts: Vec<Account>) -> Option<Account> { accounts.into_iter().next() }

fn gen_cache_key(fill: impl FnOnce(&mut [u8]) -> Result<(), getrandom::Error>) -> Result<String, CacheError> {
    let mut buf = [0u8; 16];
    fill(&mut buf).map_err(|e| CacheError::Backend(format!("cannot generate cache key: {}", e)))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

/// Process-local cache. Records are kept in insertion order; a replaced record keeps its slot.
#[derive(Default)]
pub struct MemorySessionCache {
    records: RwLock<Vec<CacheRecord>>,
}

impl MemorySessionCache {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.records.read().len() }
    pub fn is_empty(&self) -> bool { self.records.read().is_empty() }
}

#[async_trait]
impl SessionCache for MemorySessionCache {
    async fn list_accounts(&self, policy: Option<&str>) -> Result<Vec<Account>, CacheError> {
        let recs = self.records.read();
        Ok(recs
            .iter()
            .filter(|r| policy.map(|p| r.account.matches_policy(p)).unwrap_or(true))
            .map(|r| r.account.clone())
            .collect())
    }

    async fn remove(&self, account: &Account) -> Result<(), CacheError> {
        let mut recs = self.records.write();
        let before = recs.len();
        recs.retain(|r| r.account.cache_key != account.cache_key);
        tprintln!("cache.remove account={} removed={}", account.home_account_id, before - recs.len());
        Ok(())
    }

    async fn upsert(&self, mut record: CacheRecord) -> Result<Account, CacheError> {
        let mut recs = self.records.write();
        if let Some(slot) = recs.iter_mut().find(|r| r.account.same_identity(&record.account)) {
            record.account.cache_key = slot.account.cache_key.clone();
            *slot = record;
            tprintln!("cache.replace account={}", slot.account.home_account_id);
            return Ok(slot.account.clone());
        }
        record.account.cache_key = gen_cache_key(getrandom::getrandom)?;
        let account = record.account.clone();
        recs.push(record);
        tprintln!("cache.insert account={} total={}", account.home_account_id, recs.len());
        Ok(account)
    }

    async fn record(&self, account: &Account) -> Result<Option<CacheRecord>, CacheError> {
        let recs = self.records.read();
        Ok(recs.iter().find(|r| r.account.cache_key == account.cache_key).cloned())
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
