//!
//! Sign-in state machine
//! ---------------------
//! Ties the host's five entry points (startup, sign-in, call API, edit profile, sign-out) to
//! token acquisition, and keeps the text the host renders.
//!
//! States: `SignedOut`, `SignedIn`.
//! - startup: silent with the sign-in policy's cached account; success -> `SignedIn`.
//! - sign-in: interactive; a password-reset signal retries once with the reset policy and
//!   `SelectAccount`.
//! - call API: silent first, interactive fallback on `UiInteractionRequired`, then the resource call.
//!   Failures never tear the session down.
//! - edit profile: interactive with the edit-profile policy and `NoPrompt`; failures are reported
//!   as a likely expired session while staying `SignedIn`.
//! - sign-out: remove every cached account, then `SignedOut` unconditionally.
//!
//! Entry points serialize on a per-session lock, so sign-out never interleaves with an
//! acquisition and a second interactive request waits for the first surface to close.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::claims::{decode_id_token, UserInfo};
use crate::config::AuthConfig;
use crate::identity::{first_or_none, InteractiveRequest, Prompt, TokenAcquirer, TokenResult, WindowHandle};
use crate::resource::ResourceFetcher;

pub const MSG_FAILED_TO_ACQUIRE: &str = "Failed to acquire token.";
pub const MSG_SIGN_IN_FIRST: &str = "You need to sign-in first, and then Call API";
pub const MSG_ACCESS_TOKEN_NULL: &str = "Access token is null (could be expired). Please do interactive log-in again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInState {
    SignedOut,
    SignedIn,
}

/// What the host renders: the session state plus the two text areas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub state: SignInState,
    pub result_text: String,
    pub token_info_text: String,
}

impl Default for Screen {
    fn default() -> Self {
        Self { state: SignInState::SignedOut, result_text: String::new(), token_info_text: String::new() }
    }
}

pub struct AuthOrchestrator {
    acquirer: TokenAcquirer,
    resource: Arc<dyn ResourceFetcher>,
    cfg: AuthConfig,
    parent: Option<WindowHandle>,
    session_lock: Mutex<()>,
    screen: RwLock<Screen>,
}

impl AuthOrchestrator {
    pub fn new(acquirer: TokenAcquirer, resource: Arc<dyn ResourceFetcher>, cfg: AuthConfig) -> Self {
        Self { acquirer, resource, cfg, parent: None, session_lock: Mutex::new(()), screen: RwLock::new(Screen::default()) }
    }

    /// Host window the interactive surface is parented to.
    pub fn with_parent(mut self, parent: WindowHandle) -> Self { self.parent = Some(parent); self }

    pub fn screen(&self) -> Screen { self.screen.read().clone() }
    pub fn state(&self) -> SignInState { self.screen.read().state }
    pub fn acquirer(&self) -> &TokenAcquirer { &self.acquirer }

    fn base_request(&self) -> InteractiveRequest {
        InteractiveRequest::new(&self.cfg.api_scopes).with_parent(self.parent)
    }

    fn set_result<S: Into<String>>(&self, text: S) { self.screen.write().result_text = text.into(); }

    fn set_signed_in(&self, signed_in: bool) {
        let mut s = self.screen.write();
        if signed_in {
            s.state = SignInState::SignedIn;
        } else {
            s.state = SignInState::SignedOut;
            s.result_text.clear();
            s.token_info_text.clear();
        }
    }

    /// Render the ID token's claims. A malformed token is reported in place of the claims.
    fn display_user_info(&self, result: &TokenResult) {
        let text = match decode_id_token(&result.id_token) {
            Ok(claims) => UserInfo::from_claims(&claims).to_string(),
            Err(e) => {
                warn!(target: "auth", account = %result.account.home_account_id, error = %e, "cannot display ID token claims");
                format!("Unable to read user information: {}", e)
            }
        };
        self.screen.write().token_info_text = text;
    }

    /// Startup hook: try the cached sign-in account silently.
    pub async fn on_startup(&self) -> Screen {
        let _guard = self.session_lock.lock().await;
        let accounts = match self.acquirer.accounts(Some(&self.cfg.policy_sign_up_sign_in)).await {
            Ok(a) => a,
            Err(e) => {
                self.set_result(format!("Error Acquiring Token Silently: {}", e));
                return self.screen();
            }
        };
        match self.acquirer.acquire_silent(&self.cfg.api_scopes, first_or_none(accounts).as_ref()).await {
            Ok(result) if !result.access_token.is_empty() => {
                info!(target: "auth", account = %result.account.home_account_id, "restored session at startup");
                self.display_user_info(&result);
                self.set_signed_in(true);
            }
            Ok(_) => self.set_result(MSG_SIGN_IN_FIRST),
            Err(e) if e.is_ui_required() => self.set_result(MSG_SIGN_IN_FIRST),
            Err(e) => self.set_result(format!("Error Acquiring Token Silently: {}", e.message())),
        }
        self.screen()
    }

    pub async fn sign_in(&self) -> Screen {
        let _guard = self.session_lock.lock().await;
        self.set_result("");
        let req = self.base_request();
        match self.acquirer.acquire_interactive(&req).await {
            Ok(result) => self.complete_sign_in(&result),
            Err(e) if e.is_password_reset() => {
                info!(target: "auth", policy = %self.cfg.policy_reset_password, "password reset requested, switching policy");
                let reset = req.with_policy(self.cfg.policy_reset_password.clone()).with_prompt(Prompt::SelectAccount);
                match self.acquirer.acquire_interactive(&reset).await {
                    Ok(result) => self.complete_sign_in(&result),
                    Err(e) => self.set_result(format!("Error Acquiring Token: {}", e.message())),
                }
            }
            Err(e) => self.set_result(format!("Error Acquiring Token: {}", e.message())),
        }
        self.screen()
    }

    fn complete_sign_in(&self, result: &TokenResult) {
        if result.access_token.is_empty() {
            self.set_result(MSG_FAILED_TO_ACQUIRE);
            return;
        }
        self.display_user_info(result);
        self.set_signed_in(true);
        info!(target: "auth", account = %result.account.home_account_id, "signed in");
    }

    /// Silent first, interactive fallback, then the authorized resource call.
    pub async fn call_api(&self) -> Screen {
        let _guard = self.session_lock.lock().await;
        let accounts = match self.acquirer.accounts(Some(&self.cfg.policy_sign_up_sign_in)).await {
            Ok(a) => a,
            Err(e) => {
                self.set_result(format!("Error Acquiring Token Silently: {}", e));
                return self.screen();
            }
        };
        let result = match self.acquirer.acquire_silent(&self.cfg.api_scopes, first_or_none(accounts).as_ref()).await {
            Ok(r) => r,
            Err(e) if e.is_ui_required() => {
                info!(target: "auth", code = e.code_str(), "silent acquisition needs interaction, falling back");
                match self.acquirer.acquire_interactive(&self.base_request()).await {
                    Ok(r) => r,
                    Err(e) => {
                        self.set_result(format!("Error Acquiring Token: {}", e.message()));
                        return self.screen();
                    }
                }
            }
            Err(e) => {
                self.set_result(format!("Error Acquiring Token Silently: {}", e.message()));
                return self.screen();
            }
        };

        if result.access_token.is_empty() {
            self.set_result(MSG_ACCESS_TOKEN_NULL);
            return self.screen();
        }
        let body = self.resource.fetch(&self.cfg.api_endpoint, result.access_token.expose()).await;
        self.set_result(body);
        self.display_user_info(&result);
        self.screen()
    }

    pub async fn edit_profile(&self) -> Screen {
        let _guard = self.session_lock.lock().await;
        self.set_result(format!("Editing profile: {}", self.cfg.authority_edit_profile()));
        let req = self.base_request()
            .with_policy(self.cfg.policy_edit_profile.clone())
            .with_prompt(Prompt::NoPrompt);
        match self.acquirer.acquire_interactive(&req).await {
            Ok(result) if result.access_token.is_empty() => self.set_result(MSG_FAILED_TO_ACQUIRE),
            Ok(result) => self.display_user_info(&result),
            Err(e) => {
                warn!(target: "auth", code = e.code_str(), "profile edit failed");
                self.set_result(format!("Session has expired, please sign out and back in. {}", e.message()));
            }
        }
        self.screen()
    }

    /// Remove every cached account one at a time, re-listing after each removal.
    /// Each account is attempted once; failures are reported but do not block the transition.
    pub async fn sign_out(&self) -> Screen {
        let _guard = self.session_lock.lock().await;
        let mut attempted: HashSet<String> = HashSet::new();
        let mut failures: Vec<String> = Vec::new();
        loop {
            let accounts = match self.acquirer.accounts(None).await {
                Ok(a) => a,
                Err(e) => { failures.push(e.to_string()); break; }
            };
            let Some(next) = accounts.into_iter().find(|a| !attempted.contains(&a.cache_key)) else { break; };
            attempted.insert(next.cache_key.clone());
            if let Err(e) = self.acquirer.remove(&next).await {
                warn!(target: "auth.cache", account = %next.home_account_id, error = %e, "account removal failed");
                failures.push(e.to_string());
            }
        }
        self.set_signed_in(false);
        if !failures.is_empty() {
            self.set_result(format!("Error signing-out user: {}", failures.join("; ")));
        }
        info!(target: "auth", removed = attempted.len(), failed = failures.len(), "signed out");
        self.screen()
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
