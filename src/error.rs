//! Error taxonomy for token acquisition, claims decoding and the session cache.
//! Every provider failure is classified into exactly one `AuthError` variant before
//! the orchestrator decides what to do next; `classify_provider_error` is the only place
//! provider error codes are interpreted.

use thiserror::Error;

/// B2C error code signalling that the user picked "forgot password" on the sign-in page.
pub const PASSWORD_RESET_CODE: &str = "AADB2C90118";
/// B2C error code for a user cancelling the hosted flow.
pub const USER_CANCELLED_CODE: &str = "AADB2C90091";
pub const CANCELED_CODE: &str = "authentication_canceled";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No usable cached credential; the caller has to go interactive.
    #[error("{message}")]
    UiInteractionRequired { code: String, message: String },
    /// The provider asked for the password-reset policy instead.
    #[error("{message}")]
    PasswordResetRequested { code: String, message: String },
    /// Any other provider-reported failure, message kept verbatim for display.
    #[error("{message}")]
    GenericProviderError { code: String, message: String },
    #[error("{message}")]
    TransportError { code: String, message: String },
}

impl AuthError {
    pub fn code_str(&self) -> &str {
        match self {
            AuthError::UiInteractionRequired { code, .. }
            | AuthError::PasswordResetRequested { code, .. }
            | AuthError::GenericProviderError { code, .. }
            | AuthError::TransportError { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AuthError::UiInteractionRequired { message, .. }
            | AuthError::PasswordResetRequested { message, .. }
            | AuthError::GenericProviderError { message, .. }
            | AuthError::TransportError { message, .. } => message.as_str(),
        }
    }

    pub fn ui_required<S: Into<String>>(code: S, msg: S) -> Self { AuthError::UiInteractionRequired { code: code.into(), message: msg.into() } }
    pub fn password_reset<S: Into<String>>(code: S, msg: S) -> Self { AuthError::PasswordResetRequested { code: code.into(), message: msg.into() } }
    pub fn provider<S: Into<String>>(code: S, msg: S) -> Self { AuthError::GenericProviderError { code: code.into(), message: msg.into() } }
    pub fn transport<S: Into<String>>(msg: S) -> Self { AuthError::TransportError { code: "transport_error".into(), message: msg.into() } }
    pub fn canceled<S: Into<String>>(msg: S) -> Self { AuthError::GenericProviderError { code: CANCELED_CODE.into(), message: msg.into() } }

    pub fn no_account() -> Self {
        AuthError::ui_required("no_account", "No account or login hint was passed to the silent acquisition call.")
    }

    pub fn is_ui_required(&self) -> bool { matches!(self, AuthError::UiInteractionRequired { .. }) }
    pub fn is_password_reset(&self) -> bool { matches!(self, AuthError::PasswordResetRequested { .. }) }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::transport(err.to_string())
    }
}

/// Map a provider `error` / `error_description` pair onto the taxonomy.
///
/// The password-reset code is matched as a substring of either field; providers embed it in
/// the description text rather than in a dedicated field.
pub fn classify_provider_error(code: &str, description: &str) -> AuthError {
    let message = if description.is_empty() { code.to_string() } else { description.to_string() };
    if code.contains(PASSWORD_RESET_CODE) || description.contains(PASSWORD_RESET_CODE) {
        return AuthError::password_reset(code.to_string(), message);
    }
    if code == "access_denied" || code.contains(USER_CANCELLED_CODE) || description.contains(USER_CANCELLED_CODE) {
        return AuthError::canceled(message);
    }
    match code {
        "invalid_grant" | "interaction_required" | "login_required" | "consent_required" => {
            AuthError::ui_required(code.to_string(), message)
        }
        _ => AuthError::provider(code.to_string(), message),
    }
}

/// Failure to turn a compact token into a claim set. Display-only; never fatal to session state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedTokenError {
    #[error("malformed token: expected 3 dot-separated segments, found {0}")]
    SegmentCount(usize),
    #[error("malformed token: payload is not base64url: {0}")]
    Base64(String),
    #[error("malformed token: payload is not JSON: {0}")]
    Json(String),
    #[error("malformed token: payload is not a JSON object")]
    NotAnObject,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("session cache error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("configuration value '{0}' is required")]
    Missing(&'static str),
    #[error("configuration value '{field}' is invalid: {message}")]
    Invalid { field: &'static str, message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
