//! Redacting wrapper for bearer material (access tokens, refresh tokens, codes, PKCE verifiers).

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

/// A string that never prints its contents through `Debug` or `Display`.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new<S: Into<String>>(s: S) -> Self { Secret(s.into()) }

    /// Raw value, for the one place it is actually needed (a header or a form body).
    pub fn expose(&self) -> &str { &self.0 }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl From<String> for Secret {
    fn from(s: String) -> Self { Secret(s) }
}

impl From<&str> for Secret {
    fn from(s: &str) -> Self { Secret(s.to_string()) }
}

impl Debug for Secret {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str("Secret(***)") }
}

impl Display for Secret {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str("***") }
}
