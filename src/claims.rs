//! ID-token claims: decode the payload segment of a compact token and render the
//! user-facing summary shown after sign-in.
//!
//! No signature verification happens here. Decoded claims are for display only and must not
//! be treated as verified identity unless the token was validated upstream.

use base64::Engine;
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

use crate::error::MalformedTokenError;

/// Claim name -> value, as found in the token payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClaimSet(Map<String, Value>);

impl ClaimSet {
    pub fn from_map(map: Map<String, Value>) -> Self { ClaimSet(map) }

    pub fn get(&self, name: &str) -> Option<&Value> { self.0.get(name) }

    /// Scalar claim as text. Numbers and booleans are stringified; arrays/objects/null are not scalars.
    pub fn get_str(&self, name: &str) -> Option<String> {
        match self.0.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Multi-valued claim (e.g. `emails`). `None` when the claim is absent or not an array.
    pub fn get_strings(&self, name: &str) -> Option<Vec<String>> {
        let arr = self.0.get(name)?.as_array()?;
        Some(arr.iter().map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }).collect())
    }

    pub fn contains(&self, name: &str) -> bool { self.0.contains_key(name) }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> { self.0.iter() }
    pub fn into_map(self) -> Map<String, Value> { self.0 }
}

/// Decode the middle segment of a three-segment compact token into a claim set.
pub fn decode_id_token(id_token: &str) -> Result<ClaimSet, MalformedTokenError> {
    let segments: Vec<&str> = id_token.split('.').collect();
    if segments.len() != 3 {
        return Err(MalformedTokenError::SegmentCount(segments.len()));
    }
    let bytes = base64url_decode(segments[1])?;
    let value: Value = serde_json::from_slice(&bytes).map_err(|e| MalformedTokenError::Json(e.to_string()))?;
    match value {
        Value::Object(map) => Ok(ClaimSet(map)),
        _ => Err(MalformedTokenError::NotAnObject),
    }
}

/// URL-safe alphabet mapped onto the standard one, then `=`-padded to a multiple of 4.
fn base64url_decode(segment: &str) -> Result<Vec<u8>, MalformedTokenError> {
    let mut s: String = segment.chars().map(|c| match c { '-' => '+', '_' => '/', c => c }).collect();
    while s.len() % 4 != 0 { s.push('='); }
    base64::engine::general_purpose::STANDARD
        .decode(s.as_bytes())
        .map_err(|e| MalformedTokenError::Base64(e.to_string()))
}

/// The profile summary rendered after each successful acquisition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfo {
    pub name: String,
    pub object_id: String,
    pub street_address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub job_title: String,
    /// First entry of the `emails` claim; `None` when the claim is not an array.
    pub email: Option<String>,
    pub identity_provider: String,
}

impl UserInfo {
    pub fn from_claims(claims: &ClaimSet) -> Self {
        let s = |name: &str| claims.get_str(name).unwrap_or_default();
        Self {
            name: s("name"),
            object_id: s("oid"),
            street_address: s("streetAddress"),
            city: s("city"),
            state: s("state"),
            country: s("country"),
            job_title: s("jobTitle"),
            email: claims.get_strings("emails").map(|v| v.into_iter().next().unwrap_or_default()),
            identity_provider: s("iss"),
        }
    }
}

impl Display for UserInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Name: {}", self.name)?;
        writeln!(f, "User Identifier: {}", self.object_id)?;
        writeln!(f, "Street Address: {}", self.street_address)?;
        writeln!(f, "City: {}", self.city)?;
        writeln!(f, "State: {}", self.state)?;
        writeln!(f, "Country: {}", self.country)?;
        writeln!(f, "Job Title: {}", self.job_title)?;
        if let Some(email) = &self.email {
            writeln!(f, "Emails: {}", email)?;
        }
        writeln!(f, "Identity Provider: {}", self.identity_provider)
    }
}

#[cfg(test)]
#[path = "claims_tests.rs"]
mod tests;
