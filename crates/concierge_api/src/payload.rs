use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Scheme tag stored alongside every token.
pub const BEARER: &str = "bearer";

/// Form body for the password grant on `/auth/token`.
#[derive(Debug, Clone, Serialize)]
pub struct PasswordGrant<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub grant_type: &'static str,
}

impl<'a> PasswordGrant<'a> {
    pub fn new(username: &'a str, password: &'a str) -> Self {
        Self {
            username,
            password,
            grant_type: "password",
        }
    }
}

/// JSON user record posted to `/auth/` on signup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "user".to_string()
}

impl SignupRequest {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            first_name: String::new(),
            last_name: String::new(),
            password: password.into(),
            role: default_role(),
        }
    }

    pub fn with_names(mut self, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        self.first_name = first_name.into();
        self.last_name = last_name.into();
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub message: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct OAuthCallbackRequest<'a> {
    pub code: &'a str,
}

/// Body of `PUT /user/password`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordChange {
    pub password: String,
    pub new_password: String,
}

impl PasswordChange {
    pub fn new(password: impl Into<String>, new_password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            new_password: new_password.into(),
        }
    }
}

impl fmt::Debug for PasswordChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordChange").finish_non_exhaustive()
    }
}

/// Opaque bearer credential plus its scheme tag.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    BEARER.to_string()
}

impl AccessToken {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            access_token: token.into(),
            token_type: default_token_type(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.access_token
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.access_token.trim())
    }

    /// Normalize a token response.
    ///
    /// The server may answer with a raw JSON string or with an object carrying
    /// `access_token` (or `token`) and an optional `token_type`.
    pub fn from_response(value: &Value) -> Option<Self> {
        match value {
            Value::String(raw) => non_empty(raw).map(Self::bearer),
            Value::Object(fields) => {
                let token = fields
                    .get("access_token")
                    .and_then(Value::as_str)
                    .and_then(non_empty)
                    .or_else(|| fields.get("token").and_then(Value::as_str).and_then(non_empty))?;
                let token_type = fields
                    .get("token_type")
                    .and_then(Value::as_str)
                    .and_then(non_empty)
                    .map(str::to_ascii_lowercase)
                    .unwrap_or_else(default_token_type);
                Some(Self {
                    access_token: token.to_string(),
                    token_type,
                })
            }
            _ => None,
        }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token_type", &self.token_type)
            .finish_non_exhaustive()
    }
}

/// Normalize the OAuth start response: a raw string or `{url|authorization_url}`.
pub fn redirect_url_from_response(value: &Value) -> Option<String> {
    match value {
        Value::String(raw) => non_empty(raw).map(ToString::to_string),
        Value::Object(fields) => fields
            .get("url")
            .and_then(Value::as_str)
            .and_then(non_empty)
            .or_else(|| {
                fields
                    .get("authorization_url")
                    .and_then(Value::as_str)
                    .and_then(non_empty)
            })
            .map(ToString::to_string),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl UserProfile {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            first_name: None,
            last_name: None,
        }
    }

    /// Normalize `GET /user/`, which may return a bare username string.
    pub fn from_response(value: Value) -> Result<Self, serde_json::Error> {
        match value {
            Value::String(username) => Ok(Self::new(username, "")),
            other => serde_json::from_value(other),
        }
    }

    /// Avatar initial: first name, then username, then `U`.
    pub fn initial(&self) -> char {
        [self.first_name.as_deref(), Some(self.username.as_str())]
            .into_iter()
            .flatten()
            .find_map(|value| value.trim().chars().next())
            .map(|ch| ch.to_uppercase().next().unwrap_or(ch))
            .unwrap_or('U')
    }

    pub fn display_name(&self) -> String {
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if full.is_empty() {
            self.username.clone()
        } else {
            full
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BookingStatus {
    Confirmed,
    Pending,
    Failed,
    Other(String),
}

impl BookingStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Confirmed => "CONFIRMED",
            Self::Pending => "PENDING",
            Self::Failed => "FAILED",
            Self::Other(value) => value,
        }
    }
}

impl From<String> for BookingStatus {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "CONFIRMED" => Self::Confirmed,
            "PENDING" => Self::Pending,
            "FAILED" => Self::Failed,
            _ => Self::Other(value),
        }
    }
}

impl From<BookingStatus> for String {
    fn from(value: BookingStatus) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub destination: String,
    pub date: String,
    pub status: BookingStatus,
    #[serde(deserialize_with = "string_or_number")]
    pub amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

impl Booking {
    /// Invoice download link; only confirmed bookings have one.
    pub fn download_url(&self, download_base: &str) -> Option<String> {
        if self.status != BookingStatus::Confirmed {
            return None;
        }
        Some(booking_download_url(download_base, &self.id))
    }
}

pub fn booking_download_url(download_base: &str, booking_id: &str) -> String {
    format!(
        "{}/booking/{}/download",
        download_base.trim().trim_end_matches('/'),
        booking_id.trim()
    )
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(value) => Ok(value),
        Value::Number(value) => Ok(value.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
