//! Serde types matching the auth (GoTrue) and table (PostgREST) responses.
//!
//! These are kept apart from the domain types in `types.rs` so wire quirks
//! (numeric ids, timestamps without offsets, the two auth error shapes) stay
//! out of the rest of the crate.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{Note, NoteId, Session, User};
use crate::error::{AuthError, Error, Result};

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiUser {
  pub id: String,
  pub email: Option<String>,
  /// Present on sign-up replies. An empty list marks an existing account.
  pub identities: Option<Vec<Value>>,
}

impl From<ApiUser> for User {
  fn from(u: ApiUser) -> Self {
    User {
      id: u.id,
      email: u.email,
    }
  }
}

/// Token endpoint reply (password grant, refresh grant, and auto-confirmed
/// sign-up).
#[derive(Debug, Deserialize)]
pub struct ApiSession {
  pub access_token: String,
  pub refresh_token: String,
  pub expires_in: Option<i64>,
  /// Unix seconds
  pub expires_at: Option<i64>,
  pub user: ApiUser,
}

impl ApiSession {
  pub fn into_session(self) -> Session {
    let expires_at = expiry(self.expires_at, self.expires_in);
    Session {
      access_token: self.access_token,
      refresh_token: self.refresh_token,
      expires_at,
      user: self.user.into(),
    }
  }
}

fn expiry(expires_at: Option<i64>, expires_in: Option<i64>) -> Option<DateTime<Utc>> {
  match (expires_at, expires_in) {
    (Some(at), _) => Utc.timestamp_opt(at, 0).single(),
    (None, Some(secs)) => Some(Utc::now() + chrono::Duration::seconds(secs)),
    (None, None) => None,
  }
}

/// Sign-up reply: either a full session, or (when email confirmation is on)
/// the bare user object at the top level.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiSignUpResponse {
  Session(ApiSession),
  User(ApiUser),
}

/// Both error shapes GoTrue has used over time are accepted.
#[derive(Debug, Default, Deserialize)]
pub struct ApiAuthError {
  pub error: Option<String>,
  pub error_description: Option<String>,
  pub error_code: Option<String>,
  pub msg: Option<String>,
  pub message: Option<String>,
}

impl ApiAuthError {
  pub fn message(&self) -> String {
    self
      .error_description
      .as_ref()
      .or(self.msg.as_ref())
      .or(self.message.as_ref())
      .or(self.error.as_ref())
      .cloned()
      .unwrap_or_else(|| "Authentication failed".to_string())
  }

  pub fn into_auth_error(self) -> AuthError {
    let message = self.message();
    let lower = message.to_lowercase();
    let code = self.error_code.as_deref().unwrap_or("");

    if code == "invalid_credentials" || lower.contains("invalid login credentials") {
      AuthError::InvalidCredentials
    } else if code == "email_not_confirmed" || lower.contains("email not confirmed") {
      AuthError::EmailNotConfirmed
    } else if code == "user_already_exists"
      || code == "email_exists"
      || lower.contains("already registered")
    {
      AuthError::AlreadyRegistered
    } else if code == "bad_jwt" || code == "session_not_found" {
      AuthError::SessionExpired
    } else {
      AuthError::Rejected(message)
    }
  }
}

/// Tokens carried in the fragment of an OAuth redirect
/// (`...#access_token=..&refresh_token=..&expires_in=..`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTokens {
  pub access_token: String,
  pub refresh_token: String,
  pub expires_at: Option<DateTime<Utc>>,
}

impl RedirectTokens {
  pub fn from_url(redirect: &str) -> Result<Self> {
    let parsed = url::Url::parse(redirect.trim())
      .map_err(|e| Error::validation(format!("Not a valid redirect URL: {}", e)))?;

    // Some providers put the error in the query instead of the fragment
    let params: Vec<(String, String)> = parsed
      .fragment()
      .map(|f| {
        url::form_urlencoded::parse(f.as_bytes())
          .into_owned()
          .collect::<Vec<_>>()
      })
      .unwrap_or_default()
      .into_iter()
      .chain(parsed.query_pairs().into_owned())
      .collect();

    let get = |name: &str| {
      params
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.clone())
    };

    if let Some(description) = get("error_description").or_else(|| get("error")) {
      return Err(AuthError::Rejected(description).into());
    }

    let access_token = get("access_token")
      .ok_or_else(|| Error::validation("Redirect URL has no access_token"))?;
    let refresh_token = get("refresh_token")
      .ok_or_else(|| Error::validation("Redirect URL has no refresh_token"))?;
    let expires_at = expiry(
      get("expires_at").and_then(|v| v.parse().ok()),
      get("expires_in").and_then(|v| v.parse().ok()),
    );

    Ok(Self {
      access_token,
      refresh_token,
      expires_at,
    })
  }
}

// ============================================================================
// Notes table
// ============================================================================

/// PostgREST error body
#[derive(Debug, Default, Deserialize)]
pub struct ApiRestError {
  pub code: Option<String>,
  pub message: Option<String>,
  pub details: Option<String>,
}

impl ApiRestError {
  pub fn message(&self) -> String {
    match (&self.message, &self.details) {
      (Some(m), Some(d)) => format!("{} ({})", m, d),
      (Some(m), None) => m.clone(),
      _ => self.code.clone().unwrap_or_else(|| "request failed".to_string()),
    }
  }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiId {
  Int(i64),
  Str(String),
}

impl From<ApiId> for NoteId {
  fn from(id: ApiId) -> Self {
    match id {
      ApiId::Int(n) => NoteId(n.to_string()),
      ApiId::Str(s) => NoteId(s),
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiNote {
  pub id: ApiId,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub content: String,
  pub explanation: Option<String>,
  pub created_at: String,
  pub user_id: String,
}

impl ApiNote {
  pub fn into_note(self) -> Result<Note> {
    let created_at = parse_timestamp(&self.created_at)?;
    Ok(Note {
      id: self.id.into(),
      title: self.title,
      content: self.content,
      explanation: self.explanation,
      created_at,
      user_id: self.user_id,
    })
  }
}

/// Row sent on insert. `explanation` is sent as null when absent.
#[derive(Debug, Serialize)]
pub struct ApiNewNote<'a> {
  pub title: &'a str,
  pub content: &'a str,
  pub user_id: &'a str,
  pub explanation: Option<&'a str>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiExplanationPatch<'a> {
  pub explanation: &'a str,
}

/// Accepts `timestamptz` output as well as plain `timestamp` columns.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Ok(dt.with_timezone(&Utc));
  }
  ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    .map(|dt| dt.and_utc())
    .ok_or_else(|| Error::Transport(format!("Unexpected timestamp '{}'", s)))
}
