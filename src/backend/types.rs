use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Backend-assigned note id. Kept opaque: tables may use uuid or bigint keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(pub String);

impl fmt::Display for NoteId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for NoteId {
  fn from(s: &str) -> Self {
    NoteId(s.to_string())
  }
}

/// Signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id: String,
  pub email: Option<String>,
}

/// Auth session issued by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  pub access_token: String,
  pub refresh_token: String,
  pub expires_at: Option<DateTime<Utc>>,
  pub user: User,
}

impl Session {
  pub fn user_id(&self) -> &str {
    &self.user.id
  }

  /// Expired sessions are refreshed before use. A small margin avoids
  /// handing out a token that dies in flight.
  pub fn is_expired(&self) -> bool {
    match self.expires_at {
      Some(at) => at - chrono::Duration::seconds(30) <= Utc::now(),
      None => false,
    }
  }
}

/// A stored note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
  pub id: NoteId,
  pub title: String,
  pub content: String,
  pub explanation: Option<String>,
  pub created_at: DateTime<Utc>,
  pub user_id: String,
}

impl Note {
  /// Explanation action is offered only while none is stored.
  pub fn can_explain(&self) -> bool {
    self
      .explanation
      .as_deref()
      .map(|e| e.trim().is_empty())
      .unwrap_or(true)
  }
}

/// Input for creating a note
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteDraft {
  pub title: String,
  pub content: String,
  pub explanation: Option<String>,
}

impl NoteDraft {
  pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
    Self {
      title: title.into(),
      content: content.into(),
      explanation: None,
    }
  }

  pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
    self.explanation = Some(explanation.into());
    self
  }

  pub fn validate(&self) -> Result<()> {
    validate_title_content(&self.title, &self.content)
  }

  /// Blank explanations are stored as absent.
  pub fn explanation(&self) -> Option<&str> {
    self
      .explanation
      .as_deref()
      .filter(|e| !e.trim().is_empty())
  }
}

/// Edit of an existing note. Never touches the explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteUpdate {
  pub title: String,
  pub content: String,
}

impl NoteUpdate {
  pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
    Self {
      title: title.into(),
      content: content.into(),
    }
  }

  pub fn validate(&self) -> Result<()> {
    validate_title_content(&self.title, &self.content)
  }
}

fn validate_title_content(title: &str, content: &str) -> Result<()> {
  if title.trim().is_empty() {
    return Err(Error::validation("Title is required"));
  }
  if content.trim().is_empty() {
    return Err(Error::validation("Content is required"));
  }
  Ok(())
}

/// Email/password pair, validated the same way for sign in and sign up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
  pub email: String,
  pub password: String,
}

pub const MIN_PASSWORD_LEN: usize = 6;

impl Credentials {
  pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
    Self {
      email: email.into().trim().to_string(),
      password: password.into(),
    }
  }

  pub fn validate(&self) -> Result<()> {
    if !looks_like_email(&self.email) {
      return Err(Error::validation("Please enter a valid email"));
    }
    if self.password.chars().count() < MIN_PASSWORD_LEN {
      return Err(Error::validation(format!(
        "Password must be at least {} characters",
        MIN_PASSWORD_LEN
      )));
    }
    Ok(())
  }
}

fn looks_like_email(s: &str) -> bool {
  let Some((local, domain)) = s.split_once('@') else {
    return false;
  };
  if local.is_empty() || s.chars().any(char::is_whitespace) || domain.contains('@') {
    return false;
  }
  match domain.rsplit_once('.') {
    Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
    None => false,
  }
}

/// Result of a successful sign-up call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
  /// Account created and signed in
  SignedIn(Session),
  /// Account created, email confirmation pending
  ConfirmationRequired { email: String },
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_draft_requires_title_and_content() {
    assert!(NoteDraft::new("T", "C").validate().is_ok());
    assert_eq!(
      NoteDraft::new("", "C").validate(),
      Err(Error::validation("Title is required"))
    );
    assert_eq!(
      NoteDraft::new("T", "   ").validate(),
      Err(Error::validation("Content is required"))
    );
  }

  #[test]
  fn test_blank_explanation_is_absent() {
    let draft = NoteDraft::new("T", "C").with_explanation("  ");
    assert_eq!(draft.explanation(), None);
  }

  #[test]
  fn test_credentials_validation() {
    assert!(Credentials::new("a@b.com", "secret1").validate().is_ok());
    assert!(Credentials::new(" a@b.com ", "secret1").validate().is_ok());
    assert!(Credentials::new("a@b", "secret1").validate().is_err());
    assert!(Credentials::new("@b.com", "secret1").validate().is_err());
    assert!(Credentials::new("a b@c.com", "secret1").validate().is_err());
    assert_eq!(
      Credentials::new("a@b.com", "12345").validate(),
      Err(Error::validation("Password must be at least 6 characters"))
    );
  }

  #[test]
  fn test_can_explain() {
    let mut note = Note {
      id: "1".into(),
      title: "T".into(),
      content: "C".into(),
      explanation: None,
      created_at: Utc::now(),
      user_id: "u".into(),
    };
    assert!(note.can_explain());
    note.explanation = Some("simple".into());
    assert!(!note.can_explain());
  }
}
