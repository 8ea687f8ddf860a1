//! Error taxonomy shared by the data access layer, the cache and the views.
//!
//! Every variant carries owned strings so the error is `Clone`: a single
//! failed fetch is handed to every caller that joined it.

/// Reasons the auth backend refused a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
  #[error("Invalid login credentials")]
  InvalidCredentials,

  #[error("User already registered")]
  AlreadyRegistered,

  #[error("Email not confirmed")]
  EmailNotConfirmed,

  /// Access token rejected or expired.
  #[error("Session expired, please sign in again")]
  SessionExpired,

  #[error("{0}")]
  Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
  #[error(transparent)]
  Auth(#[from] AuthError),

  #[error("{0}")]
  Validation(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("explanation failed: {0}")]
  Generation(String),

  #[error("network error: {0}")]
  Transport(String),

  #[error("configuration error: {0}")]
  Configuration(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
  fn from(e: reqwest::Error) -> Self {
    Error::Transport(e.to_string())
  }
}

impl Error {
  pub fn validation(msg: impl Into<String>) -> Self {
    Error::Validation(msg.into())
  }

  /// Whether the failure means the session must be dropped.
  pub fn is_session_expired(&self) -> bool {
    matches!(self, Error::Auth(AuthError::SessionExpired))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_auth_messages_are_user_facing() {
    let err: Error = AuthError::InvalidCredentials.into();
    assert_eq!(err.to_string(), "Invalid login credentials");

    let err: Error = AuthError::AlreadyRegistered.into();
    assert_eq!(err.to_string(), "User already registered");
  }

  #[test]
  fn test_session_expired_detection() {
    assert!(Error::Auth(AuthError::SessionExpired).is_session_expired());
    assert!(!Error::Transport("down".into()).is_session_expired());
  }
}
