//! Remote backend: hosted auth + `notes` table.

pub mod api_types;
pub mod client;
#[cfg(test)]
pub mod memory;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use types::{Credentials, Note, NoteDraft, NoteId, NoteUpdate, Session, SignUpOutcome, User};

/// Operations the app needs from the hosted backend.
///
/// Each call is one request/response; implementors do not retry.
#[async_trait]
pub trait Backend: Send + Sync {
  async fn sign_up(&self, credentials: &Credentials) -> Result<SignUpOutcome>;

  async fn sign_in(&self, credentials: &Credentials) -> Result<Session>;

  async fn sign_out(&self, session: &Session) -> Result<()>;

  async fn refresh_session(&self, refresh_token: &str) -> Result<Session>;

  async fn get_user(&self, access_token: &str) -> Result<User>;

  /// URL the user opens to sign in with an OAuth provider
  fn authorize_url(&self, provider: &str, redirect_to: Option<&str>) -> Result<String>;

  /// Notes owned by the session's user, newest first
  async fn list_notes(&self, session: &Session) -> Result<Vec<Note>>;

  async fn insert_note(&self, session: &Session, draft: &NoteDraft) -> Result<Note>;

  async fn update_note(&self, session: &Session, id: &NoteId, update: &NoteUpdate) -> Result<()>;

  async fn update_explanation(&self, session: &Session, id: &NoteId, explanation: &str)
    -> Result<()>;

  async fn delete_note(&self, session: &Session, id: &NoteId) -> Result<()>;
}
