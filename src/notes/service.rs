//! Typed note and auth operations over the backend and generator.

use std::sync::Arc;
use tracing::{info, instrument};

use crate::backend::api_types::RedirectTokens;
use crate::backend::types::{
  Credentials, Note, NoteDraft, NoteId, NoteUpdate, Session, SignUpOutcome,
};
use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::generator::{explanation_prompt, Generator};

/// Data access layer.
///
/// Validation happens here, before anything is sent. Each operation is a
/// single call; nothing is retried.
#[derive(Clone)]
pub struct NoteService {
  backend: Arc<dyn Backend>,
  generator: Arc<dyn Generator>,
}

impl NoteService {
  pub fn new(backend: Arc<dyn Backend>, generator: Arc<dyn Generator>) -> Self {
    Self { backend, generator }
  }

  #[instrument(skip_all, fields(email = %credentials.email))]
  pub async fn sign_up(&self, credentials: &Credentials) -> Result<SignUpOutcome> {
    credentials.validate()?;
    let outcome = self.backend.sign_up(credentials).await?;
    info!(
      confirmed = matches!(outcome, SignUpOutcome::SignedIn(_)),
      "account created"
    );
    Ok(outcome)
  }

  #[instrument(skip_all, fields(email = %credentials.email))]
  pub async fn sign_in(&self, credentials: &Credentials) -> Result<Session> {
    credentials.validate()?;
    let session = self.backend.sign_in(credentials).await?;
    info!(user = %session.user_id(), "signed in");
    Ok(session)
  }

  /// Complete an OAuth sign-in from the URL the provider redirected to.
  pub async fn sign_in_with_redirect(&self, redirect_url: &str) -> Result<Session> {
    let tokens = RedirectTokens::from_url(redirect_url)?;
    let user = self.backend.get_user(&tokens.access_token).await?;
    info!(user = %user.id, "signed in via provider");
    Ok(Session {
      access_token: tokens.access_token,
      refresh_token: tokens.refresh_token,
      expires_at: tokens.expires_at,
      user,
    })
  }

  pub fn authorize_url(&self, provider: &str, redirect_to: Option<&str>) -> Result<String> {
    self.backend.authorize_url(provider, redirect_to)
  }

  pub async fn sign_out(&self, session: &Session) -> Result<()> {
    self.backend.sign_out(session).await?;
    info!(user = %session.user_id(), "signed out");
    Ok(())
  }

  /// Return a usable session: unchanged if still valid, refreshed otherwise.
  pub async fn restore_session(&self, session: Session) -> Result<Session> {
    if !session.is_expired() {
      return Ok(session);
    }
    info!(user = %session.user_id(), "refreshing expired session");
    self.backend.refresh_session(&session.refresh_token).await
  }

  /// Notes of the session's user, newest first
  pub async fn list_notes(&self, session: &Session) -> Result<Vec<Note>> {
    self.backend.list_notes(session).await
  }

  #[instrument(skip_all, fields(user = %session.user_id()))]
  pub async fn create_note(&self, session: &Session, draft: &NoteDraft) -> Result<Note> {
    draft.validate()?;
    let note = self.backend.insert_note(session, draft).await?;
    info!(id = %note.id, "note created");
    Ok(note)
  }

  #[instrument(skip_all, fields(id = %id))]
  pub async fn update_note(&self, session: &Session, id: &NoteId, update: &NoteUpdate) -> Result<()> {
    update.validate()?;
    self.backend.update_note(session, id, update).await?;
    info!("note updated");
    Ok(())
  }

  #[instrument(skip_all, fields(id = %id))]
  pub async fn delete_note(&self, session: &Session, id: &NoteId) -> Result<()> {
    self.backend.delete_note(session, id).await?;
    info!("note deleted");
    Ok(())
  }

  /// Ask the generator to explain a note. Nothing is stored.
  pub async fn generate_explanation(&self, title: &str, content: &str) -> Result<String> {
    let prompt = explanation_prompt(title, content);
    self.generator.generate(&prompt).await.map_err(|e| match e {
      // Missing key stays a configuration problem, everything else is a
      // generation failure
      Error::Configuration(_) | Error::Generation(_) => e,
      other => Error::Generation(other.to_string()),
    })
  }

  #[instrument(skip_all, fields(id = %id))]
  pub async fn save_explanation(&self, session: &Session, id: &NoteId, explanation: &str) -> Result<()> {
    if explanation.trim().is_empty() {
      return Err(Error::validation("Explanation is empty"));
    }
    self
      .backend
      .update_explanation(session, id, explanation)
      .await?;
    info!("explanation saved");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::memory::MemoryBackend;
  use crate::error::AuthError;
  use crate::generator::testing::EchoGenerator;

  fn service() -> (NoteService, Arc<MemoryBackend>, Arc<EchoGenerator>) {
    let backend = Arc::new(MemoryBackend::new().with_account("me@notes.dev", "hunter22"));
    let generator = Arc::new(EchoGenerator::default());
    (
      NoteService::new(backend.clone(), generator.clone()),
      backend,
      generator,
    )
  }

  #[tokio::test]
  async fn test_empty_fields_rejected_before_backend_call() {
    let (service, backend, _) = service();
    let session = backend.session_for("me@notes.dev");

    let err = service
      .create_note(&session, &NoteDraft::new("", "C"))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = service
      .create_note(&session, &NoteDraft::new("T", ""))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    assert_eq!(backend.write_calls(), 0);
  }

  #[tokio::test]
  async fn test_created_note_listed_exactly_once() {
    let (service, backend, _) = service();
    let session = backend.session_for("me@notes.dev");

    let created = service
      .create_note(&session, &NoteDraft::new("T", "C"))
      .await
      .unwrap();
    assert_eq!(created.explanation, None);

    let notes = service.list_notes(&session).await.unwrap();
    assert_eq!(notes.iter().filter(|n| n.id == created.id).count(), 1);
    assert_eq!(notes[0].title, "T");
    assert_eq!(notes[0].content, "C");
  }

  #[tokio::test]
  async fn test_deleted_note_never_listed() {
    let (service, backend, _) = service();
    let session = backend.session_for("me@notes.dev");
    let note = service
      .create_note(&session, &NoteDraft::new("T", "C"))
      .await
      .unwrap();

    service.delete_note(&session, &note.id).await.unwrap();
    let notes = service.list_notes(&session).await.unwrap();
    assert!(notes.iter().all(|n| n.id != note.id));

    let err = service.delete_note(&session, &note.id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
  }

  #[tokio::test]
  async fn test_update_leaves_explanation_alone() {
    let (service, backend, _) = service();
    let session = backend.session_for("me@notes.dev");
    let note = service
      .create_note(&session, &NoteDraft::new("T", "C").with_explanation("E"))
      .await
      .unwrap();

    service
      .update_note(&session, &note.id, &NoteUpdate::new("T2", "C2"))
      .await
      .unwrap();

    let stored = backend.stored(&note.id).unwrap();
    assert_eq!(stored.title, "T2");
    assert_eq!(stored.content, "C2");
    assert_eq!(stored.explanation.as_deref(), Some("E"));
  }

  #[tokio::test]
  async fn test_update_unknown_id_is_not_found() {
    let (service, backend, _) = service();
    let session = backend.session_for("me@notes.dev");
    let err = service
      .update_note(&session, &NoteId::from("404"), &NoteUpdate::new("T", "C"))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
  }

  #[tokio::test]
  async fn test_generation_does_not_touch_stored_note() {
    let (service, backend, generator) = service();
    let session = backend.session_for("me@notes.dev");
    let note = service
      .create_note(&session, &NoteDraft::new("T", "C"))
      .await
      .unwrap();
    let writes = backend.write_calls();

    let first = service.generate_explanation("T", "C").await.unwrap();
    let second = service.generate_explanation("T", "C").await.unwrap();
    assert_ne!(first, second);
    assert_eq!(generator.calls(), 2);

    assert_eq!(backend.write_calls(), writes);
    let stored = backend.stored(&note.id).unwrap();
    assert_eq!(stored.explanation, None);
    assert_eq!((stored.title.as_str(), stored.content.as_str()), ("T", "C"));

    service
      .save_explanation(&session, &note.id, &first)
      .await
      .unwrap();
    let stored = backend.stored(&note.id).unwrap();
    assert_eq!(stored.explanation.as_deref(), Some(first.as_str()));
    assert_eq!((stored.title.as_str(), stored.content.as_str()), ("T", "C"));
  }

  #[tokio::test]
  async fn test_generation_failure_is_generation_error() {
    let backend = Arc::new(MemoryBackend::new());
    let service = NoteService::new(backend, Arc::new(EchoGenerator::failing()));
    let err = service.generate_explanation("T", "C").await.unwrap_err();
    assert!(matches!(err, Error::Generation(_)));
  }

  #[tokio::test]
  async fn test_sign_up_then_duplicate() {
    let (service, _, _) = service();
    let creds = Credentials::new("a@b.com", "secret1");

    let outcome = service.sign_up(&creds).await.unwrap();
    assert!(matches!(outcome, SignUpOutcome::SignedIn(_)));

    let err = service.sign_up(&creds).await.unwrap_err();
    assert_eq!(err, Error::Auth(AuthError::AlreadyRegistered));
  }

  #[tokio::test]
  async fn test_wrong_password_is_auth_error() {
    let (service, _, _) = service();
    let err = service
      .sign_in(&Credentials::new("me@notes.dev", "wrong-password"))
      .await
      .unwrap_err();
    assert_eq!(err, Error::Auth(AuthError::InvalidCredentials));
  }

  #[tokio::test]
  async fn test_invalid_credentials_rejected_locally() {
    let (service, _, _) = service();
    let err = service
      .sign_in(&Credentials::new("not-an-email", "secret1"))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
  }

  #[tokio::test]
  async fn test_restore_refreshes_expired_session() {
    let (service, backend, _) = service();
    let mut session = backend.session_for("me@notes.dev");
    session.expires_at = Some(chrono::Utc::now() - chrono::Duration::minutes(1));
    session.access_token = "old".to_string();

    let restored = service.restore_session(session).await.unwrap();
    assert!(!restored.is_expired());
    assert_ne!(restored.access_token, "old");
  }

  #[tokio::test]
  async fn test_sign_in_with_redirect() {
    let (service, backend, _) = service();
    let token = backend.session_for("me@notes.dev").access_token;
    let session = service
      .sign_in_with_redirect(&format!(
        "http://localhost:3000/note#access_token={}&refresh_token=r&expires_in=3600",
        token
      ))
      .await
      .unwrap();
    assert_eq!(session.user.email.as_deref(), Some("me@notes.dev"));
    assert_eq!(session.refresh_token, "r");
  }
}
