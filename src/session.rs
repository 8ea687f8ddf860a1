//! Process-wide auth state.
//!
//! One [`SessionContext`] owns the current [`AuthState`]. Views subscribe to
//! it and redirect on change; only sign in, sign out, token refresh and
//! startup restore write to it.

use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use crate::backend::types::Session;
use crate::db::SessionStore;
use crate::error::{AuthError, Error, Result};
use crate::notes::NoteService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
  /// Startup: stored session not yet checked
  Loading,
  SignedOut,
  SignedIn(Session),
}

impl AuthState {
  pub fn session(&self) -> Option<&Session> {
    match self {
      AuthState::SignedIn(session) => Some(session),
      _ => None,
    }
  }
}

#[derive(Clone)]
pub struct SessionContext {
  state: Arc<watch::Sender<AuthState>>,
  store: Option<Arc<SessionStore>>,
  /// Held while a token refresh is in flight
  refreshing: Arc<Mutex<()>>,
}

impl SessionContext {
  pub fn new(store: Option<Arc<SessionStore>>) -> Self {
    let (state, _) = watch::channel(AuthState::Loading);
    Self {
      state: Arc::new(state),
      store,
      refreshing: Arc::new(Mutex::new(())),
    }
  }

  pub fn subscribe(&self) -> watch::Receiver<AuthState> {
    self.state.subscribe()
  }

  pub fn current(&self) -> AuthState {
    self.state.borrow().clone()
  }

  pub fn session(&self) -> Option<Session> {
    self.state.borrow().session().cloned()
  }

  pub fn sign_in(&self, session: Session) {
    if let Some(store) = &self.store {
      if let Err(e) = store.save(&session) {
        warn!(error = %e, "failed to persist session");
      }
    }
    info!(user = %session.user_id(), "session started");
    self.state.send_replace(AuthState::SignedIn(session));
  }

  pub fn sign_out(&self) {
    if let Some(store) = &self.store {
      if let Err(e) = store.clear() {
        warn!(error = %e, "failed to clear stored session");
      }
    }
    info!("session ended");
    self.state.send_replace(AuthState::SignedOut);
  }

  /// The current session, with its access token refreshed first if it has
  /// expired. A session that cannot be refreshed is ended.
  pub async fn active(&self, service: &NoteService) -> Result<Session> {
    let _refresh = self.refreshing.lock().await;
    let Some(session) = self.session() else {
      return Err(AuthError::SessionExpired.into());
    };
    if !session.is_expired() {
      return Ok(session);
    }

    match service.restore_session(session).await {
      Ok(session) => {
        self.sign_in(session.clone());
        Ok(session)
      }
      Err(e) => {
        warn!(error = %e, "session refresh failed");
        self.sign_out();
        Err(AuthError::SessionExpired.into())
      }
    }
  }

  /// End the session if `error` says the backend no longer accepts it.
  pub fn end_if_expired(&self, error: &Error) {
    if error.is_session_expired() && self.session().is_some() {
      info!("access token rejected");
      self.sign_out();
    }
  }

  /// Resolve `Loading` from the stored session: reuse it, refresh it when
  /// expired, or sign out if that fails.
  pub async fn restore(&self, service: &NoteService) {
    let stored = match &self.store {
      Some(store) => store.load().unwrap_or_else(|e| {
        warn!(error = %e, "failed to read stored session");
        None
      }),
      None => None,
    };

    let Some(session) = stored else {
      self.sign_out();
      return;
    };

    match service.restore_session(session).await {
      Ok(session) => self.sign_in(session),
      Err(e) => {
        warn!(error = %e, "stored session could not be restored");
        self.sign_out();
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::memory::MemoryBackend;
  use crate::generator::testing::EchoGenerator;

  fn service(backend: &Arc<MemoryBackend>) -> NoteService {
    NoteService::new(backend.clone(), Arc::new(EchoGenerator::default()))
  }

  #[tokio::test]
  async fn test_subscribers_see_transitions() {
    let backend = Arc::new(MemoryBackend::new().with_account("me@notes.dev", "hunter22"));
    let ctx = SessionContext::new(None);
    let mut rx = ctx.subscribe();
    assert_eq!(*rx.borrow(), AuthState::Loading);

    let session = backend.session_for("me@notes.dev");
    ctx.sign_in(session.clone());
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), AuthState::SignedIn(session));

    ctx.sign_out();
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), AuthState::SignedOut);
    assert_eq!(ctx.session(), None);
  }

  #[tokio::test]
  async fn test_restore_without_stored_session_signs_out() {
    let backend = Arc::new(MemoryBackend::new());
    let store = Arc::new(SessionStore::open_in_memory().unwrap());
    let ctx = SessionContext::new(Some(store));
    ctx.restore(&service(&backend)).await;
    assert_eq!(ctx.current(), AuthState::SignedOut);
  }

  #[tokio::test]
  async fn test_sign_in_persists_and_restore_reuses() {
    let backend = Arc::new(MemoryBackend::new().with_account("me@notes.dev", "hunter22"));
    let store = Arc::new(SessionStore::open_in_memory().unwrap());
    let session = backend.session_for("me@notes.dev");

    SessionContext::new(Some(store.clone())).sign_in(session.clone());

    let ctx = SessionContext::new(Some(store));
    ctx.restore(&service(&backend)).await;
    assert_eq!(ctx.session(), Some(session));
  }

  #[tokio::test]
  async fn test_unrefreshable_session_is_cleared() {
    let backend = Arc::new(MemoryBackend::new());
    let store = Arc::new(SessionStore::open_in_memory().unwrap());
    let mut stale = Arc::new(MemoryBackend::new().with_account("x@y.io", "secret1"))
      .session_for("x@y.io");
    stale.expires_at = Some(chrono::Utc::now() - chrono::Duration::hours(1));
    store.save(&stale).unwrap();

    let ctx = SessionContext::new(Some(store.clone()));
    ctx.restore(&service(&backend)).await;
    assert_eq!(ctx.current(), AuthState::SignedOut);
    assert_eq!(store.load().unwrap(), None);
  }

  #[tokio::test]
  async fn test_active_refreshes_expired_token() {
    let backend = Arc::new(MemoryBackend::new().with_account("me@notes.dev", "hunter22"));
    let store = Arc::new(SessionStore::open_in_memory().unwrap());
    let ctx = SessionContext::new(Some(store.clone()));
    let mut expired = backend.session_for("me@notes.dev");
    expired.expires_at = Some(chrono::Utc::now() - chrono::Duration::minutes(1));
    expired.access_token = "old".into();
    ctx.sign_in(expired);

    let session = ctx.active(&service(&backend)).await.unwrap();
    assert_ne!(session.access_token, "old");
    assert_eq!(ctx.session(), Some(session.clone()));
    assert_eq!(store.load().unwrap(), Some(session));
  }

  #[tokio::test]
  async fn test_active_ends_unrefreshable_session() {
    let backend = Arc::new(MemoryBackend::new());
    let ctx = SessionContext::new(None);
    let mut expired = Arc::new(MemoryBackend::new().with_account("x@y.io", "secret1"))
      .session_for("x@y.io");
    expired.expires_at = Some(chrono::Utc::now() - chrono::Duration::minutes(1));
    ctx.sign_in(expired);

    let err = ctx.active(&service(&backend)).await.unwrap_err();
    assert!(err.is_session_expired());
    assert_eq!(ctx.current(), AuthState::SignedOut);
  }

  #[tokio::test]
  async fn test_rejected_token_ends_session() {
    let backend = Arc::new(MemoryBackend::new().with_account("me@notes.dev", "hunter22"));
    let ctx = SessionContext::new(None);
    ctx.sign_in(backend.session_for("me@notes.dev"));

    ctx.end_if_expired(&Error::Transport("offline".into()));
    assert!(ctx.session().is_some());

    ctx.end_if_expired(&AuthError::SessionExpired.into());
    assert_eq!(ctx.current(), AuthState::SignedOut);
  }
}
