//! In-memory backend used by tests across the crate.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::types::{Credentials, Note, NoteDraft, NoteId, NoteUpdate, Session, SignUpOutcome, User};
use super::Backend;
use crate::error::{AuthError, Error, Result};

#[derive(Default)]
struct State {
  /// email -> (password, user id)
  accounts: HashMap<String, (String, String)>,
  notes: Vec<Note>,
  next_id: u64,
  fail_next: Option<Error>,
}

/// Backend fake with call counters and injectable failures
#[derive(Default)]
pub struct MemoryBackend {
  state: Mutex<State>,
  list_delay: Mutex<Option<std::time::Duration>>,
  pub list_calls: AtomicUsize,
  pub write_calls: AtomicUsize,
}

impl MemoryBackend {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_account(self, email: &str, password: &str) -> Self {
    {
      let mut state = self.state.lock().unwrap();
      let id = format!("user-{}", state.accounts.len() + 1);
      state
        .accounts
        .insert(email.to_string(), (password.to_string(), id));
    }
    self
  }

  /// Slow down list calls so concurrent fetches overlap
  pub fn with_list_delay(self, delay: std::time::Duration) -> Self {
    *self.list_delay.lock().unwrap() = Some(delay);
    self
  }

  pub fn fail_next(&self, error: Error) {
    self.state.lock().unwrap().fail_next = Some(error);
  }

  pub fn session_for(&self, email: &str) -> Session {
    let state = self.state.lock().unwrap();
    let (_, id) = state.accounts.get(email).expect("unknown account");
    session(id, email)
  }

  pub fn stored(&self, id: &NoteId) -> Option<Note> {
    let state = self.state.lock().unwrap();
    state.notes.iter().find(|n| &n.id == id).cloned()
  }

  pub fn list_calls(&self) -> usize {
    self.list_calls.load(Ordering::SeqCst)
  }

  pub fn write_calls(&self) -> usize {
    self.write_calls.load(Ordering::SeqCst)
  }

  fn take_failure(&self) -> Result<()> {
    match self.state.lock().unwrap().fail_next.take() {
      Some(e) => Err(e),
      None => Ok(()),
    }
  }

  fn with_owned_note<R>(
    &self,
    session: &Session,
    id: &NoteId,
    f: impl FnOnce(&mut Note) -> R,
  ) -> Result<R> {
    let mut state = self.state.lock().unwrap();
    state
      .notes
      .iter_mut()
      .find(|n| &n.id == id && n.user_id == session.user.id)
      .map(f)
      .ok_or_else(|| Error::NotFound(format!("note {}", id)))
  }
}

fn session(user_id: &str, email: &str) -> Session {
  Session {
    access_token: format!("token-{}", user_id),
    refresh_token: format!("refresh-{}", user_id),
    expires_at: Some(Utc::now() + Duration::hours(1)),
    user: User {
      id: user_id.to_string(),
      email: Some(email.to_string()),
    },
  }
}

#[async_trait]
impl Backend for MemoryBackend {
  async fn sign_up(&self, credentials: &Credentials) -> Result<SignUpOutcome> {
    self.take_failure()?;
    let mut state = self.state.lock().unwrap();
    if state.accounts.contains_key(&credentials.email) {
      return Err(AuthError::AlreadyRegistered.into());
    }
    let id = format!("user-{}", state.accounts.len() + 1);
    state.accounts.insert(
      credentials.email.clone(),
      (credentials.password.clone(), id.clone()),
    );
    Ok(SignUpOutcome::SignedIn(session(&id, &credentials.email)))
  }

  async fn sign_in(&self, credentials: &Credentials) -> Result<Session> {
    self.take_failure()?;
    let state = self.state.lock().unwrap();
    match state.accounts.get(&credentials.email) {
      Some((password, id)) if *password == credentials.password => {
        Ok(session(id, &credentials.email))
      }
      _ => Err(AuthError::InvalidCredentials.into()),
    }
  }

  async fn sign_out(&self, _session: &Session) -> Result<()> {
    self.take_failure()
  }

  async fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
    self.take_failure()?;
    let state = self.state.lock().unwrap();
    state
      .accounts
      .iter()
      .find(|(_, (_, id))| refresh_token == format!("refresh-{}", id))
      .map(|(email, (_, id))| session(id, email))
      .ok_or_else(|| AuthError::SessionExpired.into())
  }

  async fn get_user(&self, access_token: &str) -> Result<User> {
    self.take_failure()?;
    let state = self.state.lock().unwrap();
    state
      .accounts
      .iter()
      .find(|(_, (_, id))| access_token == format!("token-{}", id))
      .map(|(email, (_, id))| User {
        id: id.clone(),
        email: Some(email.clone()),
      })
      .ok_or_else(|| AuthError::SessionExpired.into())
  }

  fn authorize_url(&self, provider: &str, _redirect_to: Option<&str>) -> Result<String> {
    Ok(format!("memory://authorize?provider={}", provider))
  }

  async fn list_notes(&self, session: &Session) -> Result<Vec<Note>> {
    self.list_calls.fetch_add(1, Ordering::SeqCst);
    let delay = *self.list_delay.lock().unwrap();
    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }
    self.take_failure()?;
    let state = self.state.lock().unwrap();
    let mut notes: Vec<Note> = state
      .notes
      .iter()
      .filter(|n| n.user_id == session.user.id)
      .cloned()
      .collect();
    notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(notes)
  }

  async fn insert_note(&self, session: &Session, draft: &NoteDraft) -> Result<Note> {
    self.write_calls.fetch_add(1, Ordering::SeqCst);
    self.take_failure()?;
    let mut state = self.state.lock().unwrap();
    state.next_id += 1;
    // Distinct timestamps keep the newest-first order deterministic
    let created_at = Utc::now() + Duration::milliseconds(state.next_id as i64);
    let note = Note {
      id: NoteId(state.next_id.to_string()),
      title: draft.title.clone(),
      content: draft.content.clone(),
      explanation: draft.explanation().map(String::from),
      created_at,
      user_id: session.user.id.clone(),
    };
    state.notes.push(note.clone());
    Ok(note)
  }

  async fn update_note(&self, session: &Session, id: &NoteId, update: &NoteUpdate) -> Result<()> {
    self.write_calls.fetch_add(1, Ordering::SeqCst);
    self.take_failure()?;
    self.with_owned_note(session, id, |note| {
      note.title = update.title.clone();
      note.content = update.content.clone();
    })
  }

  async fn update_explanation(
    &self,
    session: &Session,
    id: &NoteId,
    explanation: &str,
  ) -> Result<()> {
    self.write_calls.fetch_add(1, Ordering::SeqCst);
    self.take_failure()?;
    self.with_owned_note(session, id, |note| {
      note.explanation = Some(explanation.to_string());
    })
  }

  async fn delete_note(&self, session: &Session, id: &NoteId) -> Result<()> {
    self.write_calls.fetch_add(1, Ordering::SeqCst);
    self.take_failure()?;
    let mut state = self.state.lock().unwrap();
    let before = state.notes.len();
    state
      .notes
      .retain(|n| !(&n.id == id && n.user_id == session.user.id));
    if state.notes.len() == before {
      return Err(Error::NotFound(format!("note {}", id)));
    }
    Ok(())
  }
}
