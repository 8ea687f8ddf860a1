//! Note queries and mutations over the shared cache.

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::backend::types::{Note, NoteDraft, NoteId, NoteUpdate, Session};
use crate::cache::{CacheEvent, CacheLayer, CacheResult, QueryKey};
use crate::config::Config;
use crate::error::{Error, Result};

use super::keys::NoteQueryKey;
use super::service::NoteService;

/// Wraps [`NoteService`] with the note-list cache.
///
/// Reads go through the cache: a fresh list is served as is, a stale one is
/// served immediately while a refetch runs in the background, and only a
/// missing list blocks on the network. Every successful write invalidates
/// the owner's list, publishes [`CacheEvent::Invalidated`] and starts a
/// background refetch; [`CacheEvent::Refreshed`] follows when it lands.
/// Failed writes leave the cache as it was.
#[derive(Clone)]
pub struct NoteCoordinator {
  service: NoteService,
  cache: CacheLayer<Vec<Note>>,
  events: broadcast::Sender<CacheEvent>,
}

impl NoteCoordinator {
  pub fn new(service: NoteService, config: &Config) -> Self {
    let (events, _) = broadcast::channel(64);
    Self {
      service,
      cache: CacheLayer::new().with_stale_time(config.stale_time()),
      events,
    }
  }

  pub fn service(&self) -> &NoteService {
    &self.service
  }

  /// Receiver for invalidation and refresh notifications.
  pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
    self.events.subscribe()
  }

  /// Cache key of a user's note list
  pub fn list_key(user_id: &str) -> String {
    NoteQueryKey::note_list(user_id).cache_key()
  }

  /// The session user's notes. Concurrent callers share a request; a stale
  /// list is returned without waiting for its refetch.
  pub async fn notes(&self, session: &Session) -> Result<CacheResult<Vec<Note>>> {
    let user_id = session.user_id();
    if let Some(stale) = self.snapshot(user_id).filter(CacheResult::is_stale) {
      let query = NoteQueryKey::note_list(user_id);
      debug!(query = %query.description(), fetched_at = %stale.fetched_at, "serving stale list");
      self.revalidate(session);
      return Ok(stale);
    }
    let key = Self::list_key(user_id);
    self.cache.fetch(&key, self.list_fetcher(session)).await
  }

  /// Last cached list without fetching.
  pub fn snapshot(&self, user_id: &str) -> Option<CacheResult<Vec<Note>>> {
    self.cache.peek(&Self::list_key(user_id))
  }

  /// Whether the user's list is being fetched
  pub fn is_fetching(&self, user_id: &str) -> bool {
    self.cache.is_fetching(&Self::list_key(user_id))
  }

  /// Why the last fetch of the user's list failed, until one succeeds
  pub fn last_error(&self, user_id: &str) -> Option<Error> {
    self.cache.last_error(&Self::list_key(user_id))
  }

  pub async fn create_note(&self, session: &Session, draft: &NoteDraft) -> Result<Note> {
    let note = self.service.create_note(session, draft).await?;
    self.invalidate(session);
    Ok(note)
  }

  pub async fn update_note(&self, session: &Session, id: &NoteId, update: &NoteUpdate) -> Result<()> {
    self.service.update_note(session, id, update).await?;
    self.invalidate(session);
    Ok(())
  }

  pub async fn delete_note(&self, session: &Session, id: &NoteId) -> Result<()> {
    self.service.delete_note(session, id).await?;
    self.invalidate(session);
    Ok(())
  }

  /// Generate text for a draft. Not a mutation: the cache is untouched.
  pub async fn generate_explanation(&self, title: &str, content: &str) -> Result<String> {
    self.service.generate_explanation(title, content).await
  }

  /// Generate and store an explanation for an existing note.
  pub async fn explain_note(&self, session: &Session, note: &Note) -> Result<String> {
    let explanation = self
      .service
      .generate_explanation(&note.title, &note.content)
      .await?;
    self
      .service
      .save_explanation(session, &note.id, &explanation)
      .await?;
    self.invalidate(session);
    Ok(explanation)
  }

  /// Mark the list stale and refetch it in the background.
  pub fn refresh(&self, session: &Session) {
    self.invalidate(session);
  }

  /// Drop the user's cached notes, e.g. on sign-out.
  pub fn forget(&self, session: &Session) {
    let key = Self::list_key(session.user_id());
    debug!(key = %key, "forgetting cached notes");
    self.cache.remove(&key);
  }

  fn list_fetcher(
    &self,
    session: &Session,
  ) -> impl FnOnce() -> BoxFuture<'static, Result<Vec<Note>>> {
    let service = self.service.clone();
    let session = session.clone();
    move || async move { service.list_notes(&session).await }.boxed()
  }

  fn invalidate(&self, session: &Session) {
    let query = NoteQueryKey::note_list(session.user_id());
    let key = query.cache_key();
    self.cache.invalidate(&key);
    info!(query = %query.description(), "note list invalidated");
    // No subscribers is fine
    let _ = self.events.send(CacheEvent::Invalidated(key));
    self.revalidate(session);
  }

  /// Refetch the list in the background (joining a fetch already in
  /// flight) and announce it once stored.
  fn revalidate(&self, session: &Session) {
    let key = Self::list_key(session.user_id());
    let refresh = self.cache.revalidate(&key, self.list_fetcher(session));
    let events = self.events.clone();
    tokio::spawn(async move {
      // Not stored when a later invalidation detached the fetch, or when
      // another joiner already stored it
      if let Ok(true) = refresh.await {
        let _ = events.send(CacheEvent::Refreshed(key));
      }
    });
  }
}
