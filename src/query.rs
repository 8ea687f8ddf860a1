//! Async query and mutation handles for views.
//!
//! Inspired by TanStack Query: a `Query<T>` owns a fetcher closure and the
//! state of the last fetch; a `Mutation<T>` tracks one write at a time. Both
//! run their futures on spawned tasks and hand results back over a channel
//! that the view drains with `poll()` on each tick.
//!
//! ```ignore
//! let mut query = Query::new(move || {
//!     let notes = notes.clone();
//!     let session = session.clone();
//!     async move { notes.notes(&session).await.map(|r| r.data) }
//! });
//! query.fetch();
//!
//! // In event loop tick
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//! ```
//!
//! State machine:
//!
//! ```text
//! Idle --fetch--> Loading --ok--> Ready --fetch/invalidate--> Refreshing
//!                    |                ^                          |    |
//!                    |                +-----------ok-------------+    |
//!                    +--err--> Error <-----------err-----------------+
//!                               |
//!                               +--retry--> Loading
//! ```

use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// The state of a query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// First fetch in flight, no data yet
  Loading,
  /// Data present, nothing in flight
  Ready(T),
  /// Data present, refetch in flight
  Refreshing(T),
  /// Last fetch failed; only `retry` leaves this state
  Error(Error),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_refreshing(&self) -> bool {
    matches!(self, QueryState::Refreshing(_))
  }

  pub fn is_in_flight(&self) -> bool {
    matches!(self, QueryState::Loading | QueryState::Refreshing(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Ready(data) | QueryState::Refreshing(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&Error> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }

  /// Short label for status lines
  pub fn label(&self) -> &'static str {
    match self {
      QueryState::Idle => "idle",
      QueryState::Loading => "loading",
      QueryState::Ready(_) => "ready",
      QueryState::Refreshing(_) => "refreshing",
      QueryState::Error(_) => "error",
    }
  }
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// A factory function that creates futures for fetching data
type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

/// Async query with the loading/ready/refreshing/error state machine.
pub struct Query<T> {
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<T>>>,
}

impl<T: Send + 'static> Query<T> {
  /// Create a new query. The fetcher is called on every fetch, refetch
  /// and retry.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    Self {
      state: QueryState::Idle,
      fetcher: Box::new(move || Box::pin(fetcher())),
      receiver: None,
    }
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  pub fn error(&self) -> Option<&Error> {
    self.state.error()
  }

  /// Start fetching.
  ///
  /// No-op while a fetch is in flight (callers join it) and in the error
  /// state, which only `retry` leaves.
  pub fn fetch(&mut self) {
    match self.state {
      QueryState::Idle | QueryState::Ready(_) => self.start_fetch(),
      QueryState::Loading | QueryState::Refreshing(_) | QueryState::Error(_) => {}
    }
  }

  /// Explicit recovery from the error state.
  pub fn retry(&mut self) {
    if self.state.is_error() {
      self.state = QueryState::Idle;
      self.start_fetch();
    }
  }

  /// The data behind this query changed.
  ///
  /// Ready data starts refreshing. A fetch already in flight is restarted
  /// because its result may predate the change. Idle and error states are
  /// left alone.
  pub fn invalidate(&mut self) {
    match self.state {
      QueryState::Ready(_) | QueryState::Loading | QueryState::Refreshing(_) => {
        // Dropping the receiver abandons the old result
        self.receiver = None;
        self.start_fetch();
      }
      QueryState::Idle | QueryState::Error(_) => {}
    }
  }

  /// Poll for results from a pending fetch.
  ///
  /// Returns `true` if the state changed (data arrived or error occurred).
  /// Call this in your event loop tick handler.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    // Try to receive without blocking
    let result = match receiver.try_recv() {
      Ok(result) => result,
      Err(mpsc::error::TryRecvError::Empty) => return false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        // Sender dropped without sending
        Err(Error::Transport("Query was cancelled".to_string()))
      }
    };

    self.receiver = None;
    self.state = match result {
      Ok(data) => QueryState::Ready(data),
      Err(e) => QueryState::Error(e),
    };
    true
  }

  /// Move into the matching in-flight state and spawn the fetcher.
  fn start_fetch(&mut self) {
    self.state = match std::mem::replace(&mut self.state, QueryState::Idle) {
      QueryState::Ready(data) | QueryState::Refreshing(data) => QueryState::Refreshing(data),
      _ => QueryState::Loading,
    };

    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);

    let future = (self.fetcher)();
    tokio::spawn(async move {
      let result = future.await;
      // Ignore send errors - receiver may have been dropped
      let _ = tx.send(result);
    });
  }
}

// Query is not Clone because the fetcher is boxed and receiver is owned.

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}

/// One write at a time, with its outcome delivered through `poll`.
pub struct Mutation<T> {
  receiver: Option<mpsc::UnboundedReceiver<Result<T>>>,
}

impl<T> Default for Mutation<T> {
  fn default() -> Self {
    Self { receiver: None }
  }
}

impl<T: Send + 'static> Mutation<T> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_pending(&self) -> bool {
    self.receiver.is_some()
  }

  /// Run `future` unless a previous write is still pending. Returns whether
  /// it was started.
  pub fn start<Fut>(&mut self, future: Fut) -> bool
  where
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    if self.is_pending() {
      return false;
    }
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    tokio::spawn(async move {
      let _ = tx.send(future.await);
    });
    true
  }

  /// Outcome of the pending write, once it has finished.
  pub fn poll(&mut self) -> Option<Result<T>> {
    let receiver = self.receiver.as_mut()?;
    let result = match receiver.try_recv() {
      Ok(result) => result,
      Err(mpsc::error::TryRecvError::Empty) => return None,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        Err(Error::Transport("Request was cancelled".to_string()))
      }
    };
    self.receiver = None;
    Some(result)
  }
}
