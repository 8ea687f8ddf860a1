use crate::backend::types::{Note, NoteId};
use crate::cache::{CacheEvent, CacheResult};
use crate::notes::NoteCoordinator;
use crate::query::{Mutation, Query, QueryState};
use crate::ui::components::{FormEvent, KeyResult, NoteForm, SearchInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{first_line, format_timestamp, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction, ViewContext};
use crate::ui::views::{failure_message, NoteFormView};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, warn};

/// Write in flight from this view
#[derive(Debug, Clone, PartialEq, Eq)]
enum Pending {
  Update,
  Delete,
  Explain(NoteId),
}

/// The signed-in user's notes: list on the left, selected note on the right.
pub struct NotesView {
  ctx: ViewContext,
  user_id: String,
  query: Query<CacheResult<Vec<Note>>>,
  events: broadcast::Receiver<CacheEvent>,
  list_state: ListState,
  search: SearchInput,
  editing: Option<(NoteId, NoteForm)>,
  confirm_delete: Option<(NoteId, String)>,
  writes: Mutation<()>,
  pending: Option<Pending>,
}

impl NotesView {
  pub fn new(ctx: ViewContext, user_id: &str) -> Self {
    let fetch_ctx = ctx.clone();
    let mut query = Query::new(move || {
      let ctx = fetch_ctx.clone();
      async move {
        let session = ctx.active_session().await?;
        ctx.notes.notes(&session).await
      }
    });
    query.fetch();

    Self {
      events: ctx.notes.subscribe(),
      ctx,
      user_id: user_id.to_string(),
      query,
      list_state: ListState::default(),
      search: SearchInput::new(),
      editing: None,
      confirm_delete: None,
      writes: Mutation::new(),
      pending: None,
    }
  }

  /// Notes passing the search filter, newest first
  fn visible(&self) -> Vec<&Note> {
    self
      .query
      .data()
      .map(|result| {
        result
          .data
          .iter()
          .filter(|n| self.search.matches(&[n.title.as_str(), n.content.as_str()]))
          .collect()
      })
      .unwrap_or_default()
  }

  fn selected_note(&self) -> Option<&Note> {
    let idx = self.list_state.selected()?;
    self.visible().get(idx).copied()
  }

  fn drain_cache_events(&mut self) {
    let key = NoteCoordinator::list_key(&self.user_id);
    loop {
      match self.events.try_recv() {
        Ok(event) if event.key() == key => match event {
          CacheEvent::Invalidated(_) => self.query.invalidate(),
          CacheEvent::Refreshed(_) => {
            if !self.query.state().is_in_flight() {
              self.query.fetch();
            }
          }
        },
        Ok(_) => {}
        // Missed events: assume the list changed
        Err(TryRecvError::Lagged(_)) => self.query.invalidate(),
        Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
      }
    }
  }

  fn poll_writes(&mut self) {
    let Some(result) = self.writes.poll() else {
      return;
    };
    let Some(pending) = self.pending.take() else {
      return;
    };
    let notifier = &self.ctx.notifier;
    if let Err(e) = &result {
      self.ctx.session.end_if_expired(e);
    }
    match (pending, result) {
      (Pending::Update, Ok(())) => {
        self.editing = None;
        notifier.success("Note updated!");
      }
      (Pending::Delete, Ok(())) => notifier.success("Note deleted!"),
      (Pending::Explain(_), Ok(())) => notifier.success("Explanation generated!"),
      (pending, Err(e)) => {
        warn!(error = %e, ?pending, "note write failed");
        let fallback = match pending {
          Pending::Update => "Failed to update note.",
          Pending::Delete => "Failed to delete note.",
          Pending::Explain(_) => "Failed to generate explanation.",
        };
        notifier.error(failure_message(&e, fallback));
      }
    }
  }

  fn start_write<F>(&mut self, pending: Pending, future: F)
  where
    F: std::future::Future<Output = crate::error::Result<()>> + Send + 'static,
  {
    if self.writes.start(future) {
      self.pending = Some(pending);
    }
  }

  fn submit_edit(&mut self) {
    let Some((id, form)) = &self.editing else {
      return;
    };
    let ctx = self.ctx.clone();
    let id = id.clone();
    let update = form.update();
    self.start_write(Pending::Update, async move {
      let session = ctx.active_session().await?;
      ctx.notes.update_note(&session, &id, &update).await
    });
  }

  fn delete(&mut self, id: NoteId) {
    let ctx = self.ctx.clone();
    self.start_write(Pending::Delete, async move {
      let session = ctx.active_session().await?;
      ctx.notes.delete_note(&session, &id).await
    });
  }

  fn explain_selected(&mut self) {
    let Some(note) = self.selected_note().cloned() else {
      return;
    };
    if !note.can_explain() {
      return;
    }
    let ctx = self.ctx.clone();
    self.start_write(Pending::Explain(note.id.clone()), async move {
      let session = ctx.active_session().await?;
      ctx.notes.explain_note(&session, &note).await.map(|_| ())
    });
  }

  fn refresh(&mut self) {
    if self.query.is_error() {
      self.query.retry();
      return;
    }
    let ctx = self.ctx.clone();
    tokio::spawn(async move {
      match ctx.active_session().await {
        Ok(session) => ctx.notes.refresh(&session),
        Err(e) => debug!(error = %e, "refresh skipped"),
      }
    });
  }

  fn handle_edit_key(&mut self, key: KeyEvent) -> ViewAction {
    let Some((_, form)) = self.editing.as_mut() else {
      return ViewAction::None;
    };
    match form.handle_key(key) {
      KeyResult::Event(FormEvent::Submit) => self.submit_edit(),
      KeyResult::Event(FormEvent::Cancel) => self.editing = None,
      KeyResult::Event(FormEvent::Generate) | KeyResult::Handled | KeyResult::NotHandled => {}
    }
    ViewAction::None
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let count = self.visible().len();
    ensure_valid_selection(&mut self.list_state, count);

    let filter = if self.search.query().is_empty() {
      String::new()
    } else {
      format!(" /{}", self.search.query())
    };
    let title = match self.query.state() {
      QueryState::Idle | QueryState::Loading => " Notes (loading...) ".to_string(),
      QueryState::Refreshing(_) => format!(" Notes ({}){} (refreshing...) ", count, filter),
      QueryState::Error(_) => " Notes (error) ".to_string(),
      QueryState::Ready(result) if result.is_stale() => {
        let note = if self.ctx.notes.last_error(&self.user_id).is_some() {
          "refresh failed"
        } else {
          "refreshing..."
        };
        format!(" Notes ({}){} ({}) ", count, filter, note)
      }
      QueryState::Ready(_) => format!(" Notes ({}){} ", count, filter),
    };

    let mut block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    if let Some(result) = self.query.data() {
      block = block.title_bottom(
        Line::from(format!(" updated {} ", format_timestamp(&result.fetched_at)))
          .alignment(Alignment::Right),
      );
    }

    if count == 0 {
      let content = match self.query.state() {
        QueryState::Idle | QueryState::Loading => "Loading notes...".to_string(),
        QueryState::Error(e) => format!("Failed to load notes: {}\nPress 'r' to retry.", e),
        _ if !self.search.query().is_empty() => "No notes match the filter.".to_string(),
        _ => "No notes yet. Press 'n' to create one.".to_string(),
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .wrap(Wrap { trim: false })
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let width = area.width.saturating_sub(22) as usize;
    let items: Vec<ListItem> = self
      .visible()
      .iter()
      .map(|note| {
        let marker = if note.can_explain() { " " } else { "✦" };
        ListItem::new(Line::from(vec![
          Span::styled(
            format_timestamp(&note.created_at),
            Style::default().fg(Color::DarkGray),
          ),
          Span::styled(format!(" {} ", marker), Style::default().fg(Color::Magenta)),
          Span::raw(truncate(&first_line(&note.title), width)),
        ]))
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }

  fn render_detail(&self, frame: &mut Frame, area: Rect) {
    if let Some((_, form)) = &self.editing {
      let status = (self.pending == Some(Pending::Update)).then_some("Saving...");
      form.render(frame, area, "Edit note", status);
      return;
    }

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::DarkGray));

    let Some(note) = self.selected_note() else {
      frame.render_widget(block, area);
      return;
    };

    let heading = Style::default().fg(Color::Cyan).bold();
    let mut lines = vec![
      Line::styled(note.title.clone(), Style::default().fg(Color::White).bold()),
      Line::styled(
        format_timestamp(&note.created_at),
        Style::default().fg(Color::DarkGray),
      ),
      Line::raw(""),
    ];
    lines.extend(note.content.lines().map(|l| Line::raw(l.to_string())));
    lines.push(Line::raw(""));
    lines.push(Line::styled("Explanation", heading));

    let explaining = self.pending == Some(Pending::Explain(note.id.clone()));
    match note.explanation.as_deref().filter(|e| !e.trim().is_empty()) {
      Some(text) => lines.extend(text.lines().map(|l| Line::raw(l.to_string()))),
      None if explaining => lines.push(Line::styled(
        "Generating explanation...",
        Style::default().fg(Color::Yellow),
      )),
      None => {
        lines.push(Line::styled(
          "No explanation yet",
          Style::default().fg(Color::DarkGray),
        ));
        lines.push(Line::from(vec![
          Span::styled("x", Style::default().fg(Color::Cyan)),
          Span::styled(": Generate Explanation", Style::default().fg(Color::DarkGray)),
        ]));
      }
    }

    if let Some((_, title)) = &self.confirm_delete {
      lines.push(Line::raw(""));
      lines.push(Line::styled(
        format!("Delete \"{}\"? (y/n)", truncate(title, 40)),
        Style::default().fg(Color::Red).bold(),
      ));
    }

    frame.render_widget(
      Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
      area,
    );
  }
}

impl View for NotesView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.editing.is_some() {
      return self.handle_edit_key(key);
    }

    if let Some((id, _)) = self.confirm_delete.take() {
      if key.code == KeyCode::Char('y') {
        self.delete(id);
      }
      return ViewAction::None;
    }

    // Let search component try to handle first
    match self.search.handle_key(key) {
      KeyResult::Handled | KeyResult::Event(_) => {
        self.list_state.select(Some(0));
        return ViewAction::None;
      }
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('n') => {
        return ViewAction::Push(Box::new(NoteFormView::new(self.ctx.clone())));
      }
      KeyCode::Char('e') | KeyCode::Enter => {
        if let Some(note) = self.selected_note() {
          self.editing = Some((note.id.clone(), NoteForm::edit(note)));
        }
      }
      KeyCode::Char('d') => {
        if let Some(note) = self.selected_note() {
          self.confirm_delete = Some((note.id.clone(), note.title.clone()));
        }
      }
      KeyCode::Char('x') => self.explain_selected(),
      KeyCode::Char('r') => self.refresh(),
      KeyCode::Esc => self.search.clear(),
      KeyCode::Char('q') => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
      .split(area);

    self.render_list(frame, chunks[0]);
    self.render_detail(frame, chunks[1]);
    self.search.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Notes".to_string()
  }

  fn tick(&mut self) -> ViewAction {
    self.query.poll();
    self.drain_cache_events();
    self.poll_writes();
    // Token rejected while fetching, possibly in the background
    if let Some(e) = self.ctx.notes.last_error(&self.user_id) {
      self.ctx.session.end_if_expired(&e);
    }
    let len = self.visible().len();
    ensure_valid_selection(&mut self.list_state, len);
    ViewAction::None
  }

  fn captures_input(&self) -> bool {
    self.editing.is_some() || self.search.is_active() || self.confirm_delete.is_some()
  }

  fn status(&self) -> Option<String> {
    let write = match &self.pending {
      Some(Pending::Update) => Some("saving"),
      Some(Pending::Delete) => Some("deleting"),
      Some(Pending::Explain(_)) => Some("generating explanation"),
      None => None,
    };
    let state = self.query.state();
    let revalidating = state.data().is_some_and(CacheResult::is_stale)
      && self.ctx.notes.is_fetching(&self.user_id);
    write
      .or_else(|| (state.is_in_flight() || state.is_error()).then(|| state.label()))
      .or_else(|| revalidating.then_some("refreshing"))
      .map(String::from)
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    let mut shortcuts = vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("n", "new").with_priority(20),
      ShortcutInfo::new("e", "edit").with_priority(30),
      ShortcutInfo::new("d", "delete").with_priority(40),
      ShortcutInfo::new("/", "search").with_priority(60),
      ShortcutInfo::new("r", "refresh").with_priority(70),
    ];
    if self.selected_note().is_some_and(Note::can_explain) {
      shortcuts.push(ShortcutInfo::new("x", "explain").with_priority(50));
    }
    shortcuts
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::memory::MemoryBackend;
  use crate::backend::types::NoteDraft;
  use crate::error::{AuthError, Error};
  use crate::generator::testing::EchoGenerator;
  use crate::session::AuthState;
  use crate::ui::testing::{context, context_with, ctrl, drain, press, settle, type_text};
  use std::sync::Arc;

  fn backend() -> Arc<MemoryBackend> {
    Arc::new(MemoryBackend::new().with_account("me@notes.dev", "hunter22"))
  }

  async fn settle_all(view: &mut NotesView) {
    for _ in 0..4 {
      settle(view).await;
    }
  }

  fn titles(view: &NotesView) -> Vec<String> {
    view.visible().iter().map(|n| n.title.clone()).collect()
  }

  #[tokio::test]
  async fn test_created_note_listed_once() {
    let backend = backend();
    let session = backend.session_for("me@notes.dev");
    let (ctx, _toasts) = context(backend, &[]);
    ctx.session.sign_in(session.clone());
    let mut view = NotesView::new(ctx.clone(), session.user_id());
    settle(&mut view).await;
    assert!(view.visible().is_empty());

    ctx
      .notes
      .create_note(&session, &NoteDraft::new("T", "C"))
      .await
      .unwrap();
    settle_all(&mut view).await;

    let visible = view.visible();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].title, "T");
    assert_eq!(visible[0].explanation, None);
    assert!(visible[0].can_explain());
  }

  #[tokio::test]
  async fn test_explain_stores_text_and_hides_action() {
    let backend = backend();
    let session = backend.session_for("me@notes.dev");
    let generator = Arc::new(EchoGenerator::default());
    let (ctx, mut toasts) = context_with(backend, generator.clone(), &[]);
    ctx.session.sign_in(session.clone());
    ctx
      .notes
      .create_note(&session, &NoteDraft::new("T", "C"))
      .await
      .unwrap();

    let mut view = NotesView::new(ctx, session.user_id());
    settle(&mut view).await;
    assert!(view.shortcuts().iter().any(|s| s.key == "x"));

    press(&mut view, KeyCode::Char('x'));
    settle_all(&mut view).await;

    let note = view.selected_note().cloned().unwrap();
    assert_eq!(note.explanation.as_deref(), Some("Explanation #1 of T"));
    assert!(!view.shortcuts().iter().any(|s| s.key == "x"));
    assert!(drain(&mut toasts).contains(&"Explanation generated!".to_string()));

    press(&mut view, KeyCode::Char('x'));
    settle(&mut view).await;
    assert_eq!(generator.calls(), 1);
  }

  #[tokio::test]
  async fn test_failed_explain_leaves_note_unchanged() {
    let backend = backend();
    let session = backend.session_for("me@notes.dev");
    let (ctx, mut toasts) = context_with(backend, Arc::new(EchoGenerator::failing()), &[]);
    ctx.session.sign_in(session.clone());
    let note = ctx
      .notes
      .create_note(&session, &NoteDraft::new("T", "C"))
      .await
      .unwrap();

    let mut view = NotesView::new(ctx, session.user_id());
    settle(&mut view).await;
    press(&mut view, KeyCode::Char('x'));
    settle_all(&mut view).await;

    assert_eq!(view.selected_note().map(|n| n.id.clone()), Some(note.id));
    assert!(view.selected_note().is_some_and(Note::can_explain));
    assert_eq!(drain(&mut toasts), vec!["Failed to generate explanation."]);
  }

  #[tokio::test]
  async fn test_failed_load_recovers_on_retry() {
    let backend = backend();
    let session = backend.session_for("me@notes.dev");
    backend.fail_next(Error::Transport("offline".into()));
    let (ctx, _toasts) = context(backend, &[]);
    ctx.session.sign_in(session.clone());

    let mut view = NotesView::new(ctx, session.user_id());
    settle(&mut view).await;
    assert!(view.query.is_error());
    assert_eq!(view.status().as_deref(), Some("error"));

    press(&mut view, KeyCode::Char('r'));
    settle(&mut view).await;
    assert!(matches!(view.query.state(), QueryState::Ready(_)));
  }

  #[tokio::test]
  async fn test_delete_asks_first() {
    let backend = backend();
    let session = backend.session_for("me@notes.dev");
    let (ctx, mut toasts) = context(backend.clone(), &[]);
    ctx.session.sign_in(session.clone());
    let note = ctx
      .notes
      .create_note(&session, &NoteDraft::new("T", "C"))
      .await
      .unwrap();

    let mut view = NotesView::new(ctx, session.user_id());
    settle(&mut view).await;

    press(&mut view, KeyCode::Char('d'));
    assert!(view.captures_input());
    press(&mut view, KeyCode::Char('n'));
    settle(&mut view).await;
    assert!(backend.stored(&note.id).is_some());

    press(&mut view, KeyCode::Char('d'));
    press(&mut view, KeyCode::Char('y'));
    settle_all(&mut view).await;
    assert!(backend.stored(&note.id).is_none());
    assert!(view.visible().is_empty());
    assert_eq!(drain(&mut toasts), vec!["Note deleted!"]);
  }

  #[tokio::test]
  async fn test_edit_keeps_explanation() {
    let backend = backend();
    let session = backend.session_for("me@notes.dev");
    let (ctx, mut toasts) = context(backend.clone(), &[]);
    ctx.session.sign_in(session.clone());
    let note = ctx
      .notes
      .create_note(&session, &NoteDraft::new("T", "C").with_explanation("kept"))
      .await
      .unwrap();

    let mut view = NotesView::new(ctx, session.user_id());
    settle(&mut view).await;

    press(&mut view, KeyCode::Char('e'));
    assert!(view.captures_input());
    type_text(&mut view, "!");
    ctrl(&mut view, 's');
    settle_all(&mut view).await;

    let stored = backend.stored(&note.id).unwrap();
    assert_eq!(stored.title, "T!");
    assert_eq!(stored.explanation.as_deref(), Some("kept"));
    assert!(view.editing.is_none());
    assert_eq!(titles(&view), vec!["T!"]);
    assert_eq!(drain(&mut toasts), vec!["Note updated!"]);
  }

  #[tokio::test]
  async fn test_invalid_edit_stays_open() {
    let backend = backend();
    let session = backend.session_for("me@notes.dev");
    let (ctx, mut toasts) = context(backend.clone(), &[]);
    ctx.session.sign_in(session.clone());
    ctx
      .notes
      .create_note(&session, &NoteDraft::new("T", "C"))
      .await
      .unwrap();

    let mut view = NotesView::new(ctx, session.user_id());
    settle(&mut view).await;

    press(&mut view, KeyCode::Char('e'));
    press(&mut view, KeyCode::Backspace);
    ctrl(&mut view, 's');
    settle(&mut view).await;

    assert!(view.editing.is_some());
    assert_eq!(drain(&mut toasts), vec!["Title is required"]);
    assert_eq!(backend.write_calls(), 1);
  }

  #[tokio::test]
  async fn test_search_filters_and_esc_clears() {
    let backend = backend();
    let session = backend.session_for("me@notes.dev");
    let (ctx, _toasts) = context(backend, &[]);
    ctx.session.sign_in(session.clone());
    for title in ["Rust traits", "Go channels"] {
      ctx
        .notes
        .create_note(&session, &NoteDraft::new(title, "body"))
        .await
        .unwrap();
    }

    let mut view = NotesView::new(ctx, session.user_id());
    settle(&mut view).await;
    assert_eq!(titles(&view), vec!["Go channels", "Rust traits"]);

    press(&mut view, KeyCode::Char('/'));
    type_text(&mut view, "RUST");
    press(&mut view, KeyCode::Enter);
    assert_eq!(titles(&view), vec!["Rust traits"]);
    assert!(!view.captures_input());

    press(&mut view, KeyCode::Esc);
    assert_eq!(titles(&view).len(), 2);
  }

  #[tokio::test]
  async fn test_rejected_token_ends_session() {
    let backend = backend();
    let session = backend.session_for("me@notes.dev");
    backend.fail_next(AuthError::SessionExpired.into());
    let (ctx, _toasts) = context(backend, &[]);
    ctx.session.sign_in(session.clone());

    let mut view = NotesView::new(ctx.clone(), session.user_id());
    settle(&mut view).await;
    settle(&mut view).await;

    assert!(view.query.is_error());
    assert_eq!(ctx.session.current(), AuthState::SignedOut);
  }

  #[tokio::test]
  async fn test_expired_token_refreshed_before_loading() {
    let backend = backend();
    let (ctx, _toasts) = context(backend.clone(), &[]);
    ctx
      .notes
      .create_note(&backend.session_for("me@notes.dev"), &NoteDraft::new("T", "C"))
      .await
      .unwrap();
    let mut expired = backend.session_for("me@notes.dev");
    expired.expires_at = Some(chrono::Utc::now() - chrono::Duration::minutes(1));
    expired.access_token = "old".into();
    ctx.session.sign_in(expired.clone());

    let mut view = NotesView::new(ctx.clone(), expired.user_id());
    settle_all(&mut view).await;

    assert_eq!(titles(&view), vec!["T"]);
    let current = ctx.session.session().unwrap();
    assert_ne!(current.access_token, "old");
    assert!(!current.is_expired());
  }

  #[tokio::test]
  async fn test_stale_list_shown_until_refetch_lands() {
    let backend = Arc::new(
      MemoryBackend::new()
        .with_account("me@notes.dev", "hunter22")
        .with_list_delay(std::time::Duration::from_millis(150)),
    );
    let session = backend.session_for("me@notes.dev");
    let (ctx, _toasts) = context(backend, &[]);
    ctx.session.sign_in(session.clone());
    let mut view = NotesView::new(ctx.clone(), session.user_id());
    for _ in 0..8 {
      settle(&mut view).await;
    }
    assert!(matches!(view.query.state(), QueryState::Ready(_)));

    ctx
      .notes
      .create_note(&session, &NoteDraft::new("T", "C"))
      .await
      .unwrap();
    settle(&mut view).await;
    settle(&mut view).await;

    // Old list while the refetch is still running
    assert!(view.query.data().is_some_and(CacheResult::is_stale));
    assert!(view.visible().is_empty());
    assert_eq!(view.status().as_deref(), Some("refreshing"));

    for _ in 0..8 {
      settle(&mut view).await;
    }
    assert_eq!(titles(&view), vec!["T"]);
    assert!(!view.query.data().is_some_and(CacheResult::is_stale));
  }
}
