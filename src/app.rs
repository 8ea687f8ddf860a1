use crate::backend::types::Session;
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::notes::NoteCoordinator;
use crate::query::Mutation;
use crate::session::{AuthState, SessionContext};
use crate::ui::view::{View, ViewAction, ViewContext};
use crate::ui::views::{AuthView, NoteFormView, NotesView};
use crate::ui::{self, CommandEvent, CommandInput, KeyResult, Notifier, ToastLine};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What the bottom of the view stack shows
#[derive(Debug, Clone, PartialEq, Eq)]
enum Root {
  /// Stored session still being checked
  Splash,
  Auth,
  /// Notes of this user id
  Notes(String),
}

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,
  root: Root,

  /// Command input with autocomplete (after pressing :)
  command_input: CommandInput,

  toasts: ToastLine,
  ctx: ViewContext,

  /// Latest auth state seen by the event loop
  auth: AuthState,

  title: String,
  backend_url: String,

  /// Sign-out request; resolves to the session it ended
  logout: Mutation<Session>,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(
    config: &Config,
    backend_url: String,
    notes: NoteCoordinator,
    session: SessionContext,
  ) -> Self {
    let (notifier, toasts) = Notifier::channel();
    let auth = session.current();
    let ctx = ViewContext {
      notes,
      session,
      notifier,
      auth: config.auth.clone(),
    };

    let mut app = Self {
      view_stack: Vec::new(),
      root: Root::Splash,
      command_input: CommandInput::new(),
      toasts: ToastLine::new(toasts),
      ctx,
      auth: AuthState::Loading,
      title: config.title().to_string(),
      backend_url,
      logout: Mutation::new(),
      should_quit: false,
    };
    app.handle_auth(auth);
    app
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Create event handler
    let mut events = EventHandler::new(Duration::from_millis(250));
    self.forward_auth_changes(&events);
    self.restore_session();

    let result = self.event_loop(&mut terminal, &mut events).await;

    // Cleanup terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(
    &mut self,
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    events: &mut EventHandler,
  ) -> Result<()> {
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }
    Ok(())
  }

  /// Turn auth state changes into events so the loop swaps root views.
  fn forward_auth_changes(&self, events: &EventHandler) {
    let mut rx = self.ctx.session.subscribe();
    let tx = events.sender();
    tokio::spawn(async move {
      while rx.changed().await.is_ok() {
        let state = rx.borrow_and_update().clone();
        if tx.send(Event::Auth(state)).is_err() {
          break;
        }
      }
    });
  }

  fn restore_session(&self) {
    let session = self.ctx.session.clone();
    let service = self.ctx.notes.service().clone();
    tokio::spawn(async move { session.restore(&service).await });
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => self.tick(),
      Event::Auth(state) => self.handle_auth(state),
    }
  }

  /// Point the root view at the new auth state. Signed-in users land on
  /// their notes, everyone else on the sign-in form.
  fn handle_auth(&mut self, state: AuthState) {
    let root = match &state {
      AuthState::Loading => Root::Splash,
      AuthState::SignedOut => Root::Auth,
      AuthState::SignedIn(session) => Root::Notes(session.user_id().to_string()),
    };
    if let (Some(previous), None) = (self.auth.session(), state.session()) {
      self.ctx.notes.forget(previous);
    }
    self.auth = state;

    if root == self.root && !self.view_stack.is_empty() {
      return;
    }
    debug!(?root, "switching root view");

    self.view_stack.clear();
    match (&root, &self.auth) {
      (Root::Notes(user_id), AuthState::SignedIn(_)) => self
        .view_stack
        .push(Box::new(NotesView::new(self.ctx.clone(), user_id))),
      (Root::Auth, _) => self.view_stack.push(Box::new(AuthView::new(self.ctx.clone()))),
      _ => {}
    }
    self.root = root;
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    if self.command_input.is_active() {
      if let KeyResult::Event(CommandEvent::Submitted(cmd)) = self.command_input.handle_key(key) {
        self.execute_command(&cmd);
      }
      return;
    }

    let capturing = self
      .current_view()
      .is_some_and(|view| view.captures_input());
    if !capturing && self.command_input.handle_key(key) != KeyResult::NotHandled {
      return;
    }

    let action = match self.view_stack.last_mut() {
      Some(view) => view.handle_key(key),
      None if key.code == KeyCode::Char('q') => ViewAction::Pop,
      None => ViewAction::None,
    };
    self.apply(action);
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.view_stack.push(view),
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
    }
  }

  fn execute_command(&mut self, cmd: &str) {
    let session = self.auth.session().cloned();
    match (cmd, session) {
      ("quit", _) => self.should_quit = true,
      ("notes", Some(_)) => self.view_stack.truncate(1),
      ("new", Some(_)) => {
        self.view_stack.truncate(1);
        self
          .view_stack
          .push(Box::new(NoteFormView::new(self.ctx.clone())));
      }
      ("logout", Some(session)) => {
        let service = self.ctx.notes.service().clone();
        self.logout.start(async move {
          let result = service.sign_out(&session).await;
          match result {
            Ok(()) => Ok(session),
            // Token already rejected, nothing left to end server side
            Err(e) if e.is_session_expired() => Ok(session),
            Err(e) => Err(e),
          }
        });
      }
      ("notes" | "new" | "logout", None) => self.ctx.notifier.info("Sign in first"),
      (other, _) => {
        warn!(command = other, "unknown command");
        self
          .ctx
          .notifier
          .error(format!("Unknown command: {}", other));
      }
    }
  }

  fn tick(&mut self) {
    match self.logout.poll() {
      Some(Ok(session)) => {
        info!(user = %session.user_id(), "signed out");
        self.ctx.session.sign_out();
        self.ctx.notifier.info("Signed out");
      }
      Some(Err(e)) => {
        warn!(error = %e, "sign out failed");
        self.ctx.notifier.error(format!("Failed to sign out: {}", e));
      }
      None => {}
    }

    // Views below the top keep draining their results
    let top = self.view_stack.len().saturating_sub(1);
    let mut action = ViewAction::None;
    for (i, view) in self.view_stack.iter_mut().enumerate() {
      let a = view.tick();
      if i == top {
        action = a;
      }
    }
    self.apply(action);

    self.toasts.tick();
  }

  // Accessors for UI rendering
  pub fn current_view(&self) -> Option<&dyn View> {
    self.view_stack.last().map(|v| v.as_ref())
  }

  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.view_stack.last_mut()
  }

  pub fn command_input(&self) -> &CommandInput {
    &self.command_input
  }

  pub fn toasts(&self) -> &ToastLine {
    &self.toasts
  }

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn backend_url(&self) -> &str {
    &self.backend_url
  }

  pub fn email(&self) -> Option<String> {
    self.auth.session().and_then(|s| s.user.email.clone())
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect()
  }
}
