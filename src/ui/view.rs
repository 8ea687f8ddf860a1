use crossterm::event::KeyEvent;
use ratatui::prelude::*;

use crate::backend::types::Session;
use crate::config::AuthConfig;
use crate::error::Result;
use crate::notes::NoteCoordinator;
use crate::session::SessionContext;
use crate::ui::components::Notifier;

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// Everything a view needs to talk to the rest of the app
#[derive(Clone)]
pub struct ViewContext {
  pub notes: NoteCoordinator,
  pub session: SessionContext,
  pub notifier: Notifier,
  pub auth: AuthConfig,
}

impl ViewContext {
  /// Session for the next request, refreshed if its token has expired
  pub async fn active_session(&self) -> Result<Session> {
    self.session.active(self.notes.service()).await
  }
}

/// Actions that a view can request in response to user input
pub enum ViewAction {
  /// No action needed
  None,
  /// Push a new view onto the stack
  Push(Box<dyn View>),
  /// Pop current view from stack (go back); quits from the root view
  Pop,
}

/// Trait for view behavior
///
/// Views handle their own input modes (search, edit, etc.) and return
/// actions for the App to execute: App → View → Components.
///
/// Views that load data asynchronously use Query<T> / Mutation<T>
/// internally and poll them in `tick()`.
pub trait View {
  /// Handle a key event, returning an action for App to execute
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  /// Render the view to the frame
  fn render(&mut self, frame: &mut Frame, area: Rect);

  /// Get the breadcrumb label for this view
  fn breadcrumb_label(&self) -> String;

  /// Called on each tick to poll async work. May ask to close the view.
  fn tick(&mut self) -> ViewAction {
    ViewAction::None
  }

  /// True while a text field has focus; the App then forwards every key
  fn captures_input(&self) -> bool {
    false
  }

  /// Short status for the footer (e.g. "refreshing")
  fn status(&self) -> Option<String> {
    None
  }

  /// Get keyboard shortcuts to display in the header
  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
