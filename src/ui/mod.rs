mod components;
mod renderfns;
pub mod view;
pub mod views;

pub use components::{CommandEvent, CommandInput, KeyResult, Notifier, ToastLine};

use crate::app::App;
use ratatui::prelude::*;
use ratatui::widgets::{ListState, Paragraph};
use renderfns::{draw_footer, draw_header};

/// Keep a list selection inside `0..len`, selecting the first row when
/// nothing is selected.
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  if len == 0 {
    state.select(None);
    return;
  }
  match state.selected() {
    Some(i) if i >= len => state.select(Some(len - 1)),
    None => state.select(Some(0)),
    _ => {}
  }
}

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Toast
      Constraint::Length(1), // Footer
    ])
    .split(frame.area());

  let shortcuts = app
    .current_view()
    .map(|v| v.shortcuts())
    .unwrap_or_default();
  draw_header(
    frame,
    chunks[0],
    app.title(),
    app.backend_url(),
    app.email().as_deref(),
    &shortcuts,
  );

  match app.current_view_mut() {
    Some(view) => view.render(frame, chunks[1]),
    None => draw_splash(frame, chunks[1]),
  }
  app.command_input().render_overlay(frame, chunks[1]);

  app.toasts().render(frame, chunks[2]);

  let status = app.current_view().and_then(|v| v.status());
  draw_footer(frame, chunks[3], &app.breadcrumb(), status.as_deref());
}

fn draw_splash(frame: &mut Frame, area: Rect) {
  let y = area.y + area.height / 2;
  let line = Rect::new(area.x, y, area.width, 1.min(area.height));
  frame.render_widget(
    Paragraph::new("Restoring session...")
      .alignment(Alignment::Center)
      .style(Style::default().fg(Color::DarkGray)),
    line,
  );
}
