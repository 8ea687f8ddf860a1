use super::input::{InputResult, TextInput};
use super::KeyResult;
use crate::backend::types::{Note, NoteDraft, NoteUpdate};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

/// Events emitted by the note form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormEvent {
  Submit,
  Cancel,
  /// Fill the explanation field from the generator
  Generate,
}

/// Title/content form, with an explanation field when creating.
#[derive(Debug, Clone)]
pub struct NoteForm {
  title: TextInput,
  content: TextInput,
  explanation: Option<TextInput>,
  focus: usize,
}

impl NoteForm {
  /// Empty form for a new note
  pub fn create() -> Self {
    Self {
      title: TextInput::new(),
      content: TextInput::new(),
      explanation: Some(TextInput::new()),
      focus: 0,
    }
  }

  /// Form prefilled with an existing note; the explanation is not editable
  pub fn edit(note: &Note) -> Self {
    Self {
      title: TextInput::with_value(&note.title),
      content: TextInput::with_value(&note.content),
      explanation: None,
      focus: 0,
    }
  }

  fn field_count(&self) -> usize {
    if self.explanation.is_some() {
      3
    } else {
      2
    }
  }

  fn focused_input(&mut self) -> &mut TextInput {
    match self.focus {
      0 => &mut self.title,
      1 => &mut self.content,
      _ => match self.explanation.as_mut() {
        Some(e) => e,
        None => &mut self.content,
      },
    }
  }

  pub fn title(&self) -> &str {
    self.title.value()
  }

  pub fn content(&self) -> &str {
    self.content.value()
  }

  pub fn set_explanation(&mut self, text: &str) {
    if let Some(e) = self.explanation.as_mut() {
      e.set_value(text);
    }
  }

  pub fn draft(&self) -> NoteDraft {
    let mut draft = NoteDraft::new(self.title.value(), self.content.value());
    if let Some(e) = &self.explanation {
      draft = draft.with_explanation(e.value());
    }
    draft
  }

  pub fn update(&self) -> NoteUpdate {
    NoteUpdate::new(self.title.value(), self.content.value())
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<FormEvent> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
      KeyCode::Esc => return KeyResult::Event(FormEvent::Cancel),
      KeyCode::Char('s') if ctrl => return KeyResult::Event(FormEvent::Submit),
      KeyCode::Char('g') if ctrl && self.explanation.is_some() => {
        return KeyResult::Event(FormEvent::Generate)
      }
      KeyCode::Tab | KeyCode::Down => {
        self.focus = (self.focus + 1) % self.field_count();
        return KeyResult::Handled;
      }
      KeyCode::BackTab | KeyCode::Up => {
        self.focus = (self.focus + self.field_count() - 1) % self.field_count();
        return KeyResult::Handled;
      }
      KeyCode::Enter => {
        if self.focus + 1 == self.field_count() {
          return KeyResult::Event(FormEvent::Submit);
        }
        self.focus += 1;
        return KeyResult::Handled;
      }
      _ => {}
    }

    match self.focused_input().handle_key(key) {
      InputResult::Consumed => KeyResult::Handled,
      InputResult::NotHandled => KeyResult::NotHandled,
      // Enter and Esc are taken above
      InputResult::Submitted(_) | InputResult::Cancelled => KeyResult::Handled,
    }
  }

  /// Render the form. `status` replaces the key hint while a request runs.
  pub fn render(&self, frame: &mut Frame, area: Rect, heading: &str, status: Option<&str>) {
    let block = Block::default()
      .title(format!(" {} ", heading))
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines: Vec<Line> = Vec::new();
    let fields: [(&str, Option<&TextInput>); 3] = [
      ("Title", Some(&self.title)),
      ("Content", Some(&self.content)),
      ("Explanation", self.explanation.as_ref()),
    ];
    for (i, (label, input)) in fields.iter().enumerate() {
      let Some(input) = input else { continue };
      let focused = i == self.focus;
      let label_style = if focused {
        Style::default().fg(Color::Yellow).bold()
      } else {
        Style::default().fg(Color::DarkGray)
      };
      lines.push(Line::styled(format!("{}:", label), label_style));
      let mut value = input.line(focused);
      value.spans.insert(0, Span::raw("  "));
      lines.push(value);
      lines.push(Line::raw(""));
    }

    let hint = match status {
      Some(s) => Line::styled(s.to_string(), Style::default().fg(Color::Cyan)),
      None if self.explanation.is_some() => Line::styled(
        "Tab next  Ctrl-G generate explanation  Ctrl-S save  Esc cancel",
        Style::default().fg(Color::DarkGray),
      ),
      None => Line::styled(
        "Tab next  Ctrl-S save  Esc cancel",
        Style::default().fg(Color::DarkGray),
      ),
    };
    lines.push(hint);

    frame.render_widget(
      Paragraph::new(lines).wrap(Wrap { trim: false }),
      inner,
    );
  }
}
