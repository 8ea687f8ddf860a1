use crate::backend::types::Note;
use crate::query::Mutation;
use crate::ui::components::{FormEvent, KeyResult, NoteForm};
use crate::ui::view::{ShortcutInfo, View, ViewAction, ViewContext};
use crate::ui::views::failure_message;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use tracing::warn;

const MISSING_INPUT: &str = "Please enter both title and content first.";

/// Form for a new note, with optional generated explanation.
pub struct NoteFormView {
  ctx: ViewContext,
  form: NoteForm,
  generate: Mutation<String>,
  save: Mutation<Note>,
  message: Option<String>,
}

impl NoteFormView {
  pub fn new(ctx: ViewContext) -> Self {
    Self {
      ctx,
      form: NoteForm::create(),
      generate: Mutation::new(),
      save: Mutation::new(),
      message: None,
    }
  }

  fn start_generate(&mut self) {
    if self.form.title().trim().is_empty() || self.form.content().trim().is_empty() {
      self.message = Some(MISSING_INPUT.to_string());
      self.ctx.notifier.error(MISSING_INPUT);
      return;
    }
    self.message = None;
    let notes = self.ctx.notes.clone();
    let title = self.form.title().to_string();
    let content = self.form.content().to_string();
    self
      .generate
      .start(async move { notes.generate_explanation(&title, &content).await });
  }

  fn start_save(&mut self) {
    self.message = None;
    let ctx = self.ctx.clone();
    let draft = self.form.draft();
    self.save.start(async move {
      let session = ctx.active_session().await?;
      ctx.notes.create_note(&session, &draft).await
    });
  }

  fn form_status(&self) -> Option<&str> {
    if self.save.is_pending() {
      Some("Saving...")
    } else if self.generate.is_pending() {
      Some("Generating explanation...")
    } else {
      self.message.as_deref()
    }
  }
}

impl View for NoteFormView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.form.handle_key(key) {
      KeyResult::Event(FormEvent::Cancel) => return ViewAction::Pop,
      KeyResult::Event(FormEvent::Submit) => self.start_save(),
      KeyResult::Event(FormEvent::Generate) => self.start_generate(),
      KeyResult::Handled | KeyResult::NotHandled => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.form.render(frame, area, "New note", self.form_status());
  }

  fn breadcrumb_label(&self) -> String {
    "New note".to_string()
  }

  fn tick(&mut self) -> ViewAction {
    match self.generate.poll() {
      Some(Ok(text)) => {
        self.form.set_explanation(&text);
        self.ctx.notifier.success("Explanation generated!");
      }
      Some(Err(e)) => {
        // The note can still be saved without one
        warn!(error = %e, "explanation for draft failed");
        let message = failure_message(&e, "Failed to generate explanation.");
        self.message = Some(message.clone());
        self.ctx.notifier.error(message);
      }
      None => {}
    }

    match self.save.poll() {
      Some(Ok(_)) => {
        self.ctx.notifier.success("Note created!");
        ViewAction::Pop
      }
      Some(Err(e)) => {
        warn!(error = %e, "create note failed");
        self.ctx.session.end_if_expired(&e);
        let message = failure_message(&e, "Failed to create note.");
        self.message = Some(message.clone());
        self.ctx.notifier.error(message);
        ViewAction::None
      }
      None => ViewAction::None,
    }
  }

  fn captures_input(&self) -> bool {
    true
  }

  fn status(&self) -> Option<String> {
    self.form_status().map(String::from)
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("ctrl-s", "save").with_priority(10),
      ShortcutInfo::new("ctrl-g", "explain").with_priority(20),
      ShortcutInfo::new("esc", "cancel").with_priority(90),
    ]
  }
}
