use crate::backend::types::{Credentials, SignUpOutcome};
use crate::query::Mutation;
use crate::ui::components::TextInput;
use crate::ui::view::{ShortcutInfo, View, ViewAction, ViewContext};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
  SignIn,
  SignUp,
}

impl AuthMode {
  fn heading(self) -> &'static str {
    match self {
      AuthMode::SignIn => "Sign in",
      AuthMode::SignUp => "Create account",
    }
  }

  fn toggled(self) -> Self {
    match self {
      AuthMode::SignIn => AuthMode::SignUp,
      AuthMode::SignUp => AuthMode::SignIn,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
  Email,
  Password,
  Submit,
  ToggleMode,
  Provider(usize),
  Redirect,
}

/// Sign-in with a provider: open `url`, paste back where it lands
struct OAuthPrompt {
  provider: String,
  url: String,
  redirect: TextInput,
}

/// Sign in / sign up form. One form, one validation, a mode flag.
pub struct AuthView {
  ctx: ViewContext,
  mode: AuthMode,
  email: TextInput,
  password: TextInput,
  focus: Focus,
  oauth: Option<OAuthPrompt>,
  request: Mutation<SignUpOutcome>,
  error: Option<String>,
  notice: Option<String>,
}

impl AuthView {
  pub fn new(ctx: ViewContext) -> Self {
    Self {
      ctx,
      mode: AuthMode::SignIn,
      email: TextInput::new(),
      password: TextInput::masked(),
      focus: Focus::Email,
      oauth: None,
      request: Mutation::new(),
      error: None,
      notice: None,
    }
  }

  #[cfg(test)]
  pub fn mode(&self) -> AuthMode {
    self.mode
  }

  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  pub fn is_submitting(&self) -> bool {
    self.request.is_pending()
  }

  fn focus_order(&self) -> Vec<Focus> {
    let mut order = vec![Focus::Email, Focus::Password, Focus::Submit, Focus::ToggleMode];
    order.extend((0..self.ctx.auth.providers.len()).map(Focus::Provider));
    if self.oauth.is_some() {
      order.push(Focus::Redirect);
    }
    order
  }

  fn move_focus(&mut self, forward: bool) {
    let order = self.focus_order();
    let idx = order.iter().position(|f| *f == self.focus).unwrap_or(0);
    let next = if forward {
      (idx + 1) % order.len()
    } else {
      (idx + order.len() - 1) % order.len()
    };
    self.focus = order[next];
  }

  fn toggle_mode(&mut self) {
    self.mode = self.mode.toggled();
    self.error = None;
    self.notice = None;
  }

  fn focused_input(&mut self) -> Option<&mut TextInput> {
    match self.focus {
      Focus::Email => Some(&mut self.email),
      Focus::Password => Some(&mut self.password),
      Focus::Redirect => self.oauth.as_mut().map(|o| &mut o.redirect),
      _ => None,
    }
  }

  fn submit_credentials(&mut self) {
    if self.is_submitting() {
      return;
    }
    self.error = None;
    self.notice = None;

    let credentials = Credentials::new(self.email.value(), self.password.value());
    if let Err(e) = credentials.validate() {
      self.error = Some(e.to_string());
      return;
    }

    let service = self.ctx.notes.service().clone();
    match self.mode {
      AuthMode::SignIn => {
        self.request.start(async move {
          service
            .sign_in(&credentials)
            .await
            .map(SignUpOutcome::SignedIn)
        });
      }
      AuthMode::SignUp => {
        self
          .request
          .start(async move { service.sign_up(&credentials).await });
      }
    }
  }

  fn open_provider(&mut self, idx: usize) {
    let Some(provider) = self.ctx.auth.providers.get(idx).cloned() else {
      return;
    };
    let redirect_to = self.ctx.auth.redirect_to.as_deref();
    match self.ctx.notes.service().authorize_url(&provider, redirect_to) {
      Ok(url) => {
        self.error = None;
        self.oauth = Some(OAuthPrompt {
          provider,
          url,
          redirect: TextInput::new(),
        });
        self.focus = Focus::Redirect;
      }
      Err(e) => self.error = Some(e.to_string()),
    }
  }

  fn submit_redirect(&mut self) {
    if self.is_submitting() {
      return;
    }
    let Some(oauth) = &self.oauth else {
      return;
    };
    self.error = None;
    let redirect = oauth.redirect.value().to_string();
    let service = self.ctx.notes.service().clone();
    self.request.start(async move {
      service
        .sign_in_with_redirect(&redirect)
        .await
        .map(SignUpOutcome::SignedIn)
    });
  }

  fn activate_focused(&mut self) {
    match self.focus {
      Focus::Email => self.focus = Focus::Password,
      Focus::Password | Focus::Submit => self.submit_credentials(),
      Focus::ToggleMode => self.toggle_mode(),
      Focus::Provider(i) => self.open_provider(i),
      Focus::Redirect => self.submit_redirect(),
    }
  }

  fn button_line(&self, focus: Focus, label: String) -> Line<'static> {
    let style = if self.focus == focus {
      Style::default().fg(Color::Black).bg(Color::Cyan).bold()
    } else {
      Style::default().fg(Color::Cyan)
    };
    Line::from(vec![Span::raw("  "), Span::styled(format!("[ {} ]", label), style)])
  }

  fn field_lines(&self, label: &str, input: &TextInput, focus: Focus) -> Vec<Line<'static>> {
    let focused = self.focus == focus;
    let label_style = if focused {
      Style::default().fg(Color::Yellow).bold()
    } else {
      Style::default().fg(Color::DarkGray)
    };
    let mut value = input.line(focused);
    value.spans.insert(0, Span::raw("  "));
    vec![Line::styled(format!("{}:", label), label_style), value]
  }
}

impl View for AuthView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
      KeyCode::Tab | KeyCode::Down => {
        self.move_focus(true);
        return ViewAction::None;
      }
      KeyCode::BackTab | KeyCode::Up => {
        self.move_focus(false);
        return ViewAction::None;
      }
      KeyCode::Char('t') if ctrl => {
        self.toggle_mode();
        return ViewAction::None;
      }
      KeyCode::Enter => {
        self.activate_focused();
        return ViewAction::None;
      }
      KeyCode::Esc => {
        if self.oauth.take().is_some() {
          self.focus = Focus::Submit;
        }
        return ViewAction::None;
      }
      _ => {}
    }

    if let Some(input) = self.focused_input() {
      // Enter and Esc are taken above
      input.handle_key(key);
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Char('q') => ViewAction::Pop,
      _ => ViewAction::None,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let width = area.width.min(72);
    let height = area.height.min(24);
    let form_area = Rect::new(
      area.x + (area.width - width) / 2,
      area.y + (area.height - height) / 2,
      width,
      height,
    );
    frame.render_widget(Clear, form_area);

    let block = Block::default()
      .title(format!(" {} ", self.mode.heading()))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    let inner = block.inner(form_area);
    frame.render_widget(block, form_area);

    let mut lines: Vec<Line> = Vec::new();
    lines.extend(self.field_lines("Email", &self.email, Focus::Email));
    lines.extend(self.field_lines("Password", &self.password, Focus::Password));
    lines.push(Line::raw(""));

    let submit_label = if self.is_submitting() {
      "Working...".to_string()
    } else {
      self.mode.heading().to_string()
    };
    lines.push(self.button_line(Focus::Submit, submit_label));
    let toggle_label = match self.mode {
      AuthMode::SignIn => "No account? Sign up",
      AuthMode::SignUp => "Have an account? Sign in",
    };
    lines.push(self.button_line(Focus::ToggleMode, toggle_label.to_string()));

    for (i, provider) in self.ctx.auth.providers.iter().enumerate() {
      lines.push(self.button_line(Focus::Provider(i), format!("Continue with {}", provider)));
    }

    if let Some(oauth) = &self.oauth {
      lines.push(Line::raw(""));
      lines.push(Line::styled(
        format!("Open this URL to sign in with {}:", oauth.provider),
        Style::default().fg(Color::DarkGray),
      ));
      lines.push(Line::styled(
        oauth.url.clone(),
        Style::default().fg(Color::Blue).underlined(),
      ));
      lines.extend(self.field_lines(
        "Paste the URL you were redirected to",
        &oauth.redirect,
        Focus::Redirect,
      ));
    }

    if let Some(error) = self.error() {
      lines.push(Line::raw(""));
      lines.push(Line::styled(error.to_string(), Style::default().fg(Color::Red)));
    }
    if let Some(notice) = &self.notice {
      lines.push(Line::raw(""));
      lines.push(Line::styled(notice.clone(), Style::default().fg(Color::Green)));
    }

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
  }

  fn breadcrumb_label(&self) -> String {
    self.mode.heading().to_string()
  }

  fn tick(&mut self) -> ViewAction {
    match self.request.poll() {
      Some(Ok(SignUpOutcome::SignedIn(session))) => {
        self.password.clear();
        self.ctx.session.sign_in(session);
      }
      Some(Ok(SignUpOutcome::ConfirmationRequired { email })) => {
        self.mode = AuthMode::SignIn;
        self.password.clear();
        self.focus = Focus::Password;
        self.notice = Some(format!(
          "Check your email ({}) for confirmation, then sign in.",
          email
        ));
      }
      Some(Err(e)) => {
        warn!(error = %e, mode = ?self.mode, "authentication failed");
        self.error = Some(e.to_string());
        self.ctx.notifier.error(e.to_string());
      }
      None => {}
    }
    ViewAction::None
  }

  fn captures_input(&self) -> bool {
    matches!(self.focus, Focus::Email | Focus::Password | Focus::Redirect)
  }

  fn status(&self) -> Option<String> {
    self.is_submitting().then(|| "authenticating".to_string())
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("tab", "next field").with_priority(10),
      ShortcutInfo::new("enter", "submit").with_priority(20),
      ShortcutInfo::new("ctrl-t", "sign in/up").with_priority(30),
    ]
  }
}
