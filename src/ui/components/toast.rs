use ratatui::prelude::*;
use ratatui::widgets::Paragraph;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const TOAST_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
  Success,
  Info,
  Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
  pub kind: ToastKind,
  pub message: String,
}

/// Handle views use to raise toasts
#[derive(Debug, Clone)]
pub struct Notifier {
  tx: mpsc::UnboundedSender<Toast>,
}

impl Notifier {
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<Toast>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self { tx }, rx)
  }

  fn send(&self, kind: ToastKind, message: impl Into<String>) {
    // UI gone means nobody to tell
    let _ = self.tx.send(Toast {
      kind,
      message: message.into(),
    });
  }

  pub fn success(&self, message: impl Into<String>) {
    self.send(ToastKind::Success, message);
  }

  pub fn info(&self, message: impl Into<String>) {
    self.send(ToastKind::Info, message);
  }

  pub fn error(&self, message: impl Into<String>) {
    self.send(ToastKind::Error, message);
  }
}

/// Latest toast, shown until it expires or a newer one arrives
pub struct ToastLine {
  rx: mpsc::UnboundedReceiver<Toast>,
  current: Option<(Toast, Instant)>,
}

impl ToastLine {
  pub fn new(rx: mpsc::UnboundedReceiver<Toast>) -> Self {
    Self { rx, current: None }
  }

  /// Drain new toasts and expire the old one
  pub fn tick(&mut self) {
    while let Ok(toast) = self.rx.try_recv() {
      self.current = Some((toast, Instant::now()));
    }
    if self
      .current
      .as_ref()
      .is_some_and(|(_, at)| at.elapsed() > TOAST_TTL)
    {
      self.current = None;
    }
  }

  pub fn current(&self) -> Option<&Toast> {
    self.current.as_ref().map(|(t, _)| t)
  }

  pub fn render(&self, frame: &mut Frame, area: Rect) {
    let Some(toast) = self.current() else {
      return;
    };
    let (icon, color) = match toast.kind {
      ToastKind::Success => ("✓", Color::Green),
      ToastKind::Info => ("i", Color::Cyan),
      ToastKind::Error => ("✗", Color::Red),
    };
    let line = Line::from(vec![
      Span::styled(format!(" {} ", icon), Style::default().fg(color).bold()),
      Span::styled(toast.message.clone(), Style::default().fg(color)),
    ]);
    frame.render_widget(
      Paragraph::new(line).style(Style::default().bg(Color::Black)),
      area,
    );
  }
}
