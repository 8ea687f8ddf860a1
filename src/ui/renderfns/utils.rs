use chrono::{DateTime, Local, Utc};

/// Truncate a string to at most `max_len` chars, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// First line of a possibly multi-line text
pub fn first_line(s: &str) -> &str {
  s.lines().next().unwrap_or("")
}

/// Creation time as shown in lists, in local time
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
  at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}
