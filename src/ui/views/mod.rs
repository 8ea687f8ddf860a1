mod auth;
mod note_form_view;
mod notes;

pub use auth::AuthView;
pub use note_form_view::NoteFormView;
pub use notes::NotesView;

use crate::error::Error;

/// Toast text for a failed request. Input and setup problems are shown as
/// they are; anything else gets the generic `fallback`.
pub(crate) fn failure_message(error: &Error, fallback: &str) -> String {
  match error {
    Error::Validation(_) | Error::Configuration(_) | Error::Auth(_) => error.to_string(),
    _ => fallback.to_string(),
  }
}
