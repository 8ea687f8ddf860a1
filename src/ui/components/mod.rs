mod command_input;
mod input;
mod key_result;
mod note_form;
mod search_input;
mod toast;

pub use command_input::{CommandEvent, CommandInput};
pub use input::TextInput;
pub use key_result::KeyResult;
pub use note_form::{FormEvent, NoteForm};
pub use search_input::SearchInput;
pub use toast::{Notifier, ToastLine};
#[cfg(test)]
pub use toast::Toast;
