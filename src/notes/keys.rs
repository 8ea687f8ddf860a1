//! Query keys for note data.

use crate::cache::QueryKey;

/// Cached note queries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NoteQueryKey {
  /// All notes owned by a user
  NoteList { owner: String },
}

impl NoteQueryKey {
  pub fn note_list(owner: impl Into<String>) -> Self {
    Self::NoteList {
      owner: owner.into(),
    }
  }
}

impl QueryKey for NoteQueryKey {
  fn cache_key(&self) -> String {
    match self {
      Self::NoteList { owner } => format!("notes:{}", owner),
    }
  }

  fn description(&self) -> String {
    match self {
      Self::NoteList { owner } => format!("Notes of {}", owner),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_keys_are_per_owner() {
    let a = NoteQueryKey::note_list("user-1");
    let b = NoteQueryKey::note_list("user-2");
    assert_eq!(a.cache_key(), "notes:user-1");
    assert_ne!(a.cache_key(), b.cache_key());
  }
}
