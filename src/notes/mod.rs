//! Notes: data access, cache keys and the cached coordinator the views use.

mod coordinator;
mod keys;
mod service;

pub use coordinator::NoteCoordinator;
pub use service::NoteService;
