//! Data models

mod note;
mod user;

pub use note::{Note, NoteId, NotePatch};
pub use user::UserIdentity;
