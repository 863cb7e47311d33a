//! quill-core - Core library for QuillQuiver
//!
//! This crate contains the shared models, the remote service facade, and the
//! session/synchronization engine used by all QuillQuiver shells.

pub mod auth_flow;
pub mod editor;
pub mod error;
pub mod models;
pub mod remote;
pub mod session;
pub mod store;
pub mod util;

pub use error::{Error, Result};
pub use models::{Note, NoteId, NotePatch, UserIdentity};
