//! Local persistence for the Abelana client: a durable key/value store and
//! the per-stream photo list cache kept on top of it.

use thiserror::Error;

mod photo_cache;
mod prefs;

pub use photo_cache::{list_key, next_page_key, PhotoCache};
pub use prefs::{MemoryPrefs, Prefs, SqlitePrefs};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Database Error: {0}")]
    DatabaseError(String),
    #[error("Serialization Error: {0}")]
    SerializationError(String),
    #[error("Deserialization Error: {0}")]
    DeserializationError(String),
    #[error("Other Error: {0}")]
    Other(String),
}
