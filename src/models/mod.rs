//! Domain models mirrored by the cache
//!
//! Shapes of the conversation data fetched from the authoritative backend.
//! The cache stores them sealed and never originates them.

pub mod chat;

pub use chat::{Conversation, Message};
