//! Cache Key Module
//!
//! Keys follow `<namespace>:<ownerId>[:<subId>]`. The namespace selects the
//! storage partition, so every key that reaches the store goes through here.

use std::borrow::Cow;
use std::fmt;

use crate::error::{CacheError, Result};
use crate::store::Partition;

/// Separator between key segments.
pub const KEY_DELIMITER: char = ':';

/// Namespace holding a user's conversation list.
pub const CONVERSATIONS: &str = "conversations";

/// Namespace holding the messages of one conversation.
pub const MESSAGES: &str = "messages";

// == Cache Key ==
/// A validated cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Parses a raw key, requiring a namespace and at least one id segment,
    /// none of them empty.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let segments: Vec<&str> = raw.split(KEY_DELIMITER).collect();

        if segments.len() < 2 {
            return Err(CacheError::InvalidKey(format!(
                "'{raw}' has no id segment"
            )));
        }
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(CacheError::InvalidKey(format!(
                "'{raw}' contains an empty segment"
            )));
        }

        Ok(Self(raw))
    }

    /// The namespace segment.
    pub fn namespace(&self) -> &str {
        namespace_of(&self.0)
    }

    /// The partition this key lives in.
    pub fn partition(&self) -> Partition {
        Partition::for_namespace(self.namespace())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// == Key Builders ==
/// Escapes an id so it always occupies exactly one key segment.
///
/// `%` and the delimiter are percent-encoded; ids without them pass through.
fn escape_segment(id: &str) -> Cow<'_, str> {
    if !id.contains(|c: char| c == '%' || c == KEY_DELIMITER) {
        return Cow::Borrowed(id);
    }
    Cow::Owned(id.replace('%', "%25").replace(KEY_DELIMITER, "%3A"))
}

/// Key for an owner's conversation list.
///
/// An empty owner id builds a key the cache refuses to write
/// ([`CacheError::InvalidOwner`]).
pub fn conversations_key(owner_id: &str) -> CacheKey {
    CacheKey(format!(
        "{CONVERSATIONS}{KEY_DELIMITER}{}",
        escape_segment(owner_id)
    ))
}

/// Key for the messages of one conversation.
pub fn messages_key(owner_id: &str, conversation_id: &str) -> CacheKey {
    CacheKey(format!(
        "{MESSAGES}{KEY_DELIMITER}{}{KEY_DELIMITER}{}",
        escape_segment(owner_id),
        escape_segment(conversation_id)
    ))
}

// == Partition Resolution ==
/// Resolves the partition for any raw key string.
pub fn resolve_partition(key: &str) -> Partition {
    Partition::for_namespace(namespace_of(key))
}

fn namespace_of(key: &str) -> &str {
    key.split_once(KEY_DELIMITER)
        .map_or(key, |(namespace, _)| namespace)
}

/// True if `key` belongs to `owner_id` within `namespace`.
///
/// Matches `<namespace>:<owner>` exactly or followed by another segment, so
/// owner `u1` never claims keys of owner `u10`. The owner id is escaped the
/// way the key builders escape it.
pub fn owned_by(key: &str, namespace: &str, owner_id: &str) -> bool {
    let Some(rest) = key
        .strip_prefix(namespace)
        .and_then(|rest| rest.strip_prefix(KEY_DELIMITER))
    else {
        return false;
    };

    let owner = escape_segment(owner_id);
    match rest.strip_prefix(&*owner) {
        Some("") => true,
        Some(tail) => tail.starts_with(KEY_DELIMITER),
        None => false,
    }
}
