//! Typed conversation/message helpers on top of [`CacheManager`].

use crate::cache::{conversations_key, messages_key, CacheManager, CONVERSATIONS, MESSAGES};
use crate::error::Result;
use crate::models::{Conversation, Message};

impl CacheManager {
    /// Cached conversation list of `owner_id`.
    pub async fn conversations(&self, owner_id: &str) -> Option<Vec<Conversation>> {
        self.read(&conversations_key(owner_id), owner_id).await
    }

    /// Caches the conversation list of `owner_id`.
    pub async fn store_conversations(
        &self,
        owner_id: &str,
        conversations: &[Conversation],
    ) -> Result<bool> {
        self.write(&conversations_key(owner_id), conversations, owner_id)
            .await
    }

    /// Cached messages of one conversation.
    pub async fn messages(&self, owner_id: &str, conversation_id: &str) -> Option<Vec<Message>> {
        self.read(&messages_key(owner_id, conversation_id), owner_id)
            .await
    }

    /// Caches the messages of one conversation.
    pub async fn store_messages(
        &self,
        owner_id: &str,
        conversation_id: &str,
        messages: &[Message],
    ) -> Result<bool> {
        self.write(&messages_key(owner_id, conversation_id), messages, owner_id)
            .await
    }

    /// Drops all cached conversations and messages of `owner_id`.
    ///
    /// Returns the number of entries removed.
    pub async fn forget_owner(&self, owner_id: &str) -> Result<usize> {
        let conversations = self.invalidate_prefix(owner_id, CONVERSATIONS).await?;
        let messages = self.invalidate_prefix(owner_id, MESSAGES).await?;
        Ok(conversations + messages)
    }
}
