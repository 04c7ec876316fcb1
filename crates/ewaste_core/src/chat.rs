//! Saved assistant conversations.
//!
//! A conversation is created by its first question and titled after it. Every
//! later exchange is appended in order; the list view sorts by last activity.

use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use crate::domain::{ChatMessage, ChatRole, Conversation, StoredChatMessage};
use crate::feed::Collection;
use crate::ports::{ChangeFeed, Clock, DatabaseService};
use crate::records::{RecordError, RecordResult};

const TITLE_CHARS: usize = 50;

/// The first line of `message`, cut to fit a list row.
pub fn title_for(message: &str) -> String {
    let line = message.trim().lines().next().unwrap_or_default().trim();
    if line.chars().count() <= TITLE_CHARS {
        return line.to_string();
    }
    let cut: String = line.chars().take(TITLE_CHARS).collect();
    format!("{}...", cut.trim_end())
}

#[derive(Clone)]
pub struct ChatHistory {
    db: Arc<dyn DatabaseService>,
    feed: Arc<dyn ChangeFeed>,
    clock: Arc<dyn Clock>,
}

impl ChatHistory {
    pub fn new(db: Arc<dyn DatabaseService>, feed: Arc<dyn ChangeFeed>, clock: Arc<dyn Clock>) -> Self {
        Self { db, feed, clock }
    }

    /// Continues the owner's conversation `id`, or starts one for `question`.
    /// Returns the conversation with its earlier turns, oldest first.
    pub async fn open(
        &self,
        owner_id: Uuid,
        id: Option<Uuid>,
        question: &str,
    ) -> RecordResult<(Conversation, Vec<ChatMessage>)> {
        match id {
            Some(id) => {
                let conversation = self.owned(owner_id, id).await?;
                let turns = self.db.list_chat_messages(id).await?;
                Ok((conversation, turns.into_iter().map(Into::into).collect()))
            }
            None => {
                let conversation = self
                    .db
                    .create_conversation(owner_id, &title_for(question), self.clock.now())
                    .await?;
                info!("Conversation {} started by {}", conversation.id, owner_id);
                Ok((conversation, Vec::new()))
            }
        }
    }

    /// Stores one turn. A lost turn is logged; the chat itself carries on.
    pub async fn append(&self, conversation: &Conversation, role: ChatRole, content: &str) {
        let stored = self
            .db
            .append_chat_message(conversation.id, conversation.owner_id, role, content, self.clock.now())
            .await;
        match stored {
            Ok(message) => {
                self.feed
                    .publish(Collection::ChatConversations, conversation.owner_id, message.conversation_id);
            }
            Err(e) => error!(
                "Failed to store {} turn in conversation {}: {:?}",
                role.as_str(),
                conversation.id,
                e
            ),
        }
    }

    pub async fn list(&self, owner_id: Uuid) -> RecordResult<Vec<Conversation>> {
        Ok(self.db.list_conversations(owner_id).await?)
    }

    pub async fn messages(&self, owner_id: Uuid, id: Uuid) -> RecordResult<Vec<StoredChatMessage>> {
        self.owned(owner_id, id).await?;
        Ok(self.db.list_chat_messages(id).await?)
    }

    pub async fn delete(&self, owner_id: Uuid, id: Uuid) -> RecordResult<()> {
        self.owned(owner_id, id).await?;
        self.db.delete_conversation(id).await?;
        info!("Conversation {} deleted by {}", id, owner_id);
        self.feed.publish(Collection::ChatConversations, owner_id, id);
        Ok(())
    }

    async fn owned(&self, owner_id: Uuid, id: Uuid) -> RecordResult<Conversation> {
        let conversation = self.db.get_conversation(id).await?;
        if conversation.owner_id != owner_id {
            return Err(RecordError::NotOwner);
        }
        Ok(conversation)
    }
}
