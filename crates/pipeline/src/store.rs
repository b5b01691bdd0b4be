//! Durable storage boundary.
//!
//! Conversations, questions, and answers live behind this trait; the
//! pipeline only mutates them through it. The in-memory implementation is
//! the reference used by tests and the CLI; durable backends are external
//! collaborators.

use chrono::Utc;
use converse_core::{AppError, AppResult};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::models::{Answer, Conversation, Question};

/// Storage boundary for the conversation model.
#[async_trait::async_trait]
pub trait ConversationStore: Send + Sync {
    /// Create a new conversation.
    async fn create_conversation(&self) -> AppResult<Conversation>;

    /// Fetch a conversation by id.
    async fn conversation(&self, conversation_id: &str) -> AppResult<Option<Conversation>>;

    /// Append a question to a conversation.
    async fn add_question(&self, conversation_id: &str, message: &str) -> AppResult<Question>;

    /// Fetch a question by id.
    async fn question(&self, question_id: &str) -> AppResult<Option<Question>>;

    /// Attach an answer to a question.
    async fn save_answer(&self, question_id: &str, answer: Answer) -> AppResult<()>;

    /// A conversation's questions in creation order.
    async fn questions(&self, conversation_id: &str) -> AppResult<Vec<Question>>;
}

#[derive(Default)]
struct InMemoryState {
    conversations: HashMap<String, Conversation>,
    /// Questions in insertion order, across all conversations
    questions: Vec<Question>,
}

/// In-process reference implementation of the storage boundary.
pub struct InMemoryStore {
    state: RwLock<InMemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(InMemoryState::default()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ConversationStore for InMemoryStore {
    async fn create_conversation(&self) -> AppResult<Conversation> {
        let conversation = Conversation {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
        };

        let mut state = self.state.write().await;
        state
            .conversations
            .insert(conversation.id.clone(), conversation.clone());

        Ok(conversation)
    }

    async fn conversation(&self, conversation_id: &str) -> AppResult<Option<Conversation>> {
        let state = self.state.read().await;
        Ok(state.conversations.get(conversation_id).cloned())
    }

    async fn add_question(&self, conversation_id: &str, message: &str) -> AppResult<Question> {
        let mut state = self.state.write().await;

        if !state.conversations.contains_key(conversation_id) {
            return Err(AppError::Other(format!(
                "Unknown conversation: {}",
                conversation_id
            )));
        }

        let question = Question {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            message: message.to_string(),
            created_at: Utc::now(),
            answer: None,
        };

        state.questions.push(question.clone());
        Ok(question)
    }

    async fn question(&self, question_id: &str) -> AppResult<Option<Question>> {
        let state = self.state.read().await;
        Ok(state
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .cloned())
    }

    async fn save_answer(&self, question_id: &str, answer: Answer) -> AppResult<()> {
        let mut state = self.state.write().await;

        let question = state
            .questions
            .iter_mut()
            .find(|q| q.id == question_id)
            .ok_or_else(|| AppError::Other(format!("Unknown question: {}", question_id)))?;

        question.answer = Some(answer);
        Ok(())
    }

    async fn questions(&self, conversation_id: &str) -> AppResult<Vec<Question>> {
        let state = self.state.read().await;
        Ok(state
            .questions
            .iter()
            .filter(|q| q.conversation_id == conversation_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_fetch_conversation() {
        let store = InMemoryStore::new();
        let conversation = store.create_conversation().await.unwrap();

        let fetched = store.conversation(&conversation.id).await.unwrap();
        assert!(fetched.is_some());
        assert_eq!(fetched.unwrap().id, conversation.id);

        assert!(store.conversation("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_questions_keep_creation_order() {
        let store = InMemoryStore::new();
        let conversation = store.create_conversation().await.unwrap();

        store
            .add_question(&conversation.id, "first")
            .await
            .unwrap();
        store
            .add_question(&conversation.id, "second")
            .await
            .unwrap();

        let questions = store.questions(&conversation.id).await.unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].message, "first");
        assert_eq!(questions[1].message, "second");
    }

    #[tokio::test]
    async fn test_add_question_requires_conversation() {
        let store = InMemoryStore::new();
        assert!(store.add_question("missing", "hello").await.is_err());
    }

    #[tokio::test]
    async fn test_save_answer_attaches_to_question() {
        let store = InMemoryStore::new();
        let conversation = store.create_conversation().await.unwrap();
        let question = store
            .add_question(&conversation.id, "How do I pay my tax")
            .await
            .unwrap();

        let answer = Answer::completed("Online.".to_string(), None, Vec::new(), None);
        store.save_answer(&question.id, answer).await.unwrap();

        let stored = store.question(&question.id).await.unwrap().unwrap();
        assert_eq!(
            stored.answer.as_ref().unwrap().message.as_deref(),
            Some("Online.")
        );

        let missing = Answer::completed("x".to_string(), None, Vec::new(), None);
        assert!(store.save_answer("missing", missing).await.is_err());
    }
}
