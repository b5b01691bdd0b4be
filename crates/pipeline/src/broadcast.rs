//! Per-conversation broadcast topics.
//!
//! Fan-out delivery of streamed answer events. Topics are named
//! deterministically from the conversation id; consumers subscribe to a
//! topic and key on `question_id`, since one topic can interleave events
//! for several questions of the same conversation.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Buffered events per topic before slow subscribers start lagging.
const TOPIC_CAPACITY: usize = 256;

/// An event on a conversation topic.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Incremental answer chunk
    Chunk {
        question_id: String,
        message: String,
    },

    /// Terminal: streaming ran to completion
    Finished { question_id: String },

    /// Terminal: streaming was cancelled, with the partial text if any
    Cancelled {
        question_id: String,
        message: Option<String>,
    },

    /// Terminal: no answer exists for this question
    NoAnswer,
}

impl StreamEvent {
    /// Wire shape of the event.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Chunk {
                question_id,
                message,
            } => json!({"question_id": question_id, "message": message}),
            Self::Finished { question_id } => {
                json!({"question_id": question_id, "finished": true})
            }
            Self::Cancelled {
                question_id,
                message,
            } => json!({"question_id": question_id, "cancelled": true, "message": message}),
            Self::NoAnswer => json!({"answer": null}),
        }
    }

    /// Whether this event ends its question's stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Chunk { .. })
    }
}

/// Topic name for a conversation.
pub fn conversation_topic(conversation_id: &str) -> String {
    format!("conversation_{}", conversation_id)
}

/// Publish/subscribe hub over per-conversation topics.
///
/// Delivery is at-least-once per subscriber and ordered per publisher.
/// Publishing to a topic with no subscribers is not an error; the event is
/// simply dropped.
pub struct Broadcaster {
    topics: Mutex<HashMap<String, broadcast::Sender<StreamEvent>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to a conversation's topic.
    pub fn subscribe(&self, conversation_id: &str) -> broadcast::Receiver<StreamEvent> {
        let topic = conversation_topic(conversation_id);
        let mut topics = self.topics.lock().unwrap();
        topics
            .entry(topic)
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe()
    }

    /// Publish an event to a conversation's topic.
    pub fn publish(&self, conversation_id: &str, event: StreamEvent) {
        let topic = conversation_topic(conversation_id);
        let sender = {
            let mut topics = self.topics.lock().unwrap();
            topics
                .entry(topic)
                .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
                .clone()
        };

        // A send error only means nobody is subscribed right now
        if sender.send(event).is_err() {
            tracing::debug!(
                "No subscribers on topic for conversation {}",
                conversation_id
            );
        }
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}
