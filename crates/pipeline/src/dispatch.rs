//! Streamed answer delivery with cooperative cancellation.
//!
//! Per question the dispatch job moves through
//! `pending -> streaming -> {completed | cancelled | failed}`. The composed
//! message is split into word-level chunks and emitted in order; between
//! chunks the cancellation signal is polled, so cancellation latency is
//! bounded by the inter-chunk delay rather than being instantaneous.
//!
//! The dispatcher is the sole writer of terminal answer state. A cancel
//! action only sets the signal; if the job already finished, the late
//! signal is never read against this question again and the completed
//! answer stays intact.

use converse_core::AppResult;
use std::sync::Arc;
use std::time::Duration;

use crate::broadcast::{Broadcaster, StreamEvent};
use crate::cancel::CancellationStore;
use crate::models::{Answer, AnswerDraft};
use crate::store::ConversationStore;

/// Terminal state of a dispatch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Completed,
    Cancelled,
    Failed,
}

/// Streams composed answers to a conversation topic.
#[derive(Clone)]
pub struct StreamingDispatcher {
    broadcaster: Arc<Broadcaster>,
    cancellation: Arc<CancellationStore>,
    store: Arc<dyn ConversationStore>,
    chunk_delay: Duration,
}

impl StreamingDispatcher {
    pub fn new(
        broadcaster: Arc<Broadcaster>,
        cancellation: Arc<CancellationStore>,
        store: Arc<dyn ConversationStore>,
        chunk_delay: Duration,
    ) -> Self {
        Self {
            broadcaster,
            cancellation,
            store,
            chunk_delay,
        }
    }

    /// Stream an answer draft to the conversation topic.
    ///
    /// With no draft (composition failed upstream) the job broadcasts the
    /// null-answer terminal event and ends in `Failed` without entering the
    /// streaming state or touching the answer record.
    pub async fn dispatch(
        &self,
        conversation_id: &str,
        question_id: &str,
        draft: Option<AnswerDraft>,
    ) -> AppResult<JobState> {
        let draft = match draft {
            Some(draft) => draft,
            None => {
                tracing::warn!(
                    "No answer available for question {}; broadcasting null answer",
                    question_id
                );
                self.broadcaster
                    .publish(conversation_id, StreamEvent::NoAnswer);
                return Ok(JobState::Failed);
            }
        };

        tracing::info!("Streaming answer for question {}", question_id);

        let mut emitted = String::new();

        // Each chunk is a token plus its trailing delimiter
        for chunk in draft.message.split_inclusive(char::is_whitespace) {
            if self.cancellation.is_set(question_id) {
                return self
                    .finish_cancelled(conversation_id, question_id, &draft, emitted)
                    .await;
            }

            self.broadcaster.publish(
                conversation_id,
                StreamEvent::Chunk {
                    question_id: question_id.to_string(),
                    message: chunk.to_string(),
                },
            );
            emitted.push_str(chunk);

            tokio::time::sleep(self.chunk_delay).await;
        }

        // One last poll so a signal raised during the final pause still wins
        if self.cancellation.is_set(question_id) {
            return self
                .finish_cancelled(conversation_id, question_id, &draft, emitted)
                .await;
        }

        let answer = Answer::completed(
            draft.message,
            draft.rephrased_question,
            draft.sources,
            Some(draft.guardrails),
        );
        self.store.save_answer(question_id, answer).await?;

        self.broadcaster.publish(
            conversation_id,
            StreamEvent::Finished {
                question_id: question_id.to_string(),
            },
        );

        tracing::info!("Finished streaming answer for question {}", question_id);

        Ok(JobState::Completed)
    }

    /// Persist the emitted prefix as a cancelled answer and broadcast the
    /// single cancellation terminal event.
    async fn finish_cancelled(
        &self,
        conversation_id: &str,
        question_id: &str,
        draft: &AnswerDraft,
        emitted: String,
    ) -> AppResult<JobState> {
        tracing::info!(
            "Cancellation observed for question {} after {} chars",
            question_id,
            emitted.len()
        );

        let partial = if emitted.is_empty() {
            None
        } else {
            Some(emitted)
        };

        let answer = Answer::cancelled(partial.clone(), draft.rephrased_question.clone());
        self.store.save_answer(question_id, answer).await?;

        self.broadcaster.publish(
            conversation_id,
            StreamEvent::Cancelled {
                question_id: question_id.to_string(),
                message: partial,
            },
        );

        Ok(JobState::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GuardrailAudit;
    use crate::store::InMemoryStore;
    use tokio::sync::broadcast::Receiver;

    fn draft(message: &str) -> AnswerDraft {
        AnswerDraft {
            message: message.to_string(),
            rephrased_question: Some("rephrased".to_string()),
            sources: Vec::new(),
            guardrails: GuardrailAudit::default(),
        }
    }

    async fn setup() -> (
        StreamingDispatcher,
        Arc<InMemoryStore>,
        Arc<CancellationStore>,
        Arc<Broadcaster>,
        String,
        String,
    ) {
        let store = Arc::new(InMemoryStore::new());
        let cancellation = Arc::new(CancellationStore::new());
        let broadcaster = Arc::new(Broadcaster::new());

        let conversation = store.create_conversation().await.unwrap();
        let question = store
            .add_question(&conversation.id, "How do I pay my tax")
            .await
            .unwrap();

        let dispatcher = StreamingDispatcher::new(
            broadcaster.clone(),
            cancellation.clone(),
            store.clone(),
            Duration::from_millis(1),
        );

        (
            dispatcher,
            store,
            cancellation,
            broadcaster,
            conversation.id,
            question.id,
        )
    }

    fn drain(rx: &mut Receiver<StreamEvent>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => events.push(event),
                Err(_) => break,
            }
        }
        events
    }

    #[tokio::test]
    async fn test_completion_streams_all_chunks_then_finishes() {
        let (dispatcher, store, _cancel, broadcaster, conv_id, q_id) = setup().await;
        let mut rx = broadcaster.subscribe(&conv_id);

        let state = dispatcher
            .dispatch(&conv_id, &q_id, Some(draft("Pay your tax online.")))
            .await
            .unwrap();
        assert_eq!(state, JobState::Completed);

        let events = drain(&mut rx);
        let chunks: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Chunk { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect();

        // Chunks reassemble to the exact message
        assert_eq!(chunks.concat(), "Pay your tax online.");
        // Every chunk is a token plus its trailing delimiter
        assert_eq!(chunks, ["Pay ", "your ", "tax ", "online."]);

        // Exactly one terminal event, and it is the finished marker
        let terminals: Vec<&StreamEvent> = events.iter().filter(|e| e.is_terminal()).collect();
        assert_eq!(terminals.len(), 1);
        assert_eq!(
            terminals[0],
            &StreamEvent::Finished {
                question_id: q_id.clone()
            }
        );

        // Persisted answer is complete and not cancelled
        let question = store.question(&q_id).await.unwrap().unwrap();
        let answer = question.answer.unwrap();
        assert_eq!(answer.message.as_deref(), Some("Pay your tax online."));
        assert!(!answer.cancelled);
    }

    #[tokio::test]
    async fn test_cancellation_stops_stream_and_persists_prefix() {
        let (_dispatcher, store, cancellation, broadcaster, conv_id, q_id) = setup().await;
        let mut rx = broadcaster.subscribe(&conv_id);

        // Slow the stream down so the signal lands mid-flight
        let dispatcher = StreamingDispatcher::new(
            broadcaster.clone(),
            cancellation.clone(),
            store.clone(),
            Duration::from_millis(20),
        );

        let handle = {
            let conv_id = conv_id.clone();
            let q_id = q_id.clone();
            tokio::spawn(async move {
                dispatcher
                    .dispatch(&conv_id, &q_id, Some(draft("one two three four five six")))
                    .await
            })
        };

        // Let a few chunks out, then cancel
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancellation.set(&q_id);

        let state = handle.await.unwrap().unwrap();
        assert_eq!(state, JobState::Cancelled);

        let events = drain(&mut rx);
        let chunk_count = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::Chunk { .. }))
            .count();
        assert!(chunk_count > 0, "some chunks should have been emitted");
        assert!(chunk_count < 6, "the stream must stop early");

        // No chunk events after the terminal cancellation event
        let terminal_pos = events.iter().position(|e| e.is_terminal()).unwrap();
        assert!(events[terminal_pos + 1..].is_empty());

        // Exactly one cancellation terminal event carrying the prefix
        let emitted: String = events[..terminal_pos]
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Chunk { message, .. } => Some(message.as_str()),
                _ => None,
            })
            .collect();
        match &events[terminal_pos] {
            StreamEvent::Cancelled {
                question_id,
                message,
            } => {
                assert_eq!(question_id, &q_id);
                assert_eq!(message.as_deref(), Some(emitted.as_str()));
            }
            other => panic!("Expected cancellation terminal, got {:?}", other),
        }

        // Persisted answer is cancelled with the same prefix
        let question = store.question(&q_id).await.unwrap().unwrap();
        let answer = question.answer.unwrap();
        assert!(answer.cancelled);
        assert_eq!(answer.message.as_deref(), Some(emitted.as_str()));
    }

    #[tokio::test]
    async fn test_signal_before_first_chunk_emits_nothing() {
        let (dispatcher, store, cancellation, broadcaster, conv_id, q_id) = setup().await;
        let mut rx = broadcaster.subscribe(&conv_id);

        cancellation.set(&q_id);

        let state = dispatcher
            .dispatch(&conv_id, &q_id, Some(draft("never emitted")))
            .await
            .unwrap();
        assert_eq!(state, JobState::Cancelled);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            StreamEvent::Cancelled { message, .. } => assert!(message.is_none()),
            other => panic!("Expected cancellation terminal, got {:?}", other),
        }

        let answer = store.question(&q_id).await.unwrap().unwrap().answer.unwrap();
        assert!(answer.cancelled);
        assert!(answer.message.is_none());
    }

    #[tokio::test]
    async fn test_missing_answer_broadcasts_null_terminal() {
        let (dispatcher, store, _cancel, broadcaster, conv_id, q_id) = setup().await;
        let mut rx = broadcaster.subscribe(&conv_id);

        let state = dispatcher.dispatch(&conv_id, &q_id, None).await.unwrap();
        assert_eq!(state, JobState::Failed);

        let events = drain(&mut rx);
        assert_eq!(events, vec![StreamEvent::NoAnswer]);

        // The answer record is never touched
        let question = store.question(&q_id).await.unwrap().unwrap();
        assert!(question.answer.is_none());
    }

    #[tokio::test]
    async fn test_late_signal_does_not_corrupt_completed_answer() {
        let (dispatcher, store, cancellation, _broadcaster, conv_id, q_id) = setup().await;

        let state = dispatcher
            .dispatch(&conv_id, &q_id, Some(draft("short answer")))
            .await
            .unwrap();
        assert_eq!(state, JobState::Completed);

        // The benign race: cancellation arrives after the finished event
        cancellation.set(&q_id);

        let answer = store.question(&q_id).await.unwrap().unwrap().answer.unwrap();
        assert!(!answer.cancelled);
        assert_eq!(answer.message.as_deref(), Some("short answer"));
    }
}
