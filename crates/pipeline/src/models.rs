//! Conversation domain model.
//!
//! Conversations own an ordered sequence of questions; each question gets at
//! most one answer, produced asynchronously by the pipeline. The durable
//! home of these records is behind the `store` boundary; the pipeline only
//! mutates them through it.

use chrono::{DateTime, Utc};
use converse_prompt::Turn;
use serde::{Deserialize, Serialize};

use crate::guardrail::GuardrailResult;

/// A conversation: an ordered sequence of questions under one opaque id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

/// A user question within a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub conversation_id: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub answer: Option<Answer>,
}

/// A cited source on an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
}

/// Guardrail results attached to an answer for audit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardrailAudit {
    pub question: Option<GuardrailResult>,
    pub answer: Option<GuardrailResult>,
}

/// The generated answer for a question.
///
/// An answer is either fully composed (`message` present, `cancelled`
/// false) or cancelled (`cancelled` true, `message` holds the partial text
/// emitted before the signal, or nothing). Never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub message: Option<String>,
    pub rephrased_question: Option<String>,
    pub sources: Vec<Source>,
    pub cancelled: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guardrails: Option<GuardrailAudit>,
}

impl Answer {
    /// Create a fully composed answer.
    pub fn completed(
        message: String,
        rephrased_question: Option<String>,
        sources: Vec<Source>,
        guardrails: Option<GuardrailAudit>,
    ) -> Self {
        Self {
            message: Some(message),
            rephrased_question,
            sources,
            cancelled: false,
            created_at: Utc::now(),
            guardrails,
        }
    }

    /// Create a cancelled answer holding the partial text emitted so far.
    pub fn cancelled(
        partial_message: Option<String>,
        rephrased_question: Option<String>,
    ) -> Self {
        Self {
            message: partial_message,
            rephrased_question,
            sources: Vec::new(),
            cancelled: true,
            created_at: Utc::now(),
            guardrails: None,
        }
    }
}

/// Everything the pipeline produced for a question, ready for dispatch.
///
/// The dispatcher turns this into the persisted `Answer`: completed when
/// streaming runs to the end, cancelled with the emitted prefix otherwise.
#[derive(Debug, Clone)]
pub struct AnswerDraft {
    pub message: String,
    pub rephrased_question: Option<String>,
    pub sources: Vec<Source>,
    pub guardrails: GuardrailAudit,
}

/// Build prompt history from a conversation's answered questions.
///
/// Turns are ordered oldest first, most recent last. A question whose
/// answer carries a rephrased form contributes the rephrased text as the
/// user turn, so later rephrasings compound on earlier ones.
pub fn build_history(questions: &[Question]) -> Vec<Turn> {
    let mut turns = Vec::new();

    for question in questions {
        let answer = match question.answer {
            Some(ref answer) => answer,
            None => continue,
        };

        let answer_message = match answer.message {
            Some(ref message) => message,
            None => continue,
        };

        let user_text = answer
            .rephrased_question
            .clone()
            .unwrap_or_else(|| question.message.clone());

        turns.push(Turn::user(user_text));
        turns.push(Turn::assistant(answer_message.clone()));
    }

    turns
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(message: &str, answer: Option<Answer>) -> Question {
        Question {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: "conv-1".to_string(),
            message: message.to_string(),
            created_at: Utc::now(),
            answer,
        }
    }

    #[test]
    fn test_completed_answer_invariant() {
        let answer = Answer::completed("Pay online.".to_string(), None, Vec::new(), None);
        assert!(answer.message.is_some());
        assert!(!answer.cancelled);
    }

    #[test]
    fn test_cancelled_answer_invariant() {
        let answer = Answer::cancelled(Some("Pay ".to_string()), None);
        assert!(answer.cancelled);
        assert_eq!(answer.message.as_deref(), Some("Pay "));

        let empty = Answer::cancelled(None, None);
        assert!(empty.cancelled);
        assert!(empty.message.is_none());
    }

    #[test]
    fn test_history_skips_unanswered_questions() {
        let questions = vec![
            question(
                "How do I pay my tax",
                Some(Answer::completed(
                    "What type of tax".to_string(),
                    None,
                    Vec::new(),
                    None,
                )),
            ),
            question("pending question", None),
        ];

        let turns = build_history(&questions);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0], Turn::user("How do I pay my tax"));
        assert_eq!(turns[1], Turn::assistant("What type of tax"));
    }

    #[test]
    fn test_history_prefers_rephrased_question() {
        let questions = vec![question(
            "corporation tax",
            Some(Answer::completed(
                "Use the online service.".to_string(),
                Some("How do I pay my corporation tax".to_string()),
                Vec::new(),
                None,
            )),
        )];

        let turns = build_history(&questions);
        assert_eq!(turns[0], Turn::user("How do I pay my corporation tax"));
    }
}
