//! Answer pipeline orchestration.
//!
//! Wires the stages together: question guardrail, rephrasing, retrieval,
//! reranking, composition, optional answer guardrail, and streamed
//! dispatch. Composition and streaming run on a spawned task decoupled from
//! the asking call; the asker gets the question back immediately and
//! subscribes to the conversation topic for incremental output.

use converse_core::{AppError, AppResult};
use converse_llm::LlmClient;
use converse_prompt::{resolve_prompt, templates};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::broadcast::{Broadcaster, StreamEvent};
use crate::cancel::CancellationStore;
use crate::compose::Composer;
use crate::config::PipelineConfig;
use crate::dispatch::StreamingDispatcher;
use crate::guardrail::GuardrailEvaluator;
use crate::models::{build_history, AnswerDraft, GuardrailAudit, Question};
use crate::rephrase::Rephraser;
use crate::rerank::Reranker;
use crate::search::{Retriever, SearchClient};
use crate::store::ConversationStore;

/// The full answer-generation pipeline.
///
/// Cheap to clone; clones share the broadcast hub, cancellation store, and
/// storage boundary. Independent questions may run concurrently; stages
/// within one question run strictly in sequence.
#[derive(Clone)]
pub struct AnswerPipeline {
    store: Arc<dyn ConversationStore>,
    broadcaster: Arc<Broadcaster>,
    cancellation: Arc<CancellationStore>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    guardrail: GuardrailEvaluator,
    rephraser: Rephraser,
    retriever: Retriever,
    reranker: Reranker,
    composer: Composer,
    dispatcher: StreamingDispatcher,
    config: PipelineConfig,
}

impl AnswerPipeline {
    /// Build a pipeline over the given collaborators.
    ///
    /// Prompt definitions resolve from `prompts_dir` overrides when
    /// present, falling back to the built-in templates.
    pub fn new(
        llm: Arc<dyn LlmClient>,
        search: Arc<dyn SearchClient>,
        store: Arc<dyn ConversationStore>,
        config: PipelineConfig,
        prompts_dir: Option<&Path>,
    ) -> AppResult<Self> {
        let guardrail_def = resolve_prompt(prompts_dir, templates::guardrail_prompt())?;
        let rephrase_def = resolve_prompt(prompts_dir, templates::rephrase_prompt())?;
        let compose_def = resolve_prompt(prompts_dir, templates::compose_prompt())?;

        let broadcaster = Arc::new(Broadcaster::new());
        let cancellation = Arc::new(CancellationStore::new());

        let guardrail = GuardrailEvaluator::new(
            llm.clone(),
            guardrail_def,
            config.guardrail.clone(),
            &config.model,
        );
        let rephraser = Rephraser::new(llm.clone(), rephrase_def, &config.model);
        let retriever = Retriever::new(search);
        let reranker = Reranker::new(config.rerank.clone());
        let composer = Composer::new(llm, compose_def, config.compose.clone(), &config.model);
        let dispatcher = StreamingDispatcher::new(
            broadcaster.clone(),
            cancellation.clone(),
            store.clone(),
            Duration::from_millis(config.streaming.chunk_delay_ms),
        );

        Ok(Self {
            store,
            broadcaster,
            cancellation,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            guardrail,
            rephraser,
            retriever,
            reranker,
            composer,
            dispatcher,
            config,
        })
    }

    /// The storage boundary this pipeline writes through.
    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Subscribe to a conversation's event topic.
    pub fn subscribe(&self, conversation_id: &str) -> broadcast::Receiver<StreamEvent> {
        self.broadcaster.subscribe(conversation_id)
    }

    /// Ask a question.
    ///
    /// Persists the question, spawns the composition and dispatch job in
    /// the background, and returns immediately. Incremental output arrives
    /// on the conversation topic.
    pub async fn ask(&self, conversation_id: &str, message: &str) -> AppResult<Question> {
        let question = self.store.add_question(conversation_id, message).await?;

        self.in_flight
            .lock()
            .unwrap()
            .insert(question.id.clone());

        tracing::info!(
            "Accepted question {} on conversation {}",
            question.id,
            conversation_id
        );

        let pipeline = self.clone();
        let spawned = question.clone();
        tokio::spawn(async move {
            pipeline.run_question(spawned).await;
        });

        Ok(question)
    }

    /// Request cancellation of an in-flight question.
    ///
    /// Sets the time-limited cancellation signal that the dispatch job
    /// polls between chunks. A request naming a question with no job in
    /// flight is logged and otherwise ignored; it never creates or mutates
    /// an answer.
    pub fn cancel(&self, question_id: &str) -> bool {
        if self.in_flight.lock().unwrap().contains(question_id) {
            self.cancellation.set(question_id);
            true
        } else {
            tracing::warn!(
                "Cancellation requested for question {} with no job in flight; ignoring",
                question_id
            );
            false
        }
    }

    /// Background job: generate, then stream.
    async fn run_question(&self, question: Question) {
        let draft = match self.generate(&question).await {
            Ok(draft) => Some(draft),
            Err(e) => {
                tracing::error!(
                    "Answer generation failed for question {}: {}",
                    question.id,
                    e
                );
                None
            }
        };

        if let Err(e) = self
            .dispatcher
            .dispatch(&question.conversation_id, &question.id, draft)
            .await
        {
            tracing::error!("Dispatch failed for question {}: {}", question.id, e);
        }

        self.in_flight.lock().unwrap().remove(&question.id);
    }

    /// Run the generation stages for one question.
    async fn generate(&self, question: &Question) -> AppResult<AnswerDraft> {
        let mut guardrails = GuardrailAudit::default();

        // Question guardrail always runs first
        let question_check = self
            .guardrail
            .evaluate(&question.message)
            .await
            .map_err(AppError::from)?;
        let refused = question_check.triggered;
        guardrails.question = Some(question_check);

        if refused {
            tracing::warn!("Question guardrail triggered for {}", question.id);
            return Ok(AnswerDraft {
                message: self.config.compose.refusal_message.clone(),
                rephrased_question: None,
                sources: Vec::new(),
                guardrails,
            });
        }

        // History is rebuilt from the conversation's answered questions
        let prior: Vec<Question> = self
            .store
            .questions(&question.conversation_id)
            .await?
            .into_iter()
            .filter(|q| q.id != question.id)
            .collect();
        let history = build_history(&prior);

        let rephrased = self
            .rephraser
            .rephrase(&question.message, &history)
            .await?;

        let chunks = self.retriever.retrieve(&rephrased.text).await?;
        let result_set = self.reranker.rerank(chunks);

        let composed = self
            .composer
            .compose(&rephrased.text, &result_set, &history)
            .await?;

        let mut message = composed.message;
        let mut sources = composed.sources;

        if self.config.answer_guardrail_enabled {
            let answer_check = self
                .guardrail
                .evaluate(&message)
                .await
                .map_err(AppError::from)?;
            let blocked = answer_check.triggered;
            guardrails.answer = Some(answer_check);

            if blocked {
                tracing::warn!("Answer guardrail triggered for {}", question.id);
                message = self.config.compose.fallback_message.clone();
                sources = Vec::new();
            }
        }

        Ok(AnswerDraft {
            message,
            rephrased_question: Some(rephrased.text),
            sources,
            guardrails,
        })
    }
}
