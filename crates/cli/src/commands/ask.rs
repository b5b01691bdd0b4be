//! Ask command handler.
//!
//! Runs a question through the answer pipeline and streams the result to
//! stdout as chunks arrive on the conversation topic.

use clap::Args;
use converse_core::{config::AppConfig, AppError, AppResult};
use converse_pipeline::{
    AnswerPipeline, ConversationStore, HttpSearchClient, InMemoryStore, PipelineConfig,
    StreamEvent,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Ask a question and stream the grounded answer
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: Option<String>,

    /// Read the question from file
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Directory of prompt template overrides
    #[arg(long)]
    pub prompts_dir: Option<PathBuf>,

    /// Output the final answer as JSON (with sources)
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        // 1. Get the question text
        let question_text = self
            .get_question()
            .ok_or_else(|| AppError::Config("No question provided".to_string()))?;

        // 2. Assemble the pipeline tuning from the config file's answer
        //    section, with the active model applied
        let mut pipeline_config = match config.answer.clone() {
            Some(value) => serde_yaml::from_value::<PipelineConfig>(value)
                .map_err(|e| AppError::Config(format!("Invalid answer config: {}", e)))?,
            None => PipelineConfig::default(),
        };
        pipeline_config.model = config.model.clone();

        // 3. Resolve provider endpoint and API key
        let provider_config = config.get_provider_config(&config.provider)?;
        let endpoint = match provider_config {
            Some(converse_core::config::ProviderConfig::Ollama { ref endpoint, .. }) => {
                Some(endpoint.as_str())
            }
            Some(converse_core::config::ProviderConfig::OpenAI { ref endpoint, .. }) => {
                endpoint.as_deref()
            }
            None => None,
        };
        let api_key = config.resolve_api_key(&config.provider)?;

        // 4. Create the collaborators
        let llm = converse_llm::create_client(&config.provider, endpoint, api_key.as_deref())
            .map_err(AppError::Config)?;
        let search = Arc::new(HttpSearchClient::new(&config.search_url));
        let store: Arc<dyn ConversationStore> = Arc::new(InMemoryStore::new());

        let pipeline = AnswerPipeline::new(
            llm,
            search,
            store.clone(),
            pipeline_config,
            self.prompts_dir.as_deref(),
        )?;

        // 5. Ask and stream
        let conversation = store.create_conversation().await?;
        let mut rx = pipeline.subscribe(&conversation.id);

        let question = pipeline.ask(&conversation.id, &question_text).await?;
        tracing::debug!("Question accepted: {}", question.id);

        loop {
            let event = rx
                .recv()
                .await
                .map_err(|e| AppError::Other(format!("Broadcast topic closed: {}", e)))?;

            match event {
                StreamEvent::Chunk {
                    question_id,
                    message,
                } if question_id == question.id => {
                    if !self.json {
                        print!("{}", message);
                        use std::io::Write;
                        std::io::stdout().flush().ok();
                    }
                }
                StreamEvent::Chunk { .. } => continue,
                StreamEvent::Finished { question_id } if question_id == question.id => {
                    if !self.json {
                        println!();
                    }
                    break;
                }
                StreamEvent::Cancelled { question_id, .. } if question_id == question.id => {
                    tracing::warn!("Answer was cancelled mid-stream");
                    if !self.json {
                        println!();
                    }
                    break;
                }
                StreamEvent::NoAnswer => {
                    return Err(AppError::Other(
                        "No answer could be generated for this question".to_string(),
                    ));
                }
                _ => continue,
            }
        }

        // 6. Emit the persisted answer as JSON when requested
        if self.json {
            let answered = store
                .question(&question.id)
                .await?
                .ok_or_else(|| AppError::Other("Question disappeared from store".to_string()))?;

            let answer = answered
                .answer
                .ok_or_else(|| AppError::Other("No answer was persisted".to_string()))?;

            let output = serde_json::json!({
                "question": question_text,
                "rephrasedQuestion": answer.rephrased_question,
                "answer": answer.message,
                "cancelled": answer.cancelled,
                "sources": answer.sources.iter().map(|s| {
                    serde_json::json!({"url": s.url, "title": s.title})
                }).collect::<Vec<_>>(),
            });

            let json = serde_json::to_string_pretty(&output)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
        }

        Ok(())
    }

    /// Get the question text from various sources.
    fn get_question(&self) -> Option<String> {
        self.question.clone().or_else(|| {
            self.file.as_ref().and_then(|path| {
                std::fs::read_to_string(path)
                    .map_err(|e| tracing::error!("Failed to read question file: {}", e))
                    .ok()
                    .map(|s| s.trim().to_string())
            })
        })
    }
}
