// Conversational orchestration
// Retrieves policy fragments, prompts the chat model with them and formats the reply

pub mod completion;
pub mod formatter;
pub mod history;


use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::database::VectorIndex;
use crate::documents::Fragment;
use completion::{ChatModel, ChatRequest, CompletionError};
use formatter::{AnswerStyle, format_answer};
use history::{ChatTurn, Role, recent_turns};

pub use completion::ChatClient;
pub use history::ChatHistory;

const GROUNDING_RULES: &str = "Keep answers concise and grounded in the provided context. \
If you don't know, say 'I don't know'. Do not make up facts.";

/// Source of fragments relevant to a question
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize) -> crate::Result<Vec<Fragment>>;
}

#[async_trait]
impl Retriever for VectorIndex {
    async fn retrieve(&self, query: &str, k: usize) -> crate::Result<Vec<Fragment>> {
        Ok(self
            .similarity_search(query, k)
            .await?
            .into_iter()
            .map(|scored| scored.fragment)
            .collect())
    }
}

/// Reply to one question together with the fragments it was grounded on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<Fragment>,
}

/// Answers questions from retrieved context. Never fails: problems end up
/// in the answer text.
pub struct Assistant<'a> {
    retriever: &'a dyn Retriever,
    model: &'a dyn ChatModel,
    chat_model: String,
    top_k: usize,
    max_turns: usize,
    max_tokens: u32,
    temperature: f32,
    style: AnswerStyle,
}

impl<'a> Assistant<'a> {
    #[inline]
    pub fn new(config: &Config, retriever: &'a dyn Retriever, model: &'a dyn ChatModel) -> Self {
        Self {
            retriever,
            model,
            chat_model: config.inference.chat_model.clone(),
            top_k: config.retrieval.top_k,
            max_turns: config.history.max_turns,
            max_tokens: config.answer.max_tokens,
            temperature: config.answer.temperature,
            style: config.answer.style,
        }
    }

    #[inline]
    pub async fn answer(&self, query: &str, history: &[ChatTurn]) -> Answer {
        let sources = match self.retriever.retrieve(query, self.top_k).await {
            Ok(fragments) => fragments,
            Err(e) => {
                warn!(reason = %e, "Retrieval failed, answering without context");
                Vec::new()
            }
        };
        debug!("Retrieved {} fragments for query", sources.len());

        let request = self.build_request(query, &sources, history);

        let text = match self.model.complete(&request).await {
            Ok(raw) => format_answer(&raw, self.style),
            Err(CompletionError::MissingToken) => {
                warn!("Chat model has no API token");
                CompletionError::MissingToken.to_string()
            }
            Err(e) => {
                warn!(reason = %e, "Chat completion failed");
                format!("Connection Error: {}", e)
            }
        };

        info!("Answered query with {} sources", sources.len());
        Answer { text, sources }
    }

    fn build_request(&self, query: &str, sources: &[Fragment], history: &[ChatTurn]) -> ChatRequest {
        let context = sources
            .iter()
            .map(|fragment| fragment.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut messages = Vec::with_capacity(2 + 2 * self.max_turns);
        messages.push(ChatTurn {
            role: Role::System,
            content: system_instruction(self.style, &context),
        });
        messages.extend(recent_turns(history, self.max_turns));
        messages.push(ChatTurn::user(query));

        ChatRequest {
            model: self.chat_model.clone(),
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

/// Instruction binding the model to `context`, worded for the display style.
#[inline]
pub fn system_instruction(style: AnswerStyle, context: &str) -> String {
    let layout = match style {
        AnswerStyle::Prose => {
            "Write in clear paragraphs. Only use numbered lists (1. 2. 3.) when absolutely necessary \
for step-by-step instructions. DO NOT use bullet points or dashes. Avoid any sub-bullets or nested formatting."
        }
        AnswerStyle::Bulleted => {
            "Use short bullet points starting with '- ' when listing several rules or steps. \
Avoid nested lists."
        }
    };

    format!(
        "You are a helpful assistant providing clear, professional answers about company policies. \
{layout} {GROUNDING_RULES}\n\nContext:\n{context}"
    )
}
