//! Conversational answers backed by the persisted chat history.

use std::sync::Arc;

use chrono::Local;
use tracing::{error, warn};

use crate::chatlog::ChatLog;
use crate::llm::{ChatMessage, ChatModel, CompletionRequest};
use crate::text::{answer_modifier, realtime_information};

pub const FAILURE_REPLY: &str = "An error occurred. Please try again.";

/// System persona shared by the chatbot and the realtime engine.
pub fn persona(user_name: &str, assistant_name: &str) -> String {
    format!(
        "Hello, I am {user_name}, You are a very accurate and advanced AI chatbot named {assistant_name} which also has real-time up-to-date information from the internet.\n\
         *** Do not tell time until I ask, do not talk too much, just answer the question.***\n\
         *** Reply in only English, even if the question is in Hindi, reply in English.***\n\
         *** Do not provide notes in the output, just answer the question and never mention your training data. ***"
    )
}

pub struct Chatbot {
    model: Arc<dyn ChatModel>,
    model_name: String,
    log: Arc<ChatLog>,
    system: String,
}

impl Chatbot {
    pub fn new(
        model: Arc<dyn ChatModel>,
        model_name: &str,
        log: Arc<ChatLog>,
        user_name: &str,
        assistant_name: &str,
    ) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            log,
            system: persona(user_name, assistant_name),
        }
    }

    /// Answer a query. On failure the history is cleared and the call
    /// retried once; a second failure yields [`FAILURE_REPLY`].
    pub async fn ask(&self, query: &str) -> String {
        match self.try_ask(query).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Chatbot failed ({}), resetting history and retrying", e);
                if let Err(e) = self.log.reset() {
                    error!("Failed to reset chat log: {}", e);
                }
                match self.try_ask(query).await {
                    Ok(answer) => answer,
                    Err(e) => {
                        error!("Chatbot retry failed: {}", e);
                        FAILURE_REPLY.to_string()
                    }
                }
            }
        }
    }

    async fn try_ask(&self, query: &str) -> anyhow::Result<String> {
        let mut history = self.log.load()?;
        history.push(ChatMessage::user(query));

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(self.system.clone()));
        messages.push(ChatMessage::system(realtime_information(&Local::now())));
        messages.extend(history.iter().cloned());

        let request = CompletionRequest::new(&self.model_name, messages);
        let answer = self.model.complete(request).await?;

        history.push(ChatMessage::assistant(answer.clone()));
        self.log.save(&history)?;

        Ok(answer_modifier(&answer))
    }
}
