//! Chat-completion models.
//!
//! Provides a common `ChatModel` trait used by the classifier, the chatbot,
//! the realtime search engine and the content writer, with one
//! implementation for Groq's OpenAI-compatible streaming endpoint.

pub mod groq;

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

pub use groq::GroqClient;

/// One chat turn, in the shape both the API and `ChatLog.json` use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Parameters for one completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl CompletionRequest {
    pub fn new(model: &str, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.to_string(),
            messages,
            max_tokens: 1024,
            temperature: 0.7,
            top_p: 1.0,
        }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Common trait for completion backends (dyn-compatible).
pub trait ChatModel: Send + Sync {
    /// Run the completion and return the full answer text.
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>>;

    /// Display name, e.g. "Groq".
    fn name(&self) -> String;
}

/// Remove end-of-sequence markers some models leak into the text.
pub fn clean_completion(text: &str) -> String {
    text.replace("</s>", "")
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted model used by the unit tests of the modules built on `ChatModel`.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Replies from a queue and records every request.
    #[derive(Default)]
    pub struct ScriptedModel {
        replies: Mutex<VecDeque<anyhow::Result<String>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedModel {
        pub fn new<I, S>(replies: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn push_error(&self, message: &str) {
            self.replies
                .lock()
                .unwrap()
                .push_back(Err(anyhow::anyhow!(message.to_string())));
        }

        pub fn push_reply(&self, reply: &str) {
            self.replies.lock().unwrap().push_back(Ok(reply.to_string()));
        }

        pub fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl ChatModel for ScriptedModel {
        fn complete(
            &self,
            request: CompletionRequest,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>> {
            Box::pin(async move {
                self.requests.lock().unwrap().push(request);
                self.replies
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted reply left")))
            })
        }

        fn name(&self) -> String {
            "scripted".to_string()
        }
    }
}
