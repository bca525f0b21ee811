//! AI content writer: letters, essays, code, saved as a text file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::llm::{ChatMessage, ChatModel, CompletionRequest};
use crate::text::content_filename;

pub struct ContentWriter {
    model: Arc<dyn ChatModel>,
    model_name: String,
    output_dir: PathBuf,
    system: String,
    /// Conversation kept for the lifetime of the process so follow-up
    /// requests can refer to earlier pieces.
    history: Mutex<Vec<ChatMessage>>,
}

impl ContentWriter {
    pub fn new(model: Arc<dyn ChatModel>, model_name: &str, output_dir: &Path, user_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            output_dir: output_dir.to_path_buf(),
            system: format!("Hello, I am {}, You're a content writer.", user_name),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Generate content for `topic` and save it. Returns the file path.
    pub async fn write(&self, topic: &str) -> anyhow::Result<PathBuf> {
        let topic = topic.trim();
        let topic = topic
            .strip_prefix("content ")
            .map(str::trim)
            .unwrap_or(topic);
        if topic.is_empty() {
            anyhow::bail!("Content request has no topic");
        }

        let text = {
            let mut history = self.history.lock().await;
            history.push(ChatMessage::user(topic));

            let mut messages = Vec::with_capacity(history.len() + 1);
            messages.push(ChatMessage::system(self.system.clone()));
            messages.extend(history.iter().cloned());

            let request = CompletionRequest::new(&self.model_name, messages).max_tokens(2048);
            let answer = match self.model.complete(request).await {
                Ok(answer) => answer,
                Err(e) => {
                    history.pop();
                    return Err(e);
                }
            };
            let answer = crate::llm::clean_completion(&answer);
            history.push(ChatMessage::assistant(answer.clone()));
            answer
        };

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(content_filename(topic));
        tokio::fs::write(&path, &text).await?;
        info!(path = %path.display(), chars = text.len(), "Content written");
        Ok(path)
    }
}
