//! Persisted chat history (`ChatLog.json`).
//!
//! A plain JSON array of `{"role": ..., "content": ...}` objects shared by
//! the chatbot and the realtime search engine.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::llm::ChatMessage;
use crate::text::answer_modifier;

pub struct ChatLog {
    path: PathBuf,
}

impl ChatLog {
    /// Open the log, creating the file as `[]` when missing.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let log = Self {
            path: path.to_path_buf(),
        };
        if !log.path.exists() {
            log.save(&[])?;
            info!(path = %log.path.display(), "Created empty chat log");
        }
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all messages. A missing or unreadable log is reset to empty.
    pub fn load(&self) -> anyhow::Result<Vec<ChatMessage>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(messages) => Ok(messages),
                Err(e) => {
                    warn!("Chat log is corrupt ({}), resetting", e);
                    self.reset()?;
                    Ok(Vec::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.reset()?;
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Atomic write: write to a temp file in the same directory, then rename.
    pub fn save(&self, messages: &[ChatMessage]) -> anyhow::Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;
        let tmp = dir.join(format!(".chatlog.{}.tmp", std::process::id()));
        let json = serde_json::to_string_pretty(messages)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn reset(&self) -> anyhow::Result<()> {
        self.save(&[])
    }

    /// True when the file holds (almost) nothing, i.e. `[]`.
    pub fn is_effectively_empty(&self) -> bool {
        std::fs::read_to_string(&self.path)
            .map(|s| s.trim().len() < 5)
            .unwrap_or(true)
    }

    /// Render the history for the chat screen with real names.
    pub fn transcript(&self, user_name: &str, assistant_name: &str) -> anyhow::Result<String> {
        let messages = self.load()?;
        Ok(format_transcript(&messages, user_name, assistant_name))
    }
}

/// `"<User>: ...\n<Assistant>: ..."`, blank lines removed.
pub fn format_transcript(messages: &[ChatMessage], user_name: &str, assistant_name: &str) -> String {
    let mut out = String::new();
    for msg in messages {
        let who = match msg.role.as_str() {
            "user" => user_name,
            "assistant" => assistant_name,
            _ => continue,
        };
        out.push_str(who);
        out.push_str(": ");
        out.push_str(&msg.content);
        out.push('\n');
    }
    answer_modifier(&out)
}

/// Opening lines shown when there is no history yet.
pub fn default_greeting(user_name: &str, assistant_name: &str) -> String {
    format!(
        "{user} : Hello {assistant}, How are you?\n\
         {assistant} : Welcome {user}. I am doing well. How may I help you?",
        user = user_name,
        assistant = assistant_name,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Data").join("ChatLog.json");
        let log = ChatLog::open(&path).unwrap();
        assert!(path.exists());
        assert!(log.load().unwrap().is_empty());
        assert!(log.is_effectively_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let log = ChatLog::open(&dir.path().join("ChatLog.json")).unwrap();
        let msgs = vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")];
        log.save(&msgs).unwrap();
        assert_eq!(log.load().unwrap(), msgs);
        assert!(!log.is_effectively_empty());
    }

    #[test]
    fn test_corrupt_log_resets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ChatLog.json");
        std::fs::write(&path, "[{\"role\": ").unwrap();
        let log = ChatLog::open(&path).unwrap();
        assert!(log.load().unwrap().is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "[]");
    }

    #[test]
    fn test_transcript_uses_names() {
        let msgs = vec![
            ChatMessage::system("ignored"),
            ChatMessage::user("what time is it"),
            ChatMessage::assistant("It is noon.\n\n"),
        ];
        assert_eq!(
            format_transcript(&msgs, "Ada", "Jarvis"),
            "Ada: what time is it\nJarvis: It is noon."
        );
    }

    #[test]
    fn test_default_greeting() {
        let text = default_greeting("Ada", "Jarvis");
        assert!(text.starts_with("Ada : Hello Jarvis"));
        assert!(text.ends_with("How may I help you?"));
    }
}
