//! Main execution: classify a query, then route its tags.
//!
//! Order of precedence for one query:
//! 1. automation tags run first (all of them, concurrently);
//! 2. an image request ends the turn after the handoff is written;
//! 3. any realtime tag answers the merged general+realtime question with a
//!    web search;
//! 4. otherwise the first general / exit tag is answered.

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::automation::{Automation, ContentWriter, Desktop, LinkLookup};
use crate::chatbot::{Chatbot, FAILURE_REPLY};
use crate::chatlog::{default_greeting, ChatLog};
use crate::config::paths::{chat_log_path, handoff_path};
use crate::config::AssistantConfig;
use crate::decision;
use crate::imagegen::{Handoff, WorkerSupervisor};
use crate::ipc::{AssistantEvent, EventSink};
use crate::llm::ChatModel;
use crate::realtime::{RealtimeEngine, WebSearch};
use crate::speech::{speakable_text, SpeechOutput};
use crate::status::{AssistantStatus, StatusMachine};
use crate::text::query_modifier;

/// What one `main_execution` call ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to do (empty query).
    Idle,
    Handled,
    /// The user said goodbye; the process should shut down.
    Exit,
}

/// Collaborators behind trait seams.
pub struct Services {
    pub model: Arc<dyn ChatModel>,
    pub search: Arc<dyn WebSearch>,
    pub desktop: Arc<dyn Desktop>,
    pub lookup: Arc<dyn LinkLookup>,
    pub speaker: Arc<dyn SpeechOutput>,
    pub workers: Arc<WorkerSupervisor>,
    pub sink: Arc<dyn EventSink>,
}

pub struct Assistant {
    status: Arc<StatusMachine>,
    sink: Arc<dyn EventSink>,
    classifier: Arc<dyn ChatModel>,
    decision_model: String,
    log: Arc<ChatLog>,
    chatbot: Chatbot,
    realtime: RealtimeEngine,
    automation: Automation,
    handoff: Handoff,
    workers: Arc<WorkerSupervisor>,
    speaker: Arc<dyn SpeechOutput>,
    user_name: String,
    assistant_name: String,
}

impl Assistant {
    pub fn new(config: &AssistantConfig, data_dir: &Path, services: Services) -> anyhow::Result<Self> {
        let user = config.user_name();
        let assistant = config.assistant_name();
        let log = Arc::new(ChatLog::open(&chat_log_path(data_dir))?);
        let handoff = Handoff::new(handoff_path(data_dir));
        handoff.ensure_initialized()?;

        let writer = Arc::new(ContentWriter::new(
            services.model.clone(),
            config.content_model(),
            data_dir,
            user,
        ));

        Ok(Self {
            status: StatusMachine::new(),
            sink: services.sink,
            classifier: services.model.clone(),
            decision_model: config.decision_model().to_string(),
            chatbot: Chatbot::new(services.model.clone(), config.chat_model(), log.clone(), user, assistant),
            realtime: RealtimeEngine::new(
                services.model,
                config.chat_model(),
                services.search,
                log.clone(),
                user,
                assistant,
                config.search_results(),
            ),
            automation: Automation::new(services.desktop, services.lookup, writer),
            log,
            handoff,
            workers: services.workers,
            speaker: services.speaker,
            user_name: user.to_string(),
            assistant_name: assistant.to_string(),
        })
    }

    pub fn status(&self) -> &Arc<StatusMachine> {
        &self.status
    }

    pub fn workers(&self) -> &Arc<WorkerSupervisor> {
        &self.workers
    }

    fn emit(&self, event: AssistantEvent) {
        self.sink.emit(event);
    }

    fn set_status(&self, status: AssistantStatus) {
        self.status.set(status);
        self.emit(AssistantEvent::Status {
            status: status.label().to_string(),
        });
    }

    fn mic_off(&self) {
        self.status.stop_listening();
        self.emit(AssistantEvent::MicStatus { active: false });
    }

    /// Mic button: flip listening and report the new state.
    pub fn toggle_listening(&self) -> bool {
        let listening = self.status.toggle_listening();
        self.emit(AssistantEvent::MicStatus { active: listening });
        self.emit(AssistantEvent::Status {
            status: self.status.current().label().to_string(),
        });
        listening
    }

    async fn speak(&self, text: &str) {
        self.speaker.speak(&speakable_text(text)).await;
    }

    /// Speak a line supplied by the frontend, bypassing classification.
    pub async fn system_speak(&self, text: &str) {
        if !text.trim().is_empty() {
            self.speak(text).await;
        }
    }

    /// Show the answer, speak it, return to Available.
    async fn deliver(&self, answer: &str, source: &str) {
        self.emit(AssistantEvent::Response {
            text: format!("{} : {}", self.assistant_name, answer),
            source: source.to_string(),
        });
        self.set_status(AssistantStatus::Answering);
        self.speak(answer).await;
    }

    /// Startup: mic off, greeting or history on screen, status Available.
    pub fn initial_execution(&self) -> anyhow::Result<()> {
        self.mic_off();
        let text = if self.log.is_effectively_empty() {
            default_greeting(&self.user_name, &self.assistant_name)
        } else {
            self.log.transcript(&self.user_name, &self.assistant_name)?
        };
        self.emit(AssistantEvent::ChatHistory { text });
        self.set_status(AssistantStatus::Available);
        Ok(())
    }

    pub async fn main_execution(&self, query: &str) -> Outcome {
        let query = query.trim();
        if query.is_empty() {
            self.mic_off();
            self.set_status(AssistantStatus::Available);
            return Outcome::Idle;
        }

        self.mic_off();
        self.emit(AssistantEvent::Transcript {
            text: format!("{} : {}", self.user_name, query),
        });
        self.set_status(AssistantStatus::Thinking);

        let decision = match decision::classify(self.classifier.as_ref(), &self.decision_model, query).await {
            Ok(decision) => decision,
            Err(e) => {
                error!("Classification failed: {}", e);
                self.emit(AssistantEvent::Error {
                    message: format!("Classification failed: {}", e),
                });
                self.set_status(AssistantStatus::Available);
                return Outcome::Handled;
            }
        };
        self.emit(AssistantEvent::Decision {
            tags: decision.tags().to_vec(),
        });

        let image_prompt = decision.image_prompt();

        if decision.has_automation() {
            let outcomes = self.automation.run(&decision).await;
            let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
            info!(tasks = outcomes.len(), failed, "Automation finished");
        }

        if let Some(prompt) = image_prompt {
            self.request_image(&prompt).await;
            self.set_status(AssistantStatus::Available);
            return Outcome::Handled;
        }

        if decision.has_realtime() {
            self.set_status(AssistantStatus::Searching);
            let answer = self.answer_realtime(&decision.merged_query()).await;
            self.deliver(&answer, "realtime").await;
            self.set_status(AssistantStatus::Available);
            return Outcome::Handled;
        }

        for tag in decision.tags() {
            if let Some(rest) = tag.strip_prefix("general") {
                let answer = self.chatbot.ask(&query_modifier(rest)).await;
                self.deliver(&answer, "chatbot").await;
                self.set_status(AssistantStatus::Available);
                return Outcome::Handled;
            } else if tag.starts_with("exit") {
                let answer = self.chatbot.ask(&query_modifier("Okay, Bye!")).await;
                self.deliver(&answer, "chatbot").await;
                self.set_status(AssistantStatus::Available);
                return Outcome::Exit;
            }
        }

        self.set_status(AssistantStatus::Available);
        Outcome::Handled
    }

    async fn answer_realtime(&self, query: &str) -> String {
        match self.realtime.answer(&query_modifier(query)).await {
            Ok(answer) => answer,
            Err(e) => {
                error!("Realtime answer failed: {}", e);
                self.emit(AssistantEvent::Error {
                    message: format!("Search answer failed: {}", e),
                });
                FAILURE_REPLY.to_string()
            }
        }
    }

    async fn request_image(&self, prompt: &str) {
        if let Err(e) = self.handoff.request(prompt) {
            error!("Failed to write image request: {}", e);
            self.emit(AssistantEvent::Error {
                message: format!("Image request failed: {}", e),
            });
            return;
        }
        if let Err(e) = self.workers.ensure_running() {
            warn!("Image worker not started: {}", e);
        }
        self.emit(AssistantEvent::ImageRequested {
            prompt: prompt.to_string(),
        });
        self.speak(&format!("Generating image for {}.", prompt)).await;
    }

    /// Stop workers and announce shutdown.
    pub async fn shutdown(&self) {
        self.status.reset();
        self.workers.kill_all().await;
        self.emit(AssistantEvent::Stopping {});
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::lookup::testing::FixedLookup;
    use crate::automation::testing::RecordingDesktop;
    use crate::ipc::testing::MemorySink;
    use crate::llm::testing::ScriptedModel;
    use crate::llm::ChatMessage;
    use crate::realtime::testing::FixedSearch;
    use crate::speech::testing::RecordingSpeaker;

    struct Fixture {
        _dir: tempfile::TempDir,
        data_dir: std::path::PathBuf,
        model: Arc<ScriptedModel>,
        desktop: Arc<RecordingDesktop>,
        speaker: Arc<RecordingSpeaker>,
        sink: Arc<MemorySink>,
        assistant: Assistant,
    }

    fn fixture(replies: &[&str]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().to_path_buf();
        let model = Arc::new(ScriptedModel::new(replies.iter().copied()));
        let desktop = Arc::new(RecordingDesktop {
            installed: vec!["notepad".into()],
            ..Default::default()
        });
        let speaker = Arc::new(RecordingSpeaker::default());
        let sink = Arc::new(MemorySink::default());
        let config = AssistantConfig {
            user_name: Some("Ada".into()),
            assistant_name: Some("Jarvis".into()),
            ..Default::default()
        };
        let services = Services {
            model: model.clone(),
            search: Arc::new(FixedSearch::hit("Final", "Team A won the final")),
            desktop: desktop.clone(),
            lookup: Arc::new(FixedLookup::default()),
            speaker: speaker.clone(),
            workers: Arc::new(WorkerSupervisor::with_program(None, Vec::new())),
            sink: sink.clone(),
        };
        let assistant = Assistant::new(&config, &data_dir, services).unwrap();
        Fixture {
            _dir: dir,
            data_dir,
            model,
            desktop,
            speaker,
            sink,
            assistant,
        }
    }

    fn labels(statuses: &[AssistantStatus]) -> Vec<String> {
        statuses.iter().map(|s| s.label().to_string()).collect()
    }

    fn responses(sink: &MemorySink) -> Vec<String> {
        sink.events()
            .into_iter()
            .filter_map(|e| match e {
                AssistantEvent::Response { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_empty_query_is_idle() {
        let f = fixture(&[]);
        f.assistant.status().toggle_listening();
        assert_eq!(f.assistant.main_execution("   ").await, Outcome::Idle);
        assert!(!f.assistant.status().is_listening());
        assert_eq!(f.sink.statuses(), labels(&[AssistantStatus::Available]));
        assert!(f.model.requests().is_empty());
    }

    #[tokio::test]
    async fn test_general_query_goes_to_chatbot() {
        let f = fixture(&["general how are you?", "I am fine."]);
        assert_eq!(f.assistant.main_execution("how are you").await, Outcome::Handled);

        assert!(f.sink.events().contains(&AssistantEvent::Transcript {
            text: "Ada : how are you".into()
        }));
        assert_eq!(responses(&f.sink), vec!["Jarvis : I am fine."]);
        assert_eq!(
            f.sink.statuses(),
            labels(&[
                AssistantStatus::Thinking,
                AssistantStatus::Answering,
                AssistantStatus::Available,
            ])
        );
        assert_eq!(f.speaker.spoken(), vec!["I am fine."]);

        let chat_request = &f.model.requests()[1];
        let last = chat_request.messages.last().unwrap();
        assert_eq!(last, &ChatMessage::user("How are you?"));
        assert_eq!(f.assistant.log.load().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_realtime_merges_general_and_realtime_tags() {
        let f = fixture(&["general hello, realtime who won the final", "Team A won."]);
        assert_eq!(f.assistant.main_execution("hello, who won the final").await, Outcome::Handled);

        assert_eq!(responses(&f.sink), vec!["Jarvis : Team A won."]);
        assert_eq!(
            f.sink.statuses(),
            labels(&[
                AssistantStatus::Thinking,
                AssistantStatus::Searching,
                AssistantStatus::Answering,
                AssistantStatus::Available,
            ])
        );
        let search_request = &f.model.requests()[1];
        assert!(search_request.messages[1].content.contains("Team A won the final"));
        assert_eq!(
            search_request.messages.last().unwrap().content,
            "Hello and who won the final?"
        );
    }

    #[tokio::test]
    async fn test_exit_returns_exit() {
        let f = fixture(&["exit", "Goodbye Ada."]);
        assert_eq!(f.assistant.main_execution("bye jarvis").await, Outcome::Exit);
        assert_eq!(f.speaker.spoken(), vec!["Goodbye Ada."]);
    }

    #[tokio::test]
    async fn test_image_request_writes_handoff_and_runs_automation() {
        let f = fixture(&["open notepad, generate image a red fox, general thanks"]);
        assert_eq!(f.assistant.main_execution("open notepad and draw a red fox").await, Outcome::Handled);

        let handoff = std::fs::read_to_string(handoff_path(&f.data_dir)).unwrap();
        assert_eq!(handoff, "a red fox, True");
        assert!(f.desktop.calls().contains(&"launch notepad true".to_string()));
        assert!(f.sink.events().contains(&AssistantEvent::ImageRequested {
            prompt: "a red fox".into()
        }));
        assert_eq!(f.speaker.spoken(), vec!["Generating image for a red fox."]);
        // general tag is not answered once an image was requested
        assert_eq!(f.model.requests().len(), 1);
        assert_eq!(f.assistant.status().current(), AssistantStatus::Available);
    }

    #[tokio::test]
    async fn test_automation_only_query() {
        let f = fixture(&["system mute, open notepad"]);
        assert_eq!(f.assistant.main_execution("mute and open notepad").await, Outcome::Handled);
        let calls = f.desktop.calls();
        assert!(calls.contains(&"key Mute".to_string()));
        assert!(calls.contains(&"launch notepad true".to_string()));
        assert!(responses(&f.sink).is_empty());
        assert_eq!(
            f.sink.statuses(),
            labels(&[AssistantStatus::Thinking, AssistantStatus::Available])
        );
    }

    #[tokio::test]
    async fn test_realtime_failure_replies_and_reports_error() {
        // No reply is scripted for the search answer, so the model call fails.
        let f = fixture(&["realtime who won the final"]);
        assert_eq!(f.assistant.main_execution("who won the final").await, Outcome::Handled);

        assert_eq!(responses(&f.sink), vec![format!("Jarvis : {}", FAILURE_REPLY)]);
        assert!(f
            .sink
            .events()
            .iter()
            .any(|e| matches!(e, AssistantEvent::Error { message } if message.starts_with("Search answer failed"))));
        assert_eq!(f.speaker.spoken(), vec![FAILURE_REPLY.to_string()]);
        assert_eq!(f.assistant.status().current(), AssistantStatus::Available);
    }

    #[tokio::test]
    async fn test_unwritable_handoff_reports_error() {
        let f = fixture(&["generate image a red fox"]);
        let path = handoff_path(&f.data_dir);
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert_eq!(f.assistant.main_execution("draw a red fox").await, Outcome::Handled);

        let events = f.sink.events();
        assert!(events
            .iter()
            .any(|e| matches!(e, AssistantEvent::Error { message } if message.starts_with("Image request failed"))));
        assert!(!events
            .iter()
            .any(|e| matches!(e, AssistantEvent::ImageRequested { .. })));
        assert!(f.speaker.spoken().is_empty());
        assert_eq!(f.assistant.workers().alive(), 0);
        assert_eq!(f.assistant.status().current(), AssistantStatus::Available);
    }

    #[tokio::test]
    async fn test_classifier_failure_reports_error() {
        let f = fixture(&[]);
        assert_eq!(f.assistant.main_execution("hello").await, Outcome::Handled);
        assert!(f
            .sink
            .events()
            .iter()
            .any(|e| matches!(e, AssistantEvent::Error { .. })));
        assert_eq!(f.assistant.status().current(), AssistantStatus::Available);
    }

    #[test]
    fn test_initial_execution_shows_greeting_then_history() {
        let f = fixture(&[]);
        f.assistant.initial_execution().unwrap();
        assert!(f.sink.events().contains(&AssistantEvent::ChatHistory {
            text: default_greeting("Ada", "Jarvis")
        }));

        f.assistant
            .log
            .save(&[ChatMessage::user("Hi"), ChatMessage::assistant("Hello!")])
            .unwrap();
        f.assistant.initial_execution().unwrap();
        assert!(f.sink.events().contains(&AssistantEvent::ChatHistory {
            text: "Ada: Hi\nJarvis: Hello!".into()
        }));
        assert_eq!(f.assistant.status().current(), AssistantStatus::Available);
    }

    #[test]
    fn test_toggle_listening_emits_mic_status() {
        let f = fixture(&[]);
        assert!(f.assistant.toggle_listening());
        assert!(!f.assistant.toggle_listening());
        let mic: Vec<bool> = f
            .sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                AssistantEvent::MicStatus { active } => Some(active),
                _ => None,
            })
            .collect();
        assert_eq!(mic, vec![true, false]);
        assert_eq!(
            f.sink.statuses(),
            labels(&[AssistantStatus::Listening, AssistantStatus::Available])
        );
    }
}
