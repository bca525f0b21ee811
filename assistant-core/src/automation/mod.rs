//! Local automation: turns decision tags into desktop side effects.
//!
//! Each automation tag becomes a [`Task`]; all tasks of one decision run
//! concurrently and failures are reported per task, never propagated.

pub mod content;
pub mod desktop;
pub mod lookup;

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{info, warn};

use crate::decision::Decision;

pub use content::ContentWriter;
pub use desktop::{Desktop, MediaKey, SystemDesktop};
pub use lookup::LinkLookup;

/// One automation step parsed from a decision tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    Open(String),
    Close(String),
    Play(String),
    Content(String),
    GoogleSearch(String),
    YoutubeSearch(String),
    System(String),
}

/// What `Task::parse` made of a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    Task(Task),
    /// Answered elsewhere (general / realtime / image / exit).
    Skip,
    Unknown,
}

impl Task {
    pub fn parse(tag: &str) -> Parsed {
        let cmd = tag.trim().to_lowercase();
        let rest = |prefix: &str| cmd[prefix.len()..].trim().to_string();

        if cmd.starts_with("open ") {
            Parsed::Task(Task::Open(rest("open ")))
        } else if cmd.starts_with("close") {
            Parsed::Task(Task::Close(rest("close")))
        } else if cmd.starts_with("play") {
            Parsed::Task(Task::Play(rest("play")))
        } else if cmd.starts_with("content") {
            Parsed::Task(Task::Content(rest("content")))
        } else if cmd.starts_with("google search") {
            Parsed::Task(Task::GoogleSearch(rest("google search")))
        } else if cmd.starts_with("youtube search") {
            Parsed::Task(Task::YoutubeSearch(rest("youtube search")))
        } else if cmd.starts_with("system") {
            Parsed::Task(Task::System(rest("system")))
        } else if ["general", "realtime", "generate image", "exit", "reminder"]
            .iter()
            .any(|p| cmd.starts_with(p))
        {
            Parsed::Skip
        } else {
            Parsed::Unknown
        }
    }
}

/// Per-task result.
#[derive(Debug)]
pub struct TaskOutcome {
    pub task: Task,
    pub result: anyhow::Result<()>,
}

pub fn google_search_url(query: &str) -> String {
    url::Url::parse_with_params("https://www.google.com/search", &[("q", query)])
        .map(String::from)
        .unwrap_or_else(|_| format!("https://www.google.com/search?q={}", query))
}

pub fn youtube_search_url(query: &str) -> String {
    url::Url::parse_with_params("https://www.youtube.com/results", &[("search_query", query)])
        .map(String::from)
        .unwrap_or_else(|_| format!("https://www.youtube.com/results?search_query={}", query))
}

/// Map a `system` argument to a key press. Unknown commands are ignored.
pub fn system_key(command: &str) -> Option<MediaKey> {
    match command.trim() {
        "mute" | "unmute" => Some(MediaKey::Mute),
        "volume up" => Some(MediaKey::VolumeUp),
        "volume down" => Some(MediaKey::VolumeDown),
        _ => None,
    }
}

pub struct Automation {
    desktop: Arc<dyn Desktop>,
    lookup: Arc<dyn LinkLookup>,
    writer: Arc<ContentWriter>,
}

impl Automation {
    pub fn new(
        desktop: Arc<dyn Desktop>,
        lookup: Arc<dyn LinkLookup>,
        writer: Arc<ContentWriter>,
    ) -> Self {
        Self {
            desktop,
            lookup,
            writer,
        }
    }

    /// Run every automation tag of the decision concurrently.
    pub async fn run(&self, decision: &Decision) -> Vec<TaskOutcome> {
        let mut tasks = Vec::new();
        for tag in decision.tags() {
            match Task::parse(tag) {
                Parsed::Task(task) => tasks.push(task),
                Parsed::Skip => {}
                Parsed::Unknown => warn!(tag = %tag, "No function found for tag"),
            }
        }

        let outcomes = join_all(tasks.into_iter().map(|task| async move {
            let result = self.execute(&task).await;
            TaskOutcome { task, result }
        }))
        .await;

        for outcome in &outcomes {
            match &outcome.result {
                Ok(()) => info!(task = ?outcome.task, "Task done"),
                Err(e) => warn!(task = ?outcome.task, "Task failed: {}", e),
            }
        }
        outcomes
    }

    pub async fn execute(&self, task: &Task) -> anyhow::Result<()> {
        match task {
            Task::Open(app) => self.open_app(app).await,
            Task::Close(app) => {
                let app = app.clone();
                let closed = self.blocking(move |d| d.close_app(&app)).await?;
                if !closed {
                    anyhow::bail!("No running application matched");
                }
                Ok(())
            }
            Task::Play(query) => {
                let url = match self.lookup.first_youtube_video(query).await {
                    Ok(Some(url)) => url,
                    Ok(None) => youtube_search_url(query),
                    Err(e) => {
                        warn!("YouTube lookup failed, opening results page: {}", e);
                        youtube_search_url(query)
                    }
                };
                self.blocking(move |d| d.open_url(&url)).await
            }
            Task::Content(topic) => {
                let path = self.writer.write(topic).await?;
                self.blocking(move |d| d.open_file(&path)).await
            }
            Task::GoogleSearch(query) => {
                let url = google_search_url(query);
                self.blocking(move |d| d.open_url(&url)).await
            }
            Task::YoutubeSearch(query) => {
                let url = youtube_search_url(query);
                self.blocking(move |d| d.open_url(&url)).await
            }
            Task::System(command) => match system_key(command) {
                Some(key) => self.blocking(move |d| d.press_media_key(key)).await,
                None => {
                    warn!(command = %command, "Unknown system command ignored");
                    Ok(())
                }
            },
        }
    }

    /// Launch the app; otherwise fall back to the web.
    async fn open_app(&self, app: &str) -> anyhow::Result<()> {
        let name = app.to_string();
        if self.blocking(move |d| d.launch_app(&name)).await? {
            return Ok(());
        }

        let url = if app.contains("youtube") {
            "https://www.youtube.com".to_string()
        } else {
            match self.lookup.first_web_result(app).await {
                Ok(Some(url)) => url,
                Ok(None) => google_search_url(app),
                Err(e) => {
                    warn!("Web lookup for {} failed: {}", app, e);
                    google_search_url(app)
                }
            }
        };
        self.blocking(move |d| d.open_url(&url)).await
    }

    async fn blocking<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Desktop) -> anyhow::Result<T> + Send + 'static,
    {
        let desktop = self.desktop.clone();
        tokio::task::spawn_blocking(move || f(desktop.as_ref()))
            .await
            .map_err(|e| anyhow::anyhow!("Desktop task panicked: {}", e))?
    }
}
