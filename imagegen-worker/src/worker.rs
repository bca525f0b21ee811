//! Handoff polling loop.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{error, info, warn};

use assistant_core::automation::Desktop;
use assistant_core::imagegen::{Handoff, HandoffError};

use crate::generator::{save_images, Generator};

/// Result of one poll, deciding how long to sleep before the next.
#[derive(Debug, PartialEq, Eq)]
pub enum Tick {
    Idle,
    /// File was blank and got re-initialized.
    Reinitialized,
    /// Unparseable content was reset.
    Recovered,
    /// File did not exist and was created.
    Created,
    /// A pending request was processed; number of images saved.
    Generated(usize),
    /// A pending request was taken but generating or saving failed.
    GenerationFailed,
    Failed,
}

impl Tick {
    pub fn delay(&self) -> Duration {
        match self {
            Tick::Idle | Tick::Reinitialized => Duration::from_secs(1),
            Tick::Generated(_) => Duration::from_millis(500),
            Tick::Recovered | Tick::Created | Tick::GenerationFailed | Tick::Failed => Duration::from_secs(5),
        }
    }

    /// Whether this poll took a pending request off the handoff file.
    pub fn consumed_request(&self) -> bool {
        matches!(self, Tick::Generated(_) | Tick::GenerationFailed)
    }
}

pub struct Worker {
    handoff: Handoff,
    generator: Generator,
    desktop: Box<dyn Desktop>,
    output_dir: PathBuf,
    open_pause: Duration,
}

impl Worker {
    pub fn new(handoff: Handoff, generator: Generator, desktop: Box<dyn Desktop>, output_dir: PathBuf) -> Self {
        Self {
            handoff,
            generator,
            desktop,
            output_dir,
            open_pause: Duration::from_secs(1),
        }
    }

    pub fn with_open_pause(mut self, pause: Duration) -> Self {
        self.open_pause = pause;
        self
    }

    pub async fn poll_once(&self) -> Tick {
        match self.handoff.read() {
            Ok(request) if request.pending => {
                // Claim first; a request written during generation stays pending.
                if let Err(e) = self.handoff.reset() {
                    error!("Failed to clear handoff request: {}", e);
                    return Tick::Failed;
                }
                match self.process(&request.prompt).await {
                    Ok(saved) => Tick::Generated(saved),
                    Err(e) => {
                        error!("Image generation failed: {}", e);
                        Tick::GenerationFailed
                    }
                }
            }
            Ok(_) => Tick::Idle,
            Err(HandoffError::Empty) => {
                warn!("Handoff file empty, re-initializing");
                self.reset_or(Tick::Reinitialized)
            }
            Err(HandoffError::Malformed(content)) => {
                warn!(content = %content, "Malformed handoff content, resetting");
                self.reset_or(Tick::Recovered)
            }
            Err(HandoffError::Missing) => {
                warn!(path = %self.handoff.path().display(), "Handoff file missing, creating");
                self.reset_or(Tick::Created)
            }
            Err(e) => {
                error!("Failed to read handoff file: {}", e);
                Tick::Failed
            }
        }
    }

    fn reset_or(&self, tick: Tick) -> Tick {
        match self.handoff.reset() {
            Ok(()) => tick,
            Err(e) => {
                error!("Failed to reset handoff file: {}", e);
                Tick::Failed
            }
        }
    }

    async fn process(&self, prompt: &str) -> anyhow::Result<usize> {
        info!(prompt = %prompt, "Generating images");
        let images = self.generator.generate(prompt).await;
        let saved = save_images(&self.output_dir, prompt, &images)?;

        for path in &saved {
            if let Err(e) = self.desktop.open_file(path) {
                warn!(path = %path.display(), "Failed to open image: {}", e);
            }
            tokio::time::sleep(self.open_pause).await;
        }
        info!(saved = saved.len(), "Image request done");
        Ok(saved.len())
    }

    /// Poll until a request has been processed (`once`) or forever.
    pub async fn run(&self, once: bool) {
        loop {
            let tick = self.poll_once().await;
            if once && tick.consumed_request() {
                return;
            }
            tokio::time::sleep(tick.delay()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use assistant_core::automation::MediaKey;
    use assistant_core::imagegen::IDLE_CONTENT;

    use super::*;
    use crate::generator::testing::{serve, Hook};

    #[derive(Default, Clone)]
    struct OpenedFiles(Arc<Mutex<Vec<PathBuf>>>);

    impl Desktop for OpenedFiles {
        fn open_url(&self, _url: &str) -> anyhow::Result<()> {
            Ok(())
        }
        fn open_file(&self, path: &Path) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
        fn launch_app(&self, _name: &str) -> anyhow::Result<bool> {
            Ok(false)
        }
        fn close_app(&self, _name: &str) -> anyhow::Result<bool> {
            Ok(false)
        }
        fn press_media_key(&self, _key: MediaKey) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn worker(dir: &Path) -> (Worker, OpenedFiles) {
        let opened = OpenedFiles::default();
        let handoff = Handoff::new(dir.join("files").join("ImageGeneration.data"));
        let worker = Worker::new(
            handoff,
            Generator::new(None).unwrap(),
            Box::new(opened.clone()),
            dir.to_path_buf(),
        )
        .with_open_pause(Duration::ZERO);
        (worker, opened)
    }

    fn content(worker: &Worker) -> String {
        std::fs::read_to_string(worker.handoff.path()).unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let (worker, _) = worker(dir.path());
        let tick = worker.poll_once().await;
        assert_eq!(tick, Tick::Created);
        assert_eq!(tick.delay(), Duration::from_secs(5));
        assert_eq!(content(&worker), IDLE_CONTENT);
    }

    #[tokio::test]
    async fn test_idle_empty_and_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let (worker, _) = worker(dir.path());
        worker.handoff.reset().unwrap();
        assert_eq!(worker.poll_once().await, Tick::Idle);

        std::fs::write(worker.handoff.path(), "").unwrap();
        assert_eq!(worker.poll_once().await, Tick::Reinitialized);
        assert_eq!(content(&worker), IDLE_CONTENT);

        std::fs::write(worker.handoff.path(), "garbage").unwrap();
        assert_eq!(worker.poll_once().await, Tick::Recovered);
        assert_eq!(content(&worker), IDLE_CONTENT);
    }

    #[tokio::test]
    async fn test_pending_request_is_consumed() {
        let dir = tempfile::tempdir().unwrap();
        let (worker, opened) = worker(dir.path());
        worker.handoff.request("a red fox").unwrap();

        // No API key: nothing is generated but the request is still cleared.
        let tick = worker.poll_once().await;
        assert_eq!(tick, Tick::Generated(0));
        assert_eq!(tick.delay(), Duration::from_millis(500));
        assert_eq!(content(&worker), IDLE_CONTENT);
        assert!(opened.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_once_returns_after_request() {
        let dir = tempfile::tempdir().unwrap();
        let (worker, _) = worker(dir.path());
        worker.handoff.request("sunset").unwrap();
        tokio::time::timeout(Duration::from_secs(5), worker.run(true))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_once_returns_after_failed_request() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();
        let opened = OpenedFiles::default();
        let handoff = Handoff::new(dir.path().join("files").join("ImageGeneration.data"));
        let worker = Worker::new(handoff, Generator::new(None).unwrap(), Box::new(opened), blocker)
            .with_open_pause(Duration::ZERO);
        worker.handoff.request("sunset").unwrap();

        tokio::time::timeout(Duration::from_secs(5), worker.run(true))
            .await
            .unwrap();
        assert_eq!(content(&worker), IDLE_CONTENT);
    }

    #[tokio::test]
    async fn test_failed_generation_reports_consumed_request() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();
        let handoff = Handoff::new(dir.path().join("files").join("ImageGeneration.data"));
        let worker = Worker::new(handoff, Generator::new(None).unwrap(), Box::new(OpenedFiles::default()), blocker);
        worker.handoff.request("sunset").unwrap();

        let tick = worker.poll_once().await;
        assert_eq!(tick, Tick::GenerationFailed);
        assert!(tick.consumed_request());
        assert!(!Tick::Idle.consumed_request());
        assert_eq!(tick.delay(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_request_written_during_generation_survives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("files").join("ImageGeneration.data");
        let follow_up = Handoff::new(path.clone());
        let hook: Hook = Arc::new(move || {
            follow_up.request("a second picture").unwrap();
        });
        let url = serve("200 OK", "image/jpeg", b"jpeg", hook).await;

        let opened = OpenedFiles::default();
        let generator = Generator::new(Some("key".into())).unwrap().with_api_url(url);
        let worker = Worker::new(Handoff::new(path), generator, Box::new(opened.clone()), dir.path().to_path_buf())
            .with_open_pause(Duration::ZERO);
        worker.handoff.request("a red fox").unwrap();

        assert_eq!(worker.poll_once().await, Tick::Generated(4));
        assert_eq!(opened.0.lock().unwrap().len(), 4);
        let next = worker.handoff.read().unwrap();
        assert!(next.pending);
        assert_eq!(next.prompt, "a second picture");
    }
}
