//! Image-generation handoff between the assistant and `imagegen-worker`.
//!
//! The assistant writes a request into `<data>/files/ImageGeneration.data`:
//! ```text
//! <prompt>, True
//! ```
//! The worker polls the file, generates images for pending requests, then
//! resets it to `False, False`. Writes go through a temp file + rename so the
//! worker never sees a half-written line.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;

use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Content of an idle handoff file.
pub const IDLE_CONTENT: &str = "False, False";

/// Name of the worker binary, without platform suffix.
pub const WORKER_BINARY: &str = "imagegen-worker";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub prompt: String,
    pub pending: bool,
}

#[derive(Debug)]
pub enum HandoffError {
    /// The file does not exist.
    Missing,
    /// The file exists but is blank.
    Empty,
    /// No `,` separating prompt and status.
    Malformed(String),
    Io(std::io::Error),
}

impl fmt::Display for HandoffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandoffError::Missing => write!(f, "handoff file is missing"),
            HandoffError::Empty => write!(f, "handoff file is empty"),
            HandoffError::Malformed(content) => write!(f, "malformed handoff content: {:?}", content),
            HandoffError::Io(e) => write!(f, "handoff I/O error: {}", e),
        }
    }
}

impl std::error::Error for HandoffError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HandoffError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for HandoffError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            HandoffError::Missing
        } else {
            HandoffError::Io(e)
        }
    }
}

/// Parse `"<prompt>, <status>"`. Only the first comma splits.
pub fn parse(content: &str) -> Result<ImageRequest, HandoffError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(HandoffError::Empty);
    }
    let (prompt, status) = content
        .split_once(',')
        .ok_or_else(|| HandoffError::Malformed(content.to_string()))?;
    Ok(ImageRequest {
        prompt: prompt.trim().to_string(),
        pending: status.trim().eq_ignore_ascii_case("true"),
    })
}

/// Reader/writer for the handoff file.
#[derive(Debug, Clone)]
pub struct Handoff {
    path: PathBuf,
}

impl Handoff {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue a prompt for the worker.
    pub fn request(&self, prompt: &str) -> anyhow::Result<()> {
        let prompt = prompt.replace(',', " ");
        let prompt = prompt.trim();
        if prompt.is_empty() {
            anyhow::bail!("Image prompt is empty");
        }
        self.write(&format!("{}, True", prompt))?;
        info!(prompt = %prompt, "Image request written");
        Ok(())
    }

    pub fn read(&self) -> Result<ImageRequest, HandoffError> {
        let content = std::fs::read_to_string(&self.path)?;
        parse(&content)
    }

    pub fn reset(&self) -> anyhow::Result<()> {
        self.write(IDLE_CONTENT)
    }

    /// Create the file (and its directory) in the idle state if missing or blank.
    pub fn ensure_initialized(&self) -> anyhow::Result<()> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if !content.trim().is_empty() => Ok(()),
            _ => self.reset(),
        }
    }

    fn write(&self, content: &str) -> anyhow::Result<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Handoff path has no parent directory"))?;
        std::fs::create_dir_all(dir)?;
        let tmp = dir.join(format!(".imagegen.{}.tmp", std::process::id()));
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Worker process supervision
// ---------------------------------------------------------------------------

/// Locate the worker: next to the running executable, then on `PATH`.
pub fn locate_worker() -> Option<PathBuf> {
    let file_name = format!("{}{}", WORKER_BINARY, std::env::consts::EXE_SUFFIX);
    let sibling = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&file_name)))
        .filter(|p| p.is_file());
    sibling.or_else(|| which::which(WORKER_BINARY).ok())
}

/// Keeps track of spawned worker processes.
pub struct WorkerSupervisor {
    program: Option<PathBuf>,
    args: Vec<String>,
    children: Mutex<Vec<Child>>,
}

impl WorkerSupervisor {
    /// Supervisor for the installed worker binary.
    pub fn new() -> Self {
        Self::with_program(locate_worker(), Vec::new())
    }

    pub fn with_program(program: Option<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program,
            args,
            children: Mutex::new(Vec::new()),
        }
    }

    /// Number of workers still running. Exited children are dropped.
    pub fn alive(&self) -> usize {
        let mut children = self.lock();
        children.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                debug!(pid = ?child.id(), %status, "Image worker exited");
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!("Failed to poll image worker: {}", e);
                false
            }
        });
        children.len()
    }

    /// Spawn a worker unless one is already running.
    pub fn ensure_running(&self) -> anyhow::Result<()> {
        if self.alive() > 0 {
            return Ok(());
        }
        let program = self
            .program
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("{} binary not found", WORKER_BINARY))?;

        let mut cmd = Command::new(program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        #[cfg(target_os = "windows")]
        cmd.creation_flags(0x08000000); // CREATE_NO_WINDOW

        let child = cmd
            .spawn()
            .map_err(|e| anyhow::anyhow!("Failed to spawn {}: {}", program.display(), e))?;
        info!(pid = ?child.id(), program = %program.display(), "Image worker started");
        self.lock().push(child);
        Ok(())
    }

    /// Kill every worker and wait for it to exit.
    pub async fn kill_all(&self) {
        let children: Vec<Child> = std::mem::take(&mut *self.lock());
        for mut child in children {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill image worker: {}", e);
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Child>> {
        self.children.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for WorkerSupervisor {
    fn default() -> Self {
        Self::new()
    }
}
