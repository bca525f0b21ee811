//! OS side effects: launching and closing apps, opening URLs and files,
//! pressing media keys.

use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

/// Volume keys reachable through `system` tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKey {
    Mute,
    VolumeUp,
    VolumeDown,
}

/// Common trait for desktop effects. Calls are blocking.
pub trait Desktop: Send + Sync {
    fn open_url(&self, url: &str) -> anyhow::Result<()>;

    /// Open a file with its default application (text files in the editor).
    fn open_file(&self, path: &Path) -> anyhow::Result<()>;

    /// Start an installed application. `Ok(false)` means not found.
    fn launch_app(&self, name: &str) -> anyhow::Result<bool>;

    /// Ask a running application to quit. `Ok(false)` means nothing matched.
    fn close_app(&self, name: &str) -> anyhow::Result<bool>;

    fn press_media_key(&self, key: MediaKey) -> anyhow::Result<()>;
}

/// Real desktop backed by the platform's opener and process tools.
pub struct SystemDesktop;

impl SystemDesktop {
    fn spawn_detached(cmd: &mut Command) -> anyhow::Result<()> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| anyhow::anyhow!("Failed to spawn {:?}: {}", cmd.get_program(), e))?;
        Ok(())
    }

    fn opener(target: &str) -> Command {
        #[cfg(target_os = "windows")]
        {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", "", target]);
            cmd
        }
        #[cfg(target_os = "macos")]
        {
            let mut cmd = Command::new("open");
            cmd.arg(target);
            cmd
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let mut cmd = Command::new("xdg-open");
            cmd.arg(target);
            cmd
        }
    }

    fn file_opener(path: &Path) -> Command {
        #[cfg(target_os = "windows")]
        if is_text_document(path) {
            let mut cmd = Command::new("notepad.exe");
            cmd.arg(path);
            return cmd;
        }
        Self::opener(&path.to_string_lossy())
    }
}

#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
fn is_text_document(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
}

impl Desktop for SystemDesktop {
    fn open_url(&self, url: &str) -> anyhow::Result<()> {
        info!(url = %url, "Opening URL");
        Self::spawn_detached(&mut Self::opener(url))
    }

    fn open_file(&self, path: &Path) -> anyhow::Result<()> {
        info!(path = %path.display(), "Opening file");
        Self::spawn_detached(&mut Self::file_opener(path))
    }

    fn launch_app(&self, name: &str) -> anyhow::Result<bool> {
        let candidates = app_binary_candidates(name);

        #[cfg(target_os = "macos")]
        {
            let status = Command::new("open")
                .args(["-a", name])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()?;
            if status.success() {
                info!(app = %name, "Launched application");
                return Ok(true);
            }
        }

        for candidate in &candidates {
            if let Ok(path) = which::which(candidate) {
                debug!(app = %name, path = %path.display(), "Resolved application binary");
                Self::spawn_detached(&mut Command::new(path))?;
                info!(app = %name, "Launched application");
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn close_app(&self, name: &str) -> anyhow::Result<bool> {
        for candidate in app_binary_candidates(name) {
            #[cfg(target_os = "windows")]
            let image = format!("{}.exe", candidate);
            #[cfg(target_os = "windows")]
            let status = Command::new("taskkill")
                .args(["/IM", image.as_str(), "/F"])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()?;
            #[cfg(not(target_os = "windows"))]
            let status = Command::new("pkill")
                .args(["-i", "-f", candidate.as_str()])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()?;

            if status.success() {
                info!(app = %name, "Closed application");
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn press_media_key(&self, key: MediaKey) -> anyhow::Result<()> {
        use rdev::{simulate, EventType};

        let code = media_key_code(key);
        let delay = Duration::from_millis(20);

        simulate(&EventType::KeyPress(rdev::Key::Unknown(code)))
            .map_err(|e| anyhow::anyhow!("Failed to simulate {:?} press: {:?}", key, e))?;
        thread::sleep(delay);
        simulate(&EventType::KeyRelease(rdev::Key::Unknown(code)))
            .map_err(|e| anyhow::anyhow!("Failed to simulate {:?} release: {:?}", key, e))?;
        Ok(())
    }
}

/// Platform key code for a media key (virtual-key, kVK or X keycode).
fn media_key_code(key: MediaKey) -> u32 {
    #[cfg(target_os = "windows")]
    {
        match key {
            MediaKey::Mute => 0xAD,
            MediaKey::VolumeDown => 0xAE,
            MediaKey::VolumeUp => 0xAF,
        }
    }
    #[cfg(target_os = "macos")]
    {
        match key {
            MediaKey::VolumeUp => 0x48,
            MediaKey::VolumeDown => 0x49,
            MediaKey::Mute => 0x4A,
        }
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        match key {
            MediaKey::Mute => 121,
            MediaKey::VolumeDown => 122,
            MediaKey::VolumeUp => 123,
        }
    }
}

/// Binary names to try for a spoken app name: `"Visual Studio Code"` ->
/// `["visual studio code", "visual-studio-code", "visualstudiocode"]`.
pub fn app_binary_candidates(name: &str) -> Vec<String> {
    let lower = name.trim().to_lowercase();
    if lower.is_empty() {
        return Vec::new();
    }
    let mut out = vec![lower.clone()];
    for variant in [lower.replace(' ', "-"), lower.replace(' ', "")] {
        if !out.contains(&variant) {
            out.push(variant);
        }
    }
    out
}
