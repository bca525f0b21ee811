//! Hugging Face text-to-image client.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::future::join_all;
use rand::Rng;
use tracing::{debug, info, warn};

use assistant_core::text::sanitize_filename;

pub const API_URL: &str =
    "https://api-inference.huggingface.co/models/stabilityai/stable-diffusion-xl-base-1.0";

/// Images requested per prompt.
pub const IMAGES_PER_PROMPT: usize = 4;

const STAGGER: Duration = Duration::from_millis(100);

/// Model input for one image; each request gets its own seed.
pub fn build_inputs(prompt: &str, seed: u32) -> String {
    format!(
        "{}, quality=4K, sharpness=maximum, Ultra High details, high resolution, seed= {}",
        prompt, seed
    )
}

pub fn is_image_content_type(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"))
        .unwrap_or(false)
}

pub struct Generator {
    client: reqwest::Client,
    api_key: Option<String>,
    api_url: String,
}

impl Generator {
    pub fn new(api_key: Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()?,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            api_url: API_URL.to_string(),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_api_url(mut self, url: String) -> Self {
        self.api_url = url;
        self
    }

    pub fn has_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Request [`IMAGES_PER_PROMPT`] images concurrently. Failed requests
    /// come back as empty buffers so positions stay stable.
    pub async fn generate(&self, prompt: &str) -> Vec<Vec<u8>> {
        let Some(key) = self.api_key.as_deref() else {
            warn!("No Hugging Face API key configured, skipping generation");
            return Vec::new();
        };

        let requests = (0..IMAGES_PER_PROMPT).map(|i| {
            let seed = rand::thread_rng().gen_range(0..=1_000_000);
            let inputs = build_inputs(prompt, seed);
            async move {
                tokio::time::sleep(STAGGER * i as u32).await;
                match self.request(key, &inputs).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!(index = i + 1, "Image request failed: {}", e);
                        Vec::new()
                    }
                }
            }
        });
        join_all(requests).await
    }

    async fn request(&self, key: &str, inputs: &str) -> anyhow::Result<Vec<u8>> {
        let resp = self
            .client
            .post(&self.api_url)
            .bearer_auth(key)
            .json(&serde_json::json!({ "inputs": inputs }))
            .send()
            .await?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("API error {}: {}", status, body);
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if !is_image_content_type(content_type.as_deref()) {
            anyhow::bail!("Unexpected content type {:?}", content_type);
        }
        let bytes = resp.bytes().await?;
        debug!(bytes = bytes.len(), "Image received");
        Ok(bytes.to_vec())
    }
}

/// Write non-empty images as `<dir>/<sanitized prompt>_<n>.jpg` (n from 1).
pub fn save_images(dir: &Path, prompt: &str, images: &[Vec<u8>]) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let stem = sanitize_filename(prompt);
    let mut saved = Vec::new();
    for (i, image) in images.iter().enumerate() {
        if image.is_empty() {
            continue;
        }
        let path = dir.join(format!("{}_{}.jpg", stem, i + 1));
        std::fs::write(&path, image)?;
        info!(path = %path.display(), "Image saved");
        saved.push(path);
    }
    Ok(saved)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    pub type Hook = Arc<dyn Fn() + Send + Sync>;

    /// Local HTTP server giving every request the same response. `on_request`
    /// runs after a request is read and before the reply is sent.
    pub async fn serve(status: &'static str, content_type: &'static str, body: &'static [u8], on_request: Hook) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let on_request = on_request.clone();
                tokio::spawn(async move {
                    read_request(&mut stream).await;
                    on_request();
                    let head = format!(
                        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        status,
                        content_type,
                        body.len()
                    );
                    let _ = stream.write_all(head.as_bytes()).await;
                    let _ = stream.write_all(body).await;
                    let _ = stream.shutdown().await;
                });
            }
        });
        format!("http://{}/model", addr)
    }

    pub fn noop() -> Hook {
        Arc::new(|| {})
    }

    async fn read_request(stream: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            buf.extend_from_slice(&chunk[..n]);
            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + len {
                return;
            }
        }
    }
}
