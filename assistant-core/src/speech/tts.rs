//! OpenAI text-to-speech and rodio playback.

use std::time::Duration;

use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, Sink};
use tracing::info;

/// OpenAI `pcm` responses are 24 kHz 16-bit mono.
pub const OPENAI_PCM_RATE: u32 = 24_000;

pub const OPENAI_VOICES: &[&str] = &["alloy", "echo", "fable", "onyx", "nova", "shimmer"];

/// Map a configured voice to an OpenAI voice, defaulting to `alloy`.
pub fn openai_voice(configured: Option<&str>) -> &'static str {
    configured
        .map(|v| v.trim().to_lowercase())
        .and_then(|v| OPENAI_VOICES.iter().copied().find(|known| *known == v))
        .unwrap_or("alloy")
}

/// Little-endian i16 PCM to f32.
pub fn pcm16_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]) as f32 / 32768.0)
        .collect()
}

pub struct OpenAiTts {
    api_key: String,
    voice: String,
    client: reqwest::Client,
}

impl OpenAiTts {
    pub fn new(api_key: &str, voice: &str) -> anyhow::Result<Self> {
        Ok(Self {
            api_key: api_key.to_string(),
            voice: voice.to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()?,
        })
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }

    /// Synthesize to f32 samples at [`OPENAI_PCM_RATE`].
    pub async fn synthesize(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        info!(voice = %self.voice, text_len = text.len(), "OpenAI TTS request");

        let body = serde_json::json!({
            "model": "tts-1",
            "input": text,
            "voice": self.voice,
            "response_format": "pcm",
        });
        let resp = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("OpenAI TTS request failed: {}", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI TTS API error {}: {}", status, body);
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read OpenAI TTS response: {}", e))?;
        Ok(pcm16_to_f32(&bytes))
    }
}

/// Play mono samples through the default output device, blocking until done.
pub fn play_blocking(samples: Vec<f32>, sample_rate: u32, volume: f32) -> anyhow::Result<()> {
    if samples.is_empty() {
        return Ok(());
    }
    let (_stream, handle) = OutputStream::try_default()
        .map_err(|e| anyhow::anyhow!("Failed to open audio output: {}", e))?;
    let sink = Sink::try_new(&handle).map_err(|e| anyhow::anyhow!("Failed to create audio sink: {}", e))?;
    sink.set_volume(volume.clamp(0.0, 1.0));
    sink.append(SamplesBuffer::new(1, sample_rate, samples));
    sink.sleep_until_end();
    Ok(())
}
