//! Cloud speech-to-text: OpenAI Whisper API or a compatible custom endpoint.

use reqwest::multipart;
use tracing::debug;

const OPENAI_TRANSCRIPTIONS_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Encode f32 samples as 16-bit PCM mono WAV.
pub fn encode_wav(audio: &[f32], sample_rate: u32) -> Vec<u8> {
    let data_size = audio.len() as u32 * 2;
    let mut buf = Vec::with_capacity(44 + data_size as usize);

    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&(36 + data_size).to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
    buf.extend_from_slice(&1u16.to_le_bytes()); // mono
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&(sample_rate * 2).to_le_bytes()); // byte rate
    buf.extend_from_slice(&2u16.to_le_bytes()); // block align
    buf.extend_from_slice(&16u16.to_le_bytes());

    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for &sample in audio {
        let pcm = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
        buf.extend_from_slice(&pcm.to_le_bytes());
    }
    buf
}

/// `"en-US"` -> `Some("en")`; Whisper wants ISO-639-1.
pub fn whisper_language(input_language: Option<&str>) -> Option<String> {
    let lang = input_language?.trim();
    let code = lang.split(['-', '_']).next()?.to_lowercase();
    (code.len() == 2).then_some(code)
}

pub struct SttClient {
    endpoint: String,
    api_key: Option<String>,
    language: Option<String>,
    client: reqwest::Client,
}

impl SttClient {
    pub fn new(endpoint: &str, api_key: Option<String>, language: Option<String>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            api_key,
            language,
            client: reqwest::Client::new(),
        }
    }

    /// Build from the configured adapter name.
    ///
    /// `adapter` is one of: "openai-cloud", "custom-cloud".
    pub fn from_adapter(
        adapter: &str,
        api_key: Option<&str>,
        endpoint: Option<&str>,
        language: Option<String>,
    ) -> anyhow::Result<Self> {
        match adapter {
            "openai-cloud" => {
                let key = api_key.ok_or_else(|| anyhow::anyhow!("OpenAI STT requires an API key"))?;
                Ok(Self::new(OPENAI_TRANSCRIPTIONS_URL, Some(key.to_string()), language))
            }
            "custom-cloud" => {
                let url = endpoint.ok_or_else(|| anyhow::anyhow!("Custom STT requires an endpoint URL"))?;
                Ok(Self::new(url, api_key.map(str::to_string), language))
            }
            other => anyhow::bail!("Unknown STT adapter: {}", other),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Transcribe 16 kHz mono audio.
    pub async fn transcribe(&self, audio: &[f32]) -> anyhow::Result<String> {
        let wav = encode_wav(audio, 16_000);
        debug!(bytes = wav.len(), endpoint = %self.endpoint, "Sending audio for transcription");

        let file_part = multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")?;
        let mut form = multipart::Form::new()
            .text("model", "whisper-1")
            .part("file", file_part);
        if let Some(lang) = &self.language {
            form = form.text("language", lang.clone());
        }

        let mut req = self.client.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("STT API error {}: {}", status, body);
        }

        let json: serde_json::Value = resp.json().await?;
        Ok(json["text"].as_str().unwrap_or("").trim().to_string())
    }
}
