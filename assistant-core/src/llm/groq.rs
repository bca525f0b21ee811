//! Groq chat completions over the OpenAI-compatible streaming API.
//!
//! POST `{base}/chat/completions` with `"stream": true`; the response is a
//! server-sent event stream of `data: {json}` lines ending in `data: [DONE]`.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures_util::StreamExt;
use serde::Serialize;
use tracing::{debug, info};

use super::{clean_completion, ChatMessage, ChatModel, CompletionRequest};

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    stream: bool,
}

/// Outcome of feeding one SSE line to the parser.
#[derive(Debug, PartialEq, Eq)]
pub enum SseLine {
    /// A content delta (possibly empty).
    Delta(String),
    /// `data: [DONE]`
    Done,
    /// Comments, blank keep-alives, role-only chunks.
    Skip,
}

/// Parse one line of the completion event stream.
pub fn parse_sse_line(line: &str) -> anyhow::Result<SseLine> {
    let line = line.trim();
    let Some(payload) = line.strip_prefix("data:") else {
        return Ok(SseLine::Skip);
    };
    let payload = payload.trim();
    if payload == "[DONE]" {
        return Ok(SseLine::Done);
    }
    if payload.is_empty() {
        return Ok(SseLine::Skip);
    }

    let json: serde_json::Value = serde_json::from_str(payload)?;
    if let Some(err) = json.get("error") {
        let message = err["message"].as_str().unwrap_or("unknown error");
        anyhow::bail!("Groq stream error: {}", message);
    }
    match json["choices"][0]["delta"]["content"].as_str() {
        Some(text) => Ok(SseLine::Delta(text.to_string())),
        None => Ok(SseLine::Skip),
    }
}

/// Groq API client.
pub struct GroqClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl GroqClient {
    pub fn new(api_key: &str, base_url: Option<&str>) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    async fn stream_completion(&self, request: CompletionRequest) -> anyhow::Result<String> {
        let body = ApiRequest {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            stream: true,
        };

        info!(
            model = %request.model,
            messages = request.messages.len(),
            "Groq completion request"
        );

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Groq request failed: {}", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Groq API error {}: {}", status, body);
        }

        let mut answer = String::new();
        let mut pending = String::new();
        let mut stream = resp.bytes_stream();

        'outer: while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| anyhow::anyhow!("Groq stream read failed: {}", e))?;
            pending.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = pending.find('\n') {
                let line: String = pending.drain(..=pos).collect();
                match parse_sse_line(&line)? {
                    SseLine::Delta(text) => answer.push_str(&text),
                    SseLine::Done => break 'outer,
                    SseLine::Skip => {}
                }
            }
        }

        // A final line without trailing newline.
        if let SseLine::Delta(text) = parse_sse_line(&pending)? {
            answer.push_str(&text);
        }

        debug!(chars = answer.len(), "Groq completion finished");
        Ok(clean_completion(&answer))
    }
}

impl ChatModel for GroqClient {
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>> {
        Box::pin(self.stream_completion(request))
    }

    fn name(&self) -> String {
        "Groq".to_string()
    }
}
