//! Speech in and out.
//!
//! `SpeechInput` captures one utterance from the microphone and returns its
//! transcript; `SpeechOutput` speaks a reply. Both degrade to silence when no
//! audio device or API key is available.

pub mod capture;
pub mod ring_buffer;
pub mod stt;
pub mod tts;
pub mod vad;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::AssistantConfig;
use crate::text::query_modifier;

use self::stt::SttClient;
use self::tts::OpenAiTts;
use self::vad::{Segment, Segmenter, VadConfig};

/// Said instead of reading out long answers in full.
pub const REST_ON_SCREEN: &str =
    "The rest of the result has been printed to the chat screen, kindly check it out sir.";

/// Shorten long answers for speaking: more than 4 sentences and over 250
/// characters keeps the first two sentences plus [`REST_ON_SCREEN`].
pub fn speakable_text(text: &str) -> String {
    let sentences: Vec<&str> = text.split('.').collect();
    if sentences.len() > 4 && text.chars().count() > 250 {
        format!("{}. {}", sentences[..2].join("."), REST_ON_SCREEN)
    } else {
        text.to_string()
    }
}

pub trait SpeechInput: Send + Sync {
    /// Record one utterance and transcribe it. `None` when nothing was said
    /// or capture failed.
    fn listen(&self) -> Pin<Box<dyn Future<Output = Option<String>> + Send + '_>>;
}

pub trait SpeechOutput: Send + Sync {
    /// Speak `text`, returning when playback ends. Failures are logged.
    fn speak(&self, text: &str) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;

    fn name(&self) -> String;
}

// ---------------------------------------------------------------------------
// Microphone
// ---------------------------------------------------------------------------

pub struct MicrophoneListener {
    device: Option<String>,
    vad: VadConfig,
    stt: SttClient,
}

impl MicrophoneListener {
    pub fn new(device: Option<String>, stt: SttClient) -> Self {
        Self {
            device,
            vad: VadConfig::default(),
            stt,
        }
    }

    /// Capture until the segmenter finishes. Runs on a blocking thread.
    fn record(device: Option<String>, vad: VadConfig) -> anyhow::Result<Option<Vec<f32>>> {
        let (producer, mut consumer) = ring_buffer::audio_ring_buffer(None);
        let _stream = capture::start_capture(producer, device.as_deref())?;
        let chunk = (vad.sample_rate / 10) as usize;
        let hard_stop = Instant::now() + vad.no_speech_timeout + vad.max_utterance + Duration::from_secs(2);
        let mut segmenter = Segmenter::new(vad);

        info!("Listening");
        while Instant::now() < hard_stop {
            if consumer.available() < chunk {
                thread::sleep(Duration::from_millis(20));
                continue;
            }
            match segmenter.feed(&consumer.take(chunk)) {
                Segment::Pending => {}
                Segment::Done(audio) => return Ok(Some(audio)),
                Segment::NoSpeech => return Ok(None),
            }
        }
        warn!("Capture stalled, giving up");
        Ok(None)
    }
}

impl SpeechInput for MicrophoneListener {
    fn listen(&self) -> Pin<Box<dyn Future<Output = Option<String>> + Send + '_>> {
        Box::pin(async move {
            let device = self.device.clone();
            let vad = self.vad.clone();
            let audio = match tokio::task::spawn_blocking(move || Self::record(device, vad)).await {
                Ok(Ok(Some(audio))) => audio,
                Ok(Ok(None)) => {
                    debug!("No speech detected");
                    return None;
                }
                Ok(Err(e)) => {
                    warn!("Microphone capture failed: {}", e);
                    return None;
                }
                Err(e) => {
                    warn!("Capture task panicked: {}", e);
                    return None;
                }
            };

            match self.stt.transcribe(&audio).await {
                Ok(text) if !text.trim().is_empty() => Some(query_modifier(&text)),
                Ok(_) => None,
                Err(e) => {
                    warn!("Transcription failed: {}", e);
                    None
                }
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Speakers
// ---------------------------------------------------------------------------

pub struct CloudSpeaker {
    tts: OpenAiTts,
    volume: f32,
}

impl CloudSpeaker {
    pub fn new(tts: OpenAiTts, volume: f32) -> Self {
        Self { tts, volume }
    }
}

impl SpeechOutput for CloudSpeaker {
    fn speak(&self, text: &str) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        let text = text.to_string();
        Box::pin(async move {
            let samples = match self.tts.synthesize(&text).await {
                Ok(samples) => samples,
                Err(e) => {
                    warn!("Speech synthesis failed: {}", e);
                    return;
                }
            };
            let volume = self.volume;
            let played = tokio::task::spawn_blocking(move || {
                tts::play_blocking(samples, tts::OPENAI_PCM_RATE, volume)
            })
            .await;
            match played {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Playback failed: {}", e),
                Err(e) => warn!("Playback task panicked: {}", e),
            }
        })
    }

    fn name(&self) -> String {
        format!("OpenAI TTS ({})", self.tts.voice())
    }
}

/// Speaks nothing; replies only go to the chat screen.
pub struct NullSpeaker;

impl SpeechOutput for NullSpeaker {
    fn speak(&self, text: &str) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        debug!(len = text.len(), "Speech output disabled");
        Box::pin(async {})
    }

    fn name(&self) -> String {
        "silent".to_string()
    }
}

// ---------------------------------------------------------------------------
// Construction from config
// ---------------------------------------------------------------------------

/// Microphone input, or `None` when no STT adapter can be built.
pub fn create_speech_input(config: &AssistantConfig) -> Option<Arc<dyn SpeechInput>> {
    let adapter = config.stt_adapter.as_deref().unwrap_or("openai-cloud");
    let language = stt::whisper_language(config.input_language.as_deref());
    match SttClient::from_adapter(
        adapter,
        config.openai_api_key.as_deref(),
        config.stt_endpoint.as_deref(),
        language,
    ) {
        Ok(client) => {
            info!(adapter = %adapter, "Speech input ready");
            Some(Arc::new(MicrophoneListener::new(config.input_device.clone(), client)))
        }
        Err(e) => {
            warn!("Speech input disabled: {}", e);
            None
        }
    }
}

/// Speaker per `ttsAdapter`: "openai-tts" (default) or "none".
pub fn create_speech_output(config: &AssistantConfig) -> Arc<dyn SpeechOutput> {
    let adapter = config.tts_adapter.as_deref().unwrap_or("openai-tts");
    let speaker: anyhow::Result<Arc<dyn SpeechOutput>> = match adapter {
        "none" => Ok(Arc::new(NullSpeaker)),
        "openai-tts" => config
            .openai_api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("OpenAI TTS requires an API key"))
            .and_then(|key| OpenAiTts::new(key, tts::openai_voice(config.assistant_voice.as_deref())))
            .map(|engine| Arc::new(CloudSpeaker::new(engine, config.tts_volume())) as Arc<dyn SpeechOutput>),
        other => Err(anyhow::anyhow!("Unknown TTS adapter: {}", other)),
    };
    speaker.unwrap_or_else(|e| {
        warn!("Speech output disabled: {}", e);
        Arc::new(NullSpeaker)
    })
}
