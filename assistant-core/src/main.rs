//! Desktop assistant process.
//!
//! Talks to the frontend via JSON-line IPC on stdin/stdout and runs one
//! `MainExecution` cycle per typed query or spoken utterance.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use assistant_core::automation::lookup::HttpLookup;
use assistant_core::automation::SystemDesktop;
use assistant_core::config::paths::{get_data_dir, get_log_dir};
use assistant_core::config::read_assistant_config;
use assistant_core::dispatch::{Assistant, Outcome, Services};
use assistant_core::imagegen::WorkerSupervisor;
use assistant_core::ipc::bridge::{emit_error, emit_event, spawn_stdin_reader};
use assistant_core::ipc::{AssistantCommand, AssistantEvent, StdoutSink};
use assistant_core::llm::GroqClient;
use assistant_core::logging;
use assistant_core::realtime::DuckDuckGoSearch;
use assistant_core::speech::{create_speech_input, create_speech_output, SpeechInput};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = logging::try_init(&get_log_dir(), "assistant") {
        eprintln!("Logging setup failed: {}", e);
    }

    // Emit starting event immediately so the frontend knows we're alive.
    emit_event(&AssistantEvent::Starting {});

    emit_event(&AssistantEvent::Loading {
        step: "Reading configuration...".to_string(),
    });
    let config = read_assistant_config();
    let data_dir = get_data_dir();
    std::fs::create_dir_all(&data_dir)?;
    info!(
        user = %config.user_name(),
        assistant = %config.assistant_name(),
        chat_model = %config.chat_model(),
        data_dir = %data_dir.display(),
        "Configuration loaded"
    );

    let groq_key = config.groq_api_key.clone().unwrap_or_default();
    if groq_key.is_empty() {
        warn!("No Groq API key configured; queries will fail");
        emit_error("No Groq API key configured");
    }

    emit_event(&AssistantEvent::Loading {
        step: "Starting IPC bridge...".to_string(),
    });
    let mut cmd_rx = spawn_stdin_reader();

    emit_event(&AssistantEvent::Loading {
        step: "Initializing speech...".to_string(),
    });
    let input = create_speech_input(&config);
    let speaker = create_speech_output(&config);
    info!(output = %speaker.name(), input = input.is_some(), "Speech ready");

    let services = Services {
        model: Arc::new(GroqClient::new(&groq_key, config.groq_base_url.as_deref())),
        search: Arc::new(DuckDuckGoSearch::new()?),
        desktop: Arc::new(SystemDesktop),
        lookup: Arc::new(HttpLookup::new()?),
        speaker,
        workers: Arc::new(WorkerSupervisor::new()),
        sink: Arc::new(StdoutSink),
    };
    let assistant = Assistant::new(&config, &data_dir, services)?;

    emit_event(&AssistantEvent::Ready {});
    info!("Assistant ready");

    if let Err(e) = assistant.initial_execution() {
        error!("Initial execution failed: {}", e);
    }

    let mut tick = tokio::time::interval(Duration::from_millis(100));
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(command) => {
                        if !handle_command(&assistant, command).await {
                            break;
                        }
                    }
                    None => {
                        info!("stdin closed, shutting down");
                        break;
                    }
                }
            }
            _ = tick.tick() => {
                if assistant.status().is_listening()
                    && listen_once(&assistant, input.as_deref()).await == Outcome::Exit
                {
                    break;
                }
            }
        }
    }

    assistant.shutdown().await;
    info!("Assistant shutting down");
    Ok(())
}

/// One spoken cycle. Without a microphone this just switches listening off.
async fn listen_once(assistant: &Assistant, input: Option<&dyn SpeechInput>) -> Outcome {
    let query = match input {
        Some(input) => input.listen().await.unwrap_or_default(),
        None => {
            emit_error("Speech input is not available; type your query instead");
            String::new()
        }
    };
    assistant.main_execution(&query).await
}

/// Handle a single command from the frontend.
/// Returns `false` if the main loop should exit.
async fn handle_command(assistant: &Assistant, cmd: AssistantCommand) -> bool {
    match cmd {
        AssistantCommand::Ping {} => {
            emit_event(&AssistantEvent::Pong {});
        }

        AssistantCommand::Stop {} => return false,

        AssistantCommand::ToggleListening {} => {
            let listening = assistant.toggle_listening();
            info!(listening, "Listening toggled");
        }

        AssistantCommand::Query { text } => {
            info!(text = %text, "Query received");
            if assistant.main_execution(&text).await == Outcome::Exit {
                return false;
            }
        }

        AssistantCommand::SystemSpeak { text } => {
            assistant.system_speak(&text).await;
        }
    }

    true
}
