//! Image generation worker.
//!
//! Polls `<data>/files/ImageGeneration.data` for requests written by the
//! assistant, generates images via Hugging Face, saves them to the data
//! directory and opens them. `--once` exits after the first request.

mod generator;
mod worker;

use tracing::info;

use assistant_core::automation::SystemDesktop;
use assistant_core::config::paths::{get_data_dir, get_handoff_path, get_log_dir};
use assistant_core::config::read_assistant_config;
use assistant_core::imagegen::Handoff;
use assistant_core::logging;

use generator::Generator;
use worker::Worker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = logging::try_init(&get_log_dir(), "imagegen-worker") {
        eprintln!("Logging setup failed: {}", e);
    }

    let once = std::env::args().skip(1).any(|arg| arg == "--once");
    let config = read_assistant_config();

    let handoff = Handoff::new(get_handoff_path());
    handoff.ensure_initialized()?;

    let generator = Generator::new(config.huggingface_api_key.clone())?;
    info!(
        handoff = %handoff.path().display(),
        has_key = generator.has_key(),
        once,
        "Image worker started"
    );

    let worker = Worker::new(handoff, generator, Box::new(SystemDesktop), get_data_dir());
    tokio::select! {
        _ = worker.run(once) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }
    info!("Image worker stopped");
    Ok(())
}
