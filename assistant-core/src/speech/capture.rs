//! Microphone capture via cpal.
//!
//! Opens the default (or named) input device at its native rate and pushes
//! 16 kHz mono f32 audio into a ring buffer.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use tracing::{error, info};

use super::ring_buffer::AudioProducer;

pub const TARGET_SAMPLE_RATE: u32 = 16_000;

fn resolve_device(device_name: Option<&str>) -> anyhow::Result<(cpal::Device, StreamConfig)> {
    let host = cpal::default_host();

    let device = match device_name {
        Some(name) => host
            .input_devices()
            .map_err(|e| anyhow::anyhow!("Failed to enumerate input devices: {}", e))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| anyhow::anyhow!("Input device not found: {}", name))?,
        None => host
            .default_input_device()
            .ok_or_else(|| anyhow::anyhow!("No default input device available"))?,
    };

    let default_config = device
        .default_input_config()
        .map_err(|e| anyhow::anyhow!("Failed to get default input config: {}", e))?;

    let stream_config = StreamConfig {
        channels: default_config.channels(),
        sample_rate: default_config.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };
    info!(
        device = %device.name().unwrap_or_else(|_| "unknown".into()),
        rate = stream_config.sample_rate.0,
        channels = stream_config.channels,
        "Selected input device"
    );
    Ok((device, stream_config))
}

/// Linear resampler for mono f32 audio.
pub fn resample_linear(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate {
        return input.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((input.len() as f64) / ratio).floor() as usize;
    let mut output = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let src_idx = i as f64 * ratio;
        let idx0 = src_idx.floor() as usize;
        let frac = (src_idx - idx0 as f64) as f32;
        let s0 = input.get(idx0).copied().unwrap_or(0.0);
        let s1 = input.get(idx0 + 1).copied().unwrap_or(s0);
        output.push(s0 + frac * (s1 - s0));
    }
    output
}

/// Average interleaved channels down to mono.
pub fn to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let ch = channels as usize;
    samples
        .chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Start capturing. The returned stream must be kept alive (and is `!Send`,
/// so it stays on the thread that created it).
pub fn start_capture(mut producer: AudioProducer, device_name: Option<&str>) -> anyhow::Result<Stream> {
    let (device, config) = resolve_device(device_name)?;
    let native_rate = config.sample_rate.0;
    let channels = config.channels;

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                let mono = to_mono(data, channels);
                let samples = resample_linear(&mono, native_rate, TARGET_SAMPLE_RATE);
                producer.push_slice(&samples);
            },
            move |err| {
                error!("Audio input stream error: {}", err);
            },
            None,
        )
        .map_err(|e| anyhow::anyhow!("Failed to build input stream: {}", e))?;

    stream
        .play()
        .map_err(|e| anyhow::anyhow!("Failed to start input stream: {}", e))?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_mono() {
        assert_eq!(to_mono(&[0.25, 0.75, -1.0, 1.0], 2), vec![0.5, 0.0]);
        assert_eq!(to_mono(&[0.5], 1), vec![0.5]);
    }

    #[test]
    fn test_resample_halves_length() {
        let input: Vec<f32> = (0..320).map(|i| i as f32).collect();
        let out = resample_linear(&input, 32_000, 16_000);
        assert_eq!(out.len(), 160);
        assert_eq!(out[1], 2.0);
        assert_eq!(resample_linear(&input, 16_000, 16_000), input);
    }
}
