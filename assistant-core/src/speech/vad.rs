//! Energy-based utterance segmentation.

use std::time::Duration;

/// Mean absolute amplitude of a chunk.
pub fn energy(chunk: &[f32]) -> f32 {
    if chunk.is_empty() {
        return 0.0;
    }
    chunk.iter().map(|s| s.abs()).sum::<f32>() / chunk.len() as f32
}

#[derive(Debug, Clone)]
pub struct VadConfig {
    pub sample_rate: u32,
    pub threshold: f32,
    /// Silence after speech that ends the utterance.
    pub trailing_silence: Duration,
    pub max_utterance: Duration,
    /// Give up if nobody starts talking.
    pub no_speech_timeout: Duration,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            threshold: 0.01,
            trailing_silence: Duration::from_millis(1200),
            max_utterance: Duration::from_secs(15),
            no_speech_timeout: Duration::from_secs(8),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum Segment {
    /// Keep feeding.
    Pending,
    /// Utterance finished; the captured audio.
    Done(Vec<f32>),
    /// No speech before the timeout.
    NoSpeech,
}

/// Collects one utterance from a stream of chunks.
pub struct Segmenter {
    config: VadConfig,
    audio: Vec<f32>,
    speaking: bool,
    silent_samples: usize,
    waited_samples: usize,
}

impl Segmenter {
    pub fn new(config: VadConfig) -> Self {
        Self {
            config,
            audio: Vec::new(),
            speaking: false,
            silent_samples: 0,
            waited_samples: 0,
        }
    }

    fn samples(&self, d: Duration) -> usize {
        (d.as_secs_f64() * self.config.sample_rate as f64) as usize
    }

    pub fn feed(&mut self, chunk: &[f32]) -> Segment {
        let loud = energy(chunk) >= self.config.threshold;

        if !self.speaking {
            if !loud {
                self.waited_samples += chunk.len();
                if self.waited_samples >= self.samples(self.config.no_speech_timeout) {
                    return Segment::NoSpeech;
                }
                return Segment::Pending;
            }
            self.speaking = true;
        }

        self.audio.extend_from_slice(chunk);
        if loud {
            self.silent_samples = 0;
        } else {
            self.silent_samples += chunk.len();
        }

        if self.silent_samples >= self.samples(self.config.trailing_silence)
            || self.audio.len() >= self.samples(self.config.max_utterance)
        {
            return Segment::Done(std::mem::take(&mut self.audio));
        }
        Segment::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> VadConfig {
        VadConfig {
            sample_rate: 100,
            threshold: 0.1,
            trailing_silence: Duration::from_millis(300),
            max_utterance: Duration::from_secs(2),
            no_speech_timeout: Duration::from_millis(500),
        }
    }

    #[test]
    fn test_energy() {
        assert_eq!(energy(&[]), 0.0);
        assert_eq!(energy(&[0.5, -0.5]), 0.5);
    }

    #[test]
    fn test_utterance_ends_after_trailing_silence() {
        let mut seg = Segmenter::new(config());
        assert_eq!(seg.feed(&[0.0; 10]), Segment::Pending);
        assert_eq!(seg.feed(&[0.5; 10]), Segment::Pending);
        assert_eq!(seg.feed(&[0.0; 10]), Segment::Pending);
        assert_eq!(seg.feed(&[0.0; 10]), Segment::Pending);
        match seg.feed(&[0.0; 10]) {
            // leading silence is not kept
            Segment::Done(audio) => assert_eq!(audio.len(), 40),
            other => panic!("expected Done, got {:?}", other),
        }
    }

    #[test]
    fn test_no_speech_timeout() {
        let mut seg = Segmenter::new(config());
        for _ in 0..4 {
            assert_eq!(seg.feed(&[0.0; 10]), Segment::Pending);
        }
        assert_eq!(seg.feed(&[0.0; 10]), Segment::NoSpeech);
    }

    #[test]
    fn test_max_utterance_cap() {
        let mut seg = Segmenter::new(config());
        let mut result = Segment::Pending;
        for _ in 0..20 {
            result = seg.feed(&[0.5; 10]);
            if result != Segment::Pending {
                break;
            }
        }
        assert!(matches!(result, Segment::Done(a) if a.len() == 200));
    }
}
