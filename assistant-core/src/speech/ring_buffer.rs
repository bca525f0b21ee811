//! Lock-free SPSC buffer between the cpal callback and the listener thread.

use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapRb,
};

/// ~20 s of 16 kHz mono audio; longer than the utterance cap.
const DEFAULT_CAPACITY: usize = 320_000;

pub struct AudioProducer {
    inner: ringbuf::HeapProd<f32>,
}

pub struct AudioConsumer {
    inner: ringbuf::HeapCons<f32>,
}

pub fn audio_ring_buffer(capacity: Option<usize>) -> (AudioProducer, AudioConsumer) {
    let rb = HeapRb::<f32>::new(capacity.unwrap_or(DEFAULT_CAPACITY));
    let (prod, cons) = rb.split();
    (AudioProducer { inner: prod }, AudioConsumer { inner: cons })
}

impl AudioProducer {
    /// Returns the number of samples written; the rest is dropped when full.
    pub fn push_slice(&mut self, samples: &[f32]) -> usize {
        self.inner.push_slice(samples)
    }
}

impl AudioConsumer {
    pub fn available(&self) -> usize {
        self.inner.occupied_len()
    }

    /// Take up to `max` samples.
    pub fn take(&mut self, max: usize) -> Vec<f32> {
        let n = self.available().min(max);
        if n == 0 {
            return Vec::new();
        }
        let mut buf = vec![0.0f32; n];
        let read = self.inner.pop_slice(&mut buf);
        buf.truncate(read);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_take() {
        let (mut prod, mut cons) = audio_ring_buffer(Some(8));
        assert_eq!(prod.push_slice(&[0.1, 0.2, 0.3]), 3);
        assert_eq!(cons.available(), 3);
        assert_eq!(cons.take(2), vec![0.1, 0.2]);
        assert_eq!(cons.take(10), vec![0.3]);
        assert!(cons.take(10).is_empty());
    }

    #[test]
    fn test_overflow_drops_samples() {
        let (mut prod, cons) = audio_ring_buffer(Some(4));
        assert_eq!(prod.push_slice(&[0.0; 6]), 4);
        assert_eq!(cons.available(), 4);
    }
}
