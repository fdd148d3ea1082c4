use verba_foundation::SharedClock;

use super::capture::AudioFrame;
use super::ring_buffer::AudioConsumer;

/// Drains the capture ring into timestamped frames.
///
/// Timestamps are reconstructed from the running sample count rather than
/// read from the wall clock per frame, so a slow consumer does not skew them.
pub struct FrameReader {
    consumer: AudioConsumer,
    sample_rate: u32,
    channels: u16,
    samples_read: u64,
    clock: SharedClock,
    start_time: std::time::Instant,
}

impl FrameReader {
    pub fn new(consumer: AudioConsumer, sample_rate: u32, channels: u16, clock: SharedClock) -> Self {
        let start_time = clock.now();
        Self {
            consumer,
            sample_rate,
            channels,
            samples_read: 0,
            clock,
            start_time,
        }
    }

    /// Read the next frame, up to `max_samples` interleaved samples.
    pub fn read_frame(&mut self, max_samples: usize) -> Option<AudioFrame> {
        let mut buffer = vec![0i16; max_samples];
        let samples_read = self.consumer.read(&mut buffer);

        if samples_read == 0 {
            return None;
        }

        buffer.truncate(samples_read);

        // Position of this frame on the capture timeline, in per-channel samples
        let elapsed_frames = self.samples_read / self.channels.max(1) as u64;
        let elapsed_ms = (elapsed_frames * 1000) / self.sample_rate as u64;
        let timestamp = self.start_time + std::time::Duration::from_millis(elapsed_ms);

        self.samples_read += samples_read as u64;

        Some(AudioFrame {
            samples: buffer,
            timestamp,
            sample_rate: self.sample_rate,
            channels: self.channels,
        })
    }

    pub fn available_samples(&self) -> usize {
        self.consumer.slots()
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring_buffer::AudioRingBuffer;
    use std::time::Duration;
    use verba_foundation::clock::TestClock;

    #[test]
    fn timestamps_follow_sample_count_not_wall_clock() {
        let rb = AudioRingBuffer::new(1024);
        let (mut prod, cons) = rb.split();
        let clock = std::sync::Arc::new(TestClock::new());
        let mut reader = FrameReader::new(cons, 1000, 1, clock.clone());

        prod.write(&[0i16; 500]).unwrap();
        let first = reader.read_frame(500).unwrap();

        // Even if wall time races ahead, the second frame's timestamp is
        // derived from the 500 samples already consumed (500 ms at 1 kHz).
        clock.advance(Duration::from_secs(60));
        prod.write(&[0i16; 100]).unwrap();
        let second = reader.read_frame(100).unwrap();

        assert_eq!(
            second.timestamp.duration_since(first.timestamp),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn empty_ring_yields_no_frame() {
        let rb = AudioRingBuffer::new(64);
        let (_prod, cons) = rb.split();
        let mut reader = FrameReader::new(cons, 16_000, 1, verba_foundation::test_clock());
        assert!(reader.read_frame(64).is_none());
    }
}
