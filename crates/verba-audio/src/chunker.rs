use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};

use super::capture::DeviceConfig;
use super::frame_reader::FrameReader;
use super::resampler::StreamResampler;
use verba_telemetry::{FpsTracker, PipelineMetrics, PipelineStage};

/// A fixed-size block of mono samples at the outbound rate, ready for the
/// codec. Floating form because that is what the encoder consumes.
#[derive(Debug, Clone)]
pub struct AudioBlock {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub timestamp: std::time::Instant,
}

pub struct ChunkerConfig {
    pub block_size_samples: usize,
    pub sample_rate_hz: u32,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            block_size_samples: crate::BLOCK_SAMPLES,
            sample_rate_hz: crate::CAPTURE_SAMPLE_RATE,
        }
    }
}

/// Assembles device-format capture frames into fixed outbound blocks:
/// stereo fold, resample to the outbound rate, buffer, emit.
pub struct BlockChunker {
    frame_reader: FrameReader,
    device_cfg: DeviceConfig,
    output_tx: broadcast::Sender<AudioBlock>,
    cfg: ChunkerConfig,
    running: Arc<AtomicBool>,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl BlockChunker {
    pub fn new(
        frame_reader: FrameReader,
        device_cfg: DeviceConfig,
        output_tx: broadcast::Sender<AudioBlock>,
        cfg: ChunkerConfig,
    ) -> Self {
        Self {
            frame_reader,
            device_cfg,
            output_tx,
            cfg,
            running: Arc::new(AtomicBool::new(false)),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn spawn(self) -> (JoinHandle<()>, Arc<AtomicBool>) {
        let mut worker = ChunkerWorker::new(
            self.frame_reader,
            self.device_cfg,
            self.output_tx,
            self.cfg,
            self.metrics,
        );
        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let running_for_worker = self.running.clone();

        let handle = tokio::spawn(async move {
            worker.run(running_for_worker).await;
        });
        (handle, running)
    }
}

struct ChunkerWorker {
    frame_reader: FrameReader,
    output_tx: broadcast::Sender<AudioBlock>,
    cfg: ChunkerConfig,
    channels: u16,
    buffer: VecDeque<f32>,
    samples_emitted: u64,
    resampler: Option<StreamResampler>,
    metrics: Option<Arc<PipelineMetrics>>,
    capture_fps_tracker: FpsTracker,
    chunker_fps_tracker: FpsTracker,
    start_time: std::time::Instant,
}

impl ChunkerWorker {
    fn new(
        frame_reader: FrameReader,
        device_cfg: DeviceConfig,
        output_tx: broadcast::Sender<AudioBlock>,
        cfg: ChunkerConfig,
        metrics: Option<Arc<PipelineMetrics>>,
    ) -> Self {
        let resampler = if device_cfg.sample_rate != cfg.sample_rate_hz {
            tracing::info!(
                "Configuring resampler: {}Hz {} ch -> {}Hz mono",
                device_cfg.sample_rate,
                device_cfg.channels,
                cfg.sample_rate_hz
            );
            Some(StreamResampler::new(
                device_cfg.sample_rate,
                cfg.sample_rate_hz,
            ))
        } else {
            None
        };

        let cap = cfg.block_size_samples * 4;
        let start_time = frame_reader.clock().now();
        Self {
            frame_reader,
            output_tx,
            channels: device_cfg.channels,
            cfg,
            buffer: VecDeque::with_capacity(cap),
            samples_emitted: 0,
            resampler,
            metrics,
            capture_fps_tracker: FpsTracker::new(),
            chunker_fps_tracker: FpsTracker::new(),
            start_time,
        }
    }

    async fn run(&mut self, running: Arc<AtomicBool>) {
        tracing::info!("Block chunker started");

        while running.load(Ordering::SeqCst) {
            if let Some(frame) = self.frame_reader.read_frame(self.cfg.block_size_samples) {
                if let Some(m) = &self.metrics {
                    m.increment_capture_frames();
                    if let Some(fps) = self.capture_fps_tracker.tick() {
                        m.update_capture_fps(fps);
                    }
                    m.update_audio_level(&frame.samples);
                    m.mark_stage_active(PipelineStage::Capture);
                }

                let processed = self.process_frame(&frame.samples);
                self.buffer.extend(processed);
                self.flush_ready_blocks();
            } else {
                // Blocks span ~256 ms of audio; polling at 20 Hz bounds the
                // added latency to a fraction of a block without burning CPU.
                time::sleep(Duration::from_millis(50)).await;
            }
        }

        tracing::info!("Block chunker stopped");
    }

    fn flush_ready_blocks(&mut self) {
        let bs = self.cfg.block_size_samples;
        while self.buffer.len() >= bs {
            let block: Vec<f32> = self.buffer.drain(..bs).collect();

            let timestamp_ms =
                (self.samples_emitted as u128 * 1000 / self.cfg.sample_rate_hz as u128) as u64;
            let timestamp = self.start_time + std::time::Duration::from_millis(timestamp_ms);

            let out = AudioBlock {
                samples: block,
                sample_rate: self.cfg.sample_rate_hz,
                timestamp,
            };

            // A broadcast send fails only when nobody is subscribed, which
            // just means the session is not forwarding yet.
            match self.output_tx.send(out) {
                Ok(n) => tracing::trace!("Chunker: block sent to {} receivers", n),
                Err(_) => tracing::warn!("No active listeners for audio blocks"),
            }

            self.samples_emitted += bs as u64;

            if let Some(m) = &self.metrics {
                if let Some(fps) = self.chunker_fps_tracker.tick() {
                    m.update_chunker_fps(fps);
                }
                m.mark_stage_active(PipelineStage::Chunker);
            }
        }
    }

    /// Interleaved device samples -> mono f32 at the outbound rate.
    fn process_frame(&mut self, samples: &[i16]) -> Vec<f32> {
        let mono: Vec<f32> = if self.channels <= 1 {
            samples.iter().map(|&s| s as f32 / 32768.0).collect()
        } else {
            let channels = self.channels as usize;
            samples
                .chunks_exact(channels)
                .map(|chunk| {
                    let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
                    (sum / channels as i32) as f32 / 32768.0
                })
                .collect()
        };

        match &mut self.resampler {
            Some(rs) => rs.process(&mono),
            None => mono,
        }
    }
}
