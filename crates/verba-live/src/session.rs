use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::controller::{ControlFlow, SessionController};
use crate::protocol::LiveConfig;
use crate::transport::LiveTransport;
use verba_audio::capture::CaptureThread;
use verba_audio::chunker::{AudioBlock, BlockChunker, ChunkerConfig};
use verba_audio::frame_reader::FrameReader;
use verba_audio::ring_buffer::AudioRingBuffer;
use verba_audio::sink::PlaybackThread;
use verba_audio::{BLOCK_SAMPLES, CAPTURE_SAMPLE_RATE, INBOUND_SAMPLE_RATE};
use verba_foundation::{real_clock, AppError, AudioError, SessionState, StateManager};
use verba_telemetry::PipelineMetrics;

pub struct VoiceSessionConfig {
    pub live: LiveConfig,
    pub input_device: Option<String>,
    pub block_samples: usize,
    pub ring_capacity: usize,
}

impl VoiceSessionConfig {
    pub fn new(live: LiveConfig) -> Self {
        Self {
            live,
            input_device: None,
            block_samples: BLOCK_SAMPLES,
            // Room for ~4 s of 48 kHz stereo before the callback drops
            ring_capacity: 16384 * 4 * 6,
        }
    }
}

/// One live tutoring session, created on start and destroyed on stop; all
/// device and session handles live inside, no process-wide globals.
///
/// `start` performs the Connecting side effects in order — microphone,
/// output device, remote session — and any failure lands in Closed with
/// everything opened so far released.
pub struct VoiceSession {
    state: Arc<StateManager>,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl VoiceSession {
    pub async fn start(
        cfg: VoiceSessionConfig,
        transport: Arc<dyn LiveTransport>,
        metrics: Arc<PipelineMetrics>,
    ) -> Result<Self, AppError> {
        let state = Arc::new(StateManager::new());
        state.transition(SessionState::Connecting)?;

        // Microphone first: a permission failure must close before any
        // network traffic happens.
        let ring = AudioRingBuffer::new(cfg.ring_capacity);
        let (producer, consumer) = ring.split();
        let (capture, device_cfg) =
            match CaptureThread::spawn(producer, cfg.input_device.clone()) {
                Ok(v) => v,
                Err(e) => {
                    let _ = state.transition(SessionState::Closed);
                    return Err(e.into());
                }
            };

        let (play_tx, mut play_rx) = mpsc::unbounded_channel();
        let (playback, play_cfg, scheduler) =
            match PlaybackThread::spawn(play_tx, Some(metrics.clone())) {
                Ok(v) => v,
                Err(e) => {
                    capture.stop();
                    let _ = state.transition(SessionState::Closed);
                    return Err(e.into());
                }
            };

        let mut handle = match transport.connect(&cfg.live).await {
            Ok(h) => h,
            Err(e) => {
                capture.stop();
                playback.stop();
                let _ = state.transition(SessionState::Closed);
                return Err(e.into());
            }
        };

        let controller = Arc::new(
            SessionController::new(
                state.clone(),
                scheduler,
                handle.outbound(),
                metrics.clone(),
            )
            .with_inbound_resampler(INBOUND_SAMPLE_RATE, play_cfg.sample_rate),
        );

        let frame_reader = FrameReader::new(
            consumer,
            device_cfg.sample_rate,
            device_cfg.channels,
            real_clock(),
        );
        let (block_tx, block_rx) = broadcast::channel::<AudioBlock>(64);
        let chunker = BlockChunker::new(
            frame_reader,
            device_cfg,
            block_tx,
            ChunkerConfig {
                block_size_samples: cfg.block_samples,
                sample_rate_hz: CAPTURE_SAMPLE_RATE,
            },
        )
        .with_metrics(metrics.clone());
        let (chunker_handle, chunker_running) = chunker.spawn();

        // Uplink: captured blocks to the outbound queue, gated by state
        let uplink = {
            let controller = controller.clone();
            let mut block_rx = block_rx;
            tokio::spawn(async move {
                loop {
                    match block_rx.recv().await {
                        Ok(block) => controller.forward_block(&block),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!("Uplink lagged, skipped {} blocks", n);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            })
        };

        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut device_check = tokio::time::interval(Duration::from_millis(200));
            loop {
                tokio::select! {
                    ev = handle.events.recv() => match ev {
                        Some(ev) => {
                            if controller.handle_event(ev) == ControlFlow::Shutdown {
                                break;
                            }
                        }
                        None => {
                            controller.close();
                            break;
                        }
                    },
                    pev = play_rx.recv() => {
                        if let Some(pev) = pev {
                            controller.handle_playback(pev);
                        }
                    },
                    _ = stop_rx.changed() => {
                        tracing::info!("User requested session stop");
                        controller.close();
                        break;
                    },
                    _ = device_check.tick() => {
                        if capture.failed() || playback.failed() {
                            controller.fail(&AppError::Audio(AudioError::DeviceDisconnected));
                            break;
                        }
                    }
                }
            }

            // The controller already discarded in-flight playback and closed
            // the outbound queue; now release tasks and device handles.
            chunker_running.store(false, Ordering::SeqCst);
            let _ = chunker_handle.await;
            uplink.abort();
            handle.shutdown();
            capture.stop();
            playback.stop();
            tracing::info!("Voice session torn down");
        });

        Ok(Self {
            state,
            stop_tx,
            task,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state.current()
    }

    /// User-initiated stop; idempotent.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Wait for the session to finish tearing down.
    pub async fn wait(self) {
        let _ = self.task.await;
    }
}
