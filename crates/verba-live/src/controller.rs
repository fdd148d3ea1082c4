use std::sync::Arc;

use parking_lot::Mutex;

use crate::outbound::{OutboundQueue, PushOutcome};
use crate::protocol::{AudioEnvelope, LiveEvent};
use verba_audio::chunker::AudioBlock;
use verba_audio::codec;
use verba_audio::playback::{PlaybackEvent, PlaybackScheduler};
use verba_audio::resampler::StreamResampler;
use verba_foundation::{AppError, SessionState, StateManager};
use verba_telemetry::{PipelineMetrics, PipelineStage};

/// Whether the session event loop should keep running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    Continue,
    Shutdown,
}

/// Owns the session state machine and mediates between the three moving
/// parts: capture blocks going out, inbound events coming in, and the
/// playback scheduler's completion signals.
///
/// Deliberately device-free: the runtime wrapper owns microphones and
/// output streams, so every state/scheduling decision here is testable
/// against fakes.
pub struct SessionController {
    state: Arc<StateManager>,
    scheduler: Arc<Mutex<PlaybackScheduler>>,
    outbound: Arc<OutboundQueue>,
    metrics: Arc<PipelineMetrics>,
    /// Present when the output device does not run at the inbound 24 kHz.
    inbound_resampler: Mutex<Option<StreamResampler>>,
}

impl SessionController {
    pub fn new(
        state: Arc<StateManager>,
        scheduler: Arc<Mutex<PlaybackScheduler>>,
        outbound: Arc<OutboundQueue>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            state,
            scheduler,
            outbound,
            metrics,
            inbound_resampler: Mutex::new(None),
        }
    }

    /// Resample inbound segments from `from_rate` to the device rate before
    /// scheduling them.
    pub fn with_inbound_resampler(self, from_rate: u32, device_rate: u32) -> Self {
        if from_rate != device_rate {
            *self.inbound_resampler.lock() = Some(StreamResampler::new(from_rate, device_rate));
        }
        self
    }

    pub fn state(&self) -> SessionState {
        self.state.current()
    }

    /// User-initiated start: Idle -> Connecting.
    pub fn begin(&self) -> Result<(), AppError> {
        self.state.transition(SessionState::Connecting)
    }

    /// Startup failed (microphone denied, device missing, transport down):
    /// straight to Closed, no retry.
    pub fn fail(&self, err: &AppError) {
        tracing::error!("Session failed: {}", err);
        self.close();
    }

    /// Terminal cleanup, shared by errors, remote close, and user stop.
    /// In-flight playback is discarded before anything else so no source
    /// outlives the session.
    pub fn close(&self) {
        self.scheduler.lock().interrupt();
        self.outbound.close();
        if self.state.current() != SessionState::Closed {
            let _ = self.state.transition(SessionState::Closed);
        }
    }

    /// One classified inbound event.
    pub fn handle_event(&self, event: LiveEvent) -> ControlFlow {
        match event {
            LiveEvent::SetupComplete => {
                if self.state.current() == SessionState::Connecting {
                    let _ = self.state.transition(SessionState::Listening);
                } else {
                    tracing::debug!("Ignoring setup acknowledgment outside Connecting");
                }
                ControlFlow::Continue
            }
            LiveEvent::Audio { pcm } => {
                self.handle_audio(&pcm);
                ControlFlow::Continue
            }
            LiveEvent::Interrupted => {
                self.scheduler.lock().interrupt();
                if let Some(rs) = self.inbound_resampler.lock().as_mut() {
                    rs.reset();
                }
                self.metrics.increment_interruptions();
                if self.state.current() == SessionState::Speaking {
                    let _ = self.state.transition(SessionState::Listening);
                }
                ControlFlow::Continue
            }
            LiveEvent::TurnComplete => {
                // The Speaking -> Listening edge is driven by the scheduler
                // draining, not by this flag: audio may still be playing.
                tracing::debug!("Peer marked its turn complete");
                ControlFlow::Continue
            }
            LiveEvent::Empty => ControlFlow::Continue,
            LiveEvent::Closed { reason } => {
                tracing::info!("Session closed by peer: {}", reason);
                self.close();
                ControlFlow::Shutdown
            }
            LiveEvent::TransportError { message } => {
                self.fail(&AppError::Session(
                    verba_foundation::SessionError::Transport(message),
                ));
                ControlFlow::Shutdown
            }
        }
    }

    fn handle_audio(&self, pcm: &[u8]) {
        if !self.state.current().is_streaming() {
            tracing::debug!("Dropping inbound audio outside Listening/Speaking");
            return;
        }

        let mono = match codec::decode_frame(pcm, 1) {
            Ok(mut channels) => channels.swap_remove(0),
            Err(e) => {
                // Recoverable: skip this segment, keep the session alive
                tracing::warn!("Skipping undecodable inbound segment: {}", e);
                self.metrics
                    .segments_skipped
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                return;
            }
        };

        let samples = match self.inbound_resampler.lock().as_mut() {
            Some(rs) => rs.process(&mono),
            None => mono,
        };
        if samples.is_empty() {
            return;
        }

        self.scheduler.lock().schedule(samples);
        self.metrics.mark_stage_active(PipelineStage::Playback);

        if self.state.current() == SessionState::Listening {
            let _ = self.state.transition(SessionState::Speaking);
        }
    }

    /// Completion signal from the playback scheduler.
    pub fn handle_playback(&self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::Drained => {
                if self.state.current() == SessionState::Speaking {
                    let _ = self.state.transition(SessionState::Listening);
                }
            }
        }
    }

    /// One captured block, fire-and-forget. Blocks outside the streaming
    /// states are discarded; the state is read, never written, here.
    pub fn forward_block(&self, block: &AudioBlock) {
        if !self.state.current().is_streaming() {
            return;
        }

        let bytes = codec::encode_frame(&block.samples);
        let envelope = AudioEnvelope::from_pcm(&bytes);
        match self.outbound.push(envelope) {
            PushOutcome::Queued => {
                self.metrics.increment_blocks_sent();
                self.metrics.mark_stage_active(PipelineStage::Session);
            }
            PushOutcome::DroppedOldest => {
                self.metrics.increment_blocks_sent();
                self.metrics
                    .blocks_dropped
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
            PushOutcome::Closed => {}
        }
    }
}
