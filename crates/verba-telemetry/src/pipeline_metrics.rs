use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicI16, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared metrics for cross-thread pipeline monitoring.
///
/// Capture-side counters are written from the audio callback and chunker
/// task; session counters from the outbound writer; playback counters from
/// the output callback. Everything is atomic so readers never contend.
#[derive(Clone)]
pub struct PipelineMetrics {
    // Audio level monitoring
    pub current_peak: Arc<AtomicI16>, // Peak sample value in current window
    pub current_rms: Arc<AtomicU64>,  // RMS * 1000 for precision
    pub audio_level_db: Arc<AtomicI16>, // Current level in dB * 10

    // Pipeline stage tracking
    pub stage_capture: Arc<AtomicBool>,
    pub stage_chunker: Arc<AtomicBool>,
    pub stage_session: Arc<AtomicBool>,
    pub stage_playback: Arc<AtomicBool>,

    // Frame rate tracking
    pub capture_fps: Arc<AtomicU64>, // Frames per second * 10
    pub chunker_fps: Arc<AtomicU64>, // Blocks per second * 10

    // Capture counters
    pub capture_frames: Arc<AtomicU64>,
    pub capture_dropped: Arc<AtomicU64>,

    // Outbound session counters
    pub blocks_sent: Arc<AtomicU64>,
    pub blocks_dropped: Arc<AtomicU64>,

    // Playback counters
    pub segments_scheduled: Arc<AtomicU64>,
    pub segments_completed: Arc<AtomicU64>,
    pub segments_skipped: Arc<AtomicU64>, // malformed inbound payloads
    pub interruptions: Arc<AtomicU64>,

    // Activity indicators
    pub is_speaking: Arc<AtomicBool>, // Peer audio currently scheduled
    pub last_segment_time: Arc<RwLock<Option<Instant>>>,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self {
            current_peak: Arc::new(AtomicI16::new(0)),
            current_rms: Arc::new(AtomicU64::new(0)),
            audio_level_db: Arc::new(AtomicI16::new(-900)),

            stage_capture: Arc::new(AtomicBool::new(false)),
            stage_chunker: Arc::new(AtomicBool::new(false)),
            stage_session: Arc::new(AtomicBool::new(false)),
            stage_playback: Arc::new(AtomicBool::new(false)),

            capture_fps: Arc::new(AtomicU64::new(0)),
            chunker_fps: Arc::new(AtomicU64::new(0)),

            capture_frames: Arc::new(AtomicU64::new(0)),
            capture_dropped: Arc::new(AtomicU64::new(0)),

            blocks_sent: Arc::new(AtomicU64::new(0)),
            blocks_dropped: Arc::new(AtomicU64::new(0)),

            segments_scheduled: Arc::new(AtomicU64::new(0)),
            segments_completed: Arc::new(AtomicU64::new(0)),
            segments_skipped: Arc::new(AtomicU64::new(0)),
            interruptions: Arc::new(AtomicU64::new(0)),

            is_speaking: Arc::new(AtomicBool::new(false)),
            last_segment_time: Arc::new(RwLock::new(None)),
        }
    }
}

impl PipelineMetrics {
    pub fn update_audio_level(&self, samples: &[i16]) {
        if samples.is_empty() {
            return;
        }

        let peak = samples.iter().map(|&s| s.saturating_abs()).max().unwrap_or(0);
        self.current_peak.store(peak, Ordering::Relaxed);

        let sum: i64 = samples.iter().map(|&s| s as i64 * s as i64).sum();
        let rms = ((sum as f64 / samples.len() as f64).sqrt() * 1000.0) as u64;
        self.current_rms.store(rms, Ordering::Relaxed);

        let db = if peak > 0 {
            (20.0 * (peak as f64 / 32768.0).log10() * 10.0) as i16
        } else {
            -900
        };
        self.audio_level_db.store(db, Ordering::Relaxed);
    }

    pub fn mark_stage_active(&self, stage: PipelineStage) {
        match stage {
            PipelineStage::Capture => self.stage_capture.store(true, Ordering::Relaxed),
            PipelineStage::Chunker => self.stage_chunker.store(true, Ordering::Relaxed),
            PipelineStage::Session => self.stage_session.store(true, Ordering::Relaxed),
            PipelineStage::Playback => self.stage_playback.store(true, Ordering::Relaxed),
        }
    }

    pub fn decay_stages(&self) {
        self.stage_capture.store(false, Ordering::Relaxed);
        self.stage_chunker.store(false, Ordering::Relaxed);
        self.stage_session.store(false, Ordering::Relaxed);
        self.stage_playback.store(false, Ordering::Relaxed);
    }

    pub fn update_capture_fps(&self, fps: f64) {
        self.capture_fps.store((fps * 10.0) as u64, Ordering::Relaxed);
    }

    pub fn update_chunker_fps(&self, fps: f64) {
        self.chunker_fps.store((fps * 10.0) as u64, Ordering::Relaxed);
    }

    pub fn increment_capture_frames(&self) {
        self.capture_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_blocks_sent(&self) {
        self.blocks_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn note_segment_scheduled(&self) {
        self.segments_scheduled.fetch_add(1, Ordering::Relaxed);
        self.is_speaking.store(true, Ordering::Relaxed);
        *self.last_segment_time.write() = Some(Instant::now());
    }

    pub fn note_playback_drained(&self) {
        self.is_speaking.store(false, Ordering::Relaxed);
    }

    pub fn increment_interruptions(&self) {
        self.interruptions.fetch_add(1, Ordering::Relaxed);
        self.is_speaking.store(false, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy)]
pub enum PipelineStage {
    Capture,
    Chunker,
    Session,
    Playback,
}

#[derive(Debug)]
pub struct FpsTracker {
    last_update: Instant,
    frame_count: u64,
}

impl FpsTracker {
    pub fn new() -> Self {
        Self {
            last_update: Instant::now(),
            frame_count: 0,
        }
    }

    pub fn tick(&mut self) -> Option<f64> {
        self.frame_count += 1;
        let elapsed = self.last_update.elapsed();

        if elapsed >= Duration::from_secs(1) {
            let fps = self.frame_count as f64 / elapsed.as_secs_f64();
            self.last_update = Instant::now();
            self.frame_count = 0;
            Some(fps)
        } else {
            None
        }
    }
}

impl Default for FpsTracker {
    fn default() -> Self {
        Self::new()
    }
}
