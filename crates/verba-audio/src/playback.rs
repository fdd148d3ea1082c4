use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

use verba_telemetry::PipelineMetrics;

/// Emitted by the scheduler toward the session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Every tracked segment finished naturally; the peer's turn is over.
    Drained,
}

#[derive(Debug)]
struct ScheduledSegment {
    /// First output-clock sample at which this segment sounds.
    start: u64,
    samples: Vec<f32>,
}

impl ScheduledSegment {
    fn end(&self) -> u64 {
        self.start + self.samples.len() as u64
    }
}

/// Orders inbound audio segments on a virtual timeline and renders them for
/// the output device.
///
/// Two clocks drive it, both counted in output samples:
/// - the *output cursor*: how much audio the device has actually consumed;
/// - the *virtual playhead*: where the next segment may start.
///
/// `schedule` places a segment at `max(playhead, cursor)` — never in the
/// past, but with no gap when the playhead has fallen behind the device —
/// and advances the playhead by the segment length immediately, assuming the
/// segment plays to completion. An interruption discards every tracked
/// segment mid-flight and resets the playhead to zero; the hard cut is
/// deliberate, immediacy matters more than smoothness there.
pub struct PlaybackScheduler {
    sample_rate: u32,
    cursor: u64,
    playhead: u64,
    segments: VecDeque<ScheduledSegment>,
    event_tx: UnboundedSender<PlaybackEvent>,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl PlaybackScheduler {
    pub fn new(sample_rate: u32, event_tx: UnboundedSender<PlaybackEvent>) -> Self {
        Self {
            sample_rate,
            cursor: 0,
            playhead: 0,
            segments: VecDeque::new(),
            event_tx,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Schedule a decoded segment for gapless playback; returns its start
    /// position on the output clock. Empty segments are ignored.
    pub fn schedule(&mut self, samples: Vec<f32>) -> u64 {
        if samples.is_empty() {
            return self.playhead;
        }

        let start = self.playhead.max(self.cursor);
        let len = samples.len() as u64;
        self.segments.push_back(ScheduledSegment { start, samples });
        self.playhead = start + len;

        if let Some(m) = &self.metrics {
            m.note_segment_scheduled();
        }
        tracing::trace!(start, len, "Scheduled playback segment");
        start
    }

    /// Fill `out` with the next run of output samples and advance the
    /// cursor. Called from the device callback; regions not covered by a
    /// segment render as silence. Completed segments leave the tracked set,
    /// and the last one's completion emits [`PlaybackEvent::Drained`].
    pub fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        let window_start = self.cursor;
        let window_end = self.cursor + out.len() as u64;

        for seg in &self.segments {
            if seg.end() <= window_start || seg.start >= window_end {
                continue;
            }
            let from = seg.start.max(window_start);
            let to = seg.end().min(window_end);
            let src_offset = (from - seg.start) as usize;
            let dst_offset = (from - window_start) as usize;
            let n = (to - from) as usize;
            out[dst_offset..dst_offset + n]
                .copy_from_slice(&seg.samples[src_offset..src_offset + n]);
        }

        self.cursor = window_end;

        let had_segments = !self.segments.is_empty();
        let mut completed = 0u64;
        self.segments.retain(|seg| {
            if seg.end() <= window_end {
                completed += 1;
                false
            } else {
                true
            }
        });

        if completed > 0 {
            if let Some(m) = &self.metrics {
                m.segments_completed
                    .fetch_add(completed, std::sync::atomic::Ordering::Relaxed);
            }
        }

        if had_segments && self.segments.is_empty() {
            if let Some(m) = &self.metrics {
                m.note_playback_drained();
            }
            let _ = self.event_tx.send(PlaybackEvent::Drained);
        }
    }

    /// Hard-stop everything in flight and reset the playhead to zero.
    /// A no-op (not an error) when nothing is scheduled.
    pub fn interrupt(&mut self) {
        self.segments.clear();
        self.playhead = 0;
        tracing::debug!("Playback interrupted; virtual playhead reset");
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn playhead(&self) -> u64 {
        self.playhead
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn active_segments(&self) -> usize {
        self.segments.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn scheduler() -> (PlaybackScheduler, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (PlaybackScheduler::new(24_000, tx), rx)
    }

    #[test]
    fn back_to_back_segments_are_gapless() {
        let (mut s, _rx) = scheduler();
        let d1 = 240;
        let d2 = 480;
        let d3 = 120;

        let s1 = s.schedule(vec![0.1; d1]);
        let s2 = s.schedule(vec![0.2; d2]);
        let s3 = s.schedule(vec![0.3; d3]);

        assert_eq!(s1, 0);
        assert_eq!(s2, d1 as u64);
        assert_eq!(s3, (d1 + d2) as u64);
        assert_eq!(s.playhead(), (d1 + d2 + d3) as u64);
    }

    #[test]
    fn render_concatenates_without_overlap() {
        let (mut s, _rx) = scheduler();
        s.schedule(vec![0.5; 4]);
        s.schedule(vec![-0.5; 4]);

        let mut out = vec![0.0f32; 8];
        s.render(&mut out);
        assert_eq!(out, vec![0.5, 0.5, 0.5, 0.5, -0.5, -0.5, -0.5, -0.5]);
    }

    #[test]
    fn late_segment_catches_up_to_the_output_clock() {
        let (mut s, _rx) = scheduler();
        s.schedule(vec![0.1; 100]);

        // Device consumes well past the playhead before the next segment
        let mut out = vec![0.0f32; 500];
        s.render(&mut out);
        assert_eq!(s.cursor(), 500);

        // max(playhead=100, cursor=500) -> starts at the cursor, no gap
        let start = s.schedule(vec![0.2; 50]);
        assert_eq!(start, 500);
        assert_eq!(s.playhead(), 550);
    }

    #[test]
    fn silence_fills_uncovered_regions() {
        let (mut s, _rx) = scheduler();
        let mut out = vec![1.0f32; 16];
        s.render(&mut out);
        assert!(out.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn drained_fires_when_last_segment_completes() {
        let (mut s, mut rx) = scheduler();
        s.schedule(vec![0.1; 10]);
        s.schedule(vec![0.2; 10]);

        let mut out = vec![0.0f32; 10];
        s.render(&mut out);
        assert!(rx.try_recv().is_err());
        assert_eq!(s.active_segments(), 1);

        s.render(&mut out);
        assert_eq!(rx.try_recv().unwrap(), PlaybackEvent::Drained);
        assert_eq!(s.active_segments(), 0);
    }

    #[test]
    fn drained_does_not_fire_for_pure_silence() {
        let (mut s, mut rx) = scheduler();
        let mut out = vec![0.0f32; 64];
        s.render(&mut out);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn interruption_stops_everything_and_resets_playhead() {
        let (mut s, mut rx) = scheduler();
        s.schedule(vec![0.1; 1000]);
        s.schedule(vec![0.2; 1000]);
        assert_eq!(s.active_segments(), 2);

        s.interrupt();
        assert_eq!(s.active_segments(), 0);
        assert_eq!(s.playhead(), 0);

        // The cut is silent immediately, and no Drained fires for it
        let mut out = vec![1.0f32; 32];
        s.render(&mut out);
        assert!(out.iter().all(|&x| x == 0.0));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn interruption_with_nothing_scheduled_is_a_noop() {
        let (mut s, _rx) = scheduler();
        s.interrupt();
        assert_eq!(s.playhead(), 0);
        assert_eq!(s.active_segments(), 0);
    }

    #[test]
    fn scheduling_resumes_immediately_after_interruption() {
        let (mut s, _rx) = scheduler();
        s.schedule(vec![0.1; 100]);
        let mut out = vec![0.0f32; 60];
        s.render(&mut out);

        s.interrupt();
        // Playhead reset to zero, but the cursor is at 60: the next segment
        // starts right where the device is, not in the past.
        let start = s.schedule(vec![0.2; 10]);
        assert_eq!(start, 60);
    }

    #[test]
    fn empty_segment_is_ignored() {
        let (mut s, _rx) = scheduler();
        s.schedule(Vec::new());
        assert_eq!(s.active_segments(), 0);
        assert_eq!(s.playhead(), 0);
    }
}
