use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::playback::{PlaybackEvent, PlaybackScheduler};
use tokio::sync::mpsc::UnboundedSender;
use verba_foundation::AudioError;
use verba_telemetry::PipelineMetrics;

/// Negotiated output device parameters.
///
/// Inbound segments arrive at 24 kHz; when the device runs at another rate
/// the session resamples each segment before scheduling, so the scheduler's
/// timeline is always counted in device samples.
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Handle to the dedicated OS thread that owns the cpal output stream.
///
/// The stream callback locks the shared scheduler and renders mono audio,
/// duplicated across the device's channels. Mirrors the capture thread's
/// lifecycle: a stream error raises the failure flag and the session closes.
pub struct PlaybackThread {
    handle: JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
}

impl PlaybackThread {
    pub fn spawn(
        event_tx: UnboundedSender<PlaybackEvent>,
        metrics: Option<Arc<PipelineMetrics>>,
    ) -> Result<(Self, PlaybackConfig, Arc<Mutex<PlaybackScheduler>>), AudioError> {
        let running = Arc::new(AtomicBool::new(true));
        let shutdown = running.clone();
        let failed = Arc::new(AtomicBool::new(false));

        type Startup = Option<Result<(PlaybackConfig, Arc<Mutex<PlaybackScheduler>>), AudioError>>;
        let startup: Arc<RwLock<Startup>> = Arc::new(RwLock::new(None));
        let startup_clone = startup.clone();
        let failed_clone = failed.clone();

        let handle = thread::Builder::new()
            .name("audio-playback".to_string())
            .spawn(move || {
                let (device, config, sample_format) = match open_output_device() {
                    Ok(parts) => parts,
                    Err(e) => {
                        tracing::error!("Failed to open output device: {}", e);
                        *startup_clone.write() = Some(Err(e));
                        return;
                    }
                };

                let playback_config = PlaybackConfig {
                    sample_rate: config.sample_rate.0,
                    channels: config.channels,
                };

                let mut scheduler = PlaybackScheduler::new(playback_config.sample_rate, event_tx);
                if let Some(m) = metrics {
                    scheduler = scheduler.with_metrics(m);
                }
                let scheduler = Arc::new(Mutex::new(scheduler));

                let stream = match build_output_stream(
                    device,
                    config,
                    sample_format,
                    scheduler.clone(),
                    failed_clone.clone(),
                ) {
                    Ok(s) => s,
                    Err(e) => {
                        *startup_clone.write() = Some(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    *startup_clone.write() = Some(Err(e.into()));
                    return;
                }

                tracing::info!(
                    rate = playback_config.sample_rate,
                    channels = playback_config.channels,
                    "Audio playback started"
                );
                *startup_clone.write() = Some(Ok((playback_config, scheduler)));

                while running.load(Ordering::Relaxed) {
                    if failed_clone.load(Ordering::SeqCst) {
                        tracing::error!("Playback stream failed; leaving stream down");
                        break;
                    }
                    thread::sleep(Duration::from_millis(100));
                }

                tracing::info!("Audio playback thread shutting down");
                drop(stream);
            })
            .map_err(|e| AudioError::Fatal(format!("Failed to spawn playback thread: {}", e)))?;

        let start = Instant::now();
        loop {
            if let Some(outcome) = startup.write().take() {
                let (cfg, scheduler) = outcome?;
                return Ok((
                    Self {
                        handle,
                        shutdown,
                        failed,
                    },
                    cfg,
                    scheduler,
                ));
            }
            if start.elapsed() > Duration::from_secs(3) {
                return Err(AudioError::Fatal(
                    "Playback thread did not report a device configuration".to_string(),
                ));
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    /// True once the underlying stream has errored; the session must close.
    pub fn failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn stop(self) {
        self.shutdown.store(false, Ordering::Relaxed);
        let _ = self.handle.join();
    }
}

fn open_output_device() -> Result<(cpal::Device, StreamConfig, SampleFormat), AudioError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(AudioError::OutputDeviceNotFound)?;
    if let Ok(n) = device.name() {
        tracing::info!("Selected output device: {}", n);
    }

    let default_config = device.default_output_config()?;
    Ok((
        device,
        StreamConfig {
            channels: default_config.channels(),
            sample_rate: default_config.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        },
        default_config.sample_format(),
    ))
}

fn build_output_stream(
    device: cpal::Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    scheduler: Arc<Mutex<PlaybackScheduler>>,
    failed: Arc<AtomicBool>,
) -> Result<Stream, AudioError> {
    let channels = config.channels as usize;

    let err_fn = move |err: cpal::StreamError| {
        tracing::error!("Audio output stream error: {}", err);
        failed.store(true, Ordering::SeqCst);
    };

    // Mono scratch buffer, duplicated across device channels per frame
    thread_local! {
        static RENDER_BUFFER: std::cell::RefCell<Vec<f32>> =
            const { std::cell::RefCell::new(Vec::new()) };
    }

    let render_mono = move |frames: usize, fill: &mut dyn FnMut(&[f32])| {
        RENDER_BUFFER.with(|buf| {
            let mut mono = buf.borrow_mut();
            mono.clear();
            mono.resize(frames, 0.0);
            scheduler.lock().render(&mut mono);
            fill(&mono);
        });
    };

    let stream = match sample_format {
        SampleFormat::F32 => device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &_| {
                let frames = data.len() / channels;
                render_mono(frames, &mut |mono| {
                    for (frame, &s) in data.chunks_exact_mut(channels).zip(mono) {
                        frame.fill(s);
                    }
                });
            },
            err_fn,
            None,
        )?,
        SampleFormat::I16 => device.build_output_stream(
            &config,
            move |data: &mut [i16], _: &_| {
                let frames = data.len() / channels;
                render_mono(frames, &mut |mono| {
                    for (frame, &s) in data.chunks_exact_mut(channels).zip(mono) {
                        let v = (s.clamp(-1.0, 1.0) * 32767.0).round() as i16;
                        frame.fill(v);
                    }
                });
            },
            err_fn,
            None,
        )?,
        SampleFormat::U16 => device.build_output_stream(
            &config,
            move |data: &mut [u16], _: &_| {
                let frames = data.len() / channels;
                render_mono(frames, &mut |mono| {
                    for (frame, &s) in data.chunks_exact_mut(channels).zip(mono) {
                        let v = ((s.clamp(-1.0, 1.0) * 32767.0).round() as i32 + 32768) as u16;
                        frame.fill(v);
                    }
                });
            },
            err_fn,
            None,
        )?,
        other => {
            return Err(AudioError::FormatNotSupported {
                format: format!("{:?}", other),
            });
        }
    };

    Ok(stream)
}
