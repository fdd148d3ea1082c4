use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::ring_buffer::AudioProducer;
use verba_foundation::AudioError;

/// Negotiated input device parameters; the chunker needs these to fold and
/// resample toward the outbound 16 kHz mono format.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

/// A timestamped run of interleaved device samples.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    pub timestamp: Instant,
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, Default)]
pub struct CaptureStats {
    pub frames_captured: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub last_frame_time: RwLock<Option<Instant>>,
}

/// Handle to the dedicated OS thread that owns the cpal input stream.
///
/// The microphone stays open for the whole session; it is released only when
/// [`CaptureThread::stop`] runs, never while the peer is merely speaking. A
/// stream error raises the failure flag instead of restarting in place: the
/// session controller observes it and closes the whole session.
pub struct CaptureThread {
    handle: JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
    pub stats: Arc<CaptureStats>,
}

impl CaptureThread {
    pub fn spawn(
        audio_producer: AudioProducer,
        device_name: Option<String>,
    ) -> Result<(Self, DeviceConfig), AudioError> {
        let running = Arc::new(AtomicBool::new(true));
        let shutdown = running.clone();
        let failed = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(CaptureStats::default());

        let startup: Arc<RwLock<Option<Result<DeviceConfig, AudioError>>>> =
            Arc::new(RwLock::new(None));
        let startup_clone = startup.clone();
        let failed_clone = failed.clone();
        let stats_clone = stats.clone();

        let handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                let mut engine = CaptureEngine::new(
                    audio_producer,
                    running.clone(),
                    failed_clone.clone(),
                    stats_clone,
                );

                match engine.start(device_name.as_deref()) {
                    Ok(cfg) => {
                        tracing::info!(
                            rate = cfg.sample_rate,
                            channels = cfg.channels,
                            "Audio capture started"
                        );
                        *startup_clone.write() = Some(Ok(cfg));
                    }
                    Err(e) => {
                        tracing::error!("Failed to start audio capture: {}", e);
                        *startup_clone.write() = Some(Err(e));
                        return;
                    }
                }

                while running.load(Ordering::Relaxed) {
                    if failed_clone.load(Ordering::SeqCst) {
                        tracing::error!("Capture stream failed; leaving stream down");
                        break;
                    }
                    thread::sleep(Duration::from_millis(100));
                }

                tracing::info!("Audio capture thread shutting down");
                engine.stop();
            })
            .map_err(|e| AudioError::Fatal(format!("Failed to spawn audio thread: {}", e)))?;

        // Wait for the thread to report its negotiated config (or its error)
        let start = Instant::now();
        loop {
            if let Some(outcome) = startup.write().take() {
                let cfg = outcome?;
                return Ok((
                    Self {
                        handle,
                        shutdown,
                        failed,
                        stats,
                    },
                    cfg,
                ));
            }
            if start.elapsed() > Duration::from_secs(3) {
                return Err(AudioError::Fatal(
                    "Capture thread did not report a device configuration".to_string(),
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

struct CaptureEngine {
    stream: Option<Stream>,
    audio_producer: Arc<Mutex<AudioProducer>>,
    running: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
    stats: Arc<CaptureStats>,
}

impl CaptureEngine {
    fn new(
        audio_producer: AudioProducer,
        running: Arc<AtomicBool>,
        failed: Arc<AtomicBool>,
        stats: Arc<CaptureStats>,
    ) -> Self {
        Self {
            stream: None,
            audio_producer: Arc::new(Mutex::new(audio_producer)),
            running,
            failed,
            stats,
        }
    }

    fn start(&mut self, device_name: Option<&str>) -> Result<DeviceConfig, AudioError> {
        let device = open_input_device(device_name)?;
        if let Ok(n) = device.name() {
            tracing::info!("Selected input device: {}", n);
        }
        let (config, sample_format) = negotiate_input_config(&device)?;

        let device_config = DeviceConfig {
            sample_rate: config.sample_rate.0,
            channels: config.channels,
        };

        let stream = self.build_stream(device, config, sample_format)?;
        stream.play()?;
        self.stream = Some(stream);
        Ok(device_config)
    }

    fn build_stream(
        &mut self,
        device: cpal::Device,
        config: StreamConfig,
        sample_format: SampleFormat,
    ) -> Result<Stream, AudioError> {
        let audio_producer = Arc::clone(&self.audio_producer);
        let stats = Arc::clone(&self.stats);
        let running = Arc::clone(&self.running);
        let failed = Arc::clone(&self.failed);

        let err_fn = move |err: cpal::StreamError| {
            tracing::error!("Audio input stream error: {}", err);
            failed.store(true, Ordering::SeqCst);
        };

        // Common handler after conversion to i16
        let handle_i16 = move |i16_data: &[i16]| {
            if !running.load(Ordering::SeqCst) {
                return;
            }
            if let Ok(written) = audio_producer.lock().write(i16_data) {
                if written == i16_data.len() {
                    stats.frames_captured.fetch_add(1, Ordering::Relaxed);
                } else {
                    stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                }
            } else {
                stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
            }
            *stats.last_frame_time.write() = Some(Instant::now());
        };

        // Thread-local scratch avoids allocating in the audio callback
        thread_local! {
            static CONVERT_BUFFER: std::cell::RefCell<Vec<i16>> =
                const { std::cell::RefCell::new(Vec::new()) };
        }

        let stream = match sample_format {
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &_| {
                    handle_i16(data);
                },
                err_fn,
                None,
            )?,
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &_| {
                    CONVERT_BUFFER.with(|buf| {
                        let mut converted = buf.borrow_mut();
                        converted.clear();
                        converted.reserve(data.len());
                        for &s in data {
                            let clamped = s.clamp(-1.0, 1.0);
                            converted.push((clamped * 32767.0).round() as i16);
                        }
                        handle_i16(&converted);
                    });
                },
                err_fn,
                None,
            )?,
            SampleFormat::U16 => device.build_input_stream(
                &config,
                move |data: &[u16], _: &_| {
                    CONVERT_BUFFER.with(|buf| {
                        let mut converted = buf.borrow_mut();
                        converted.clear();
                        converted.reserve(data.len());
                        // Unsigned [0,65535] to signed [-32768,32767]
                        for &s in data {
                            converted.push((s as i32 - 32768) as i16);
                        }
                        handle_i16(&converted);
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

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(stream) = self.stream.take() {
            drop(stream);
        }
    }
}

fn open_input_device(device_name: Option<&str>) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();
    match device_name {
        Some(name) => host
            .input_devices()
            .map_err(|e| AudioError::Fatal(e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| AudioError::DeviceNotFound {
                name: Some(name.to_string()),
            }),
        None => host
            .default_input_device()
            .ok_or(AudioError::DeviceNotFound { name: None }),
    }
}

fn negotiate_input_config(
    device: &cpal::Device,
) -> Result<(StreamConfig, SampleFormat), AudioError> {
    let default_config = device.default_input_config()?;
    Ok((
        StreamConfig {
            channels: default_config.channels(),
            sample_rate: default_config.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        },
        default_config.sample_format(),
    ))
}
