use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Streaming resampler for mono f32 audio using Rubato's sinc interpolation.
///
/// Two call sites share it: the chunker (device rate -> 16 kHz outbound) and
/// the playback path (24 kHz inbound -> device rate when the output device
/// does not run at 24 kHz). Maintains internal buffers so callers can feed
/// arbitrary-sized chunks; output arrives once whole Rubato chunks complete.
pub struct StreamResampler {
    in_rate: u32,
    out_rate: u32,
    resampler: SincFixedIn<f32>,
    input_buffer: Vec<f32>,
    chunk_size: usize,
}

impl StreamResampler {
    pub fn new(in_rate: u32, out_rate: u32) -> Self {
        // 512 samples keeps latency low; speech content does not need the
        // longer filters music would.
        let chunk_size = 512;

        let sinc_params = SincInterpolationParameters {
            sinc_len: 64,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Cubic,
            oversampling_factor: 128,
            window: WindowFunction::Blackman2,
        };

        let resampler = SincFixedIn::<f32>::new(
            out_rate as f64 / in_rate as f64,
            2.0,
            sinc_params,
            chunk_size,
            1, // mono
        )
        .expect("Failed to create Rubato resampler");

        Self {
            in_rate,
            out_rate,
            resampler,
            input_buffer: Vec::with_capacity(chunk_size * 2),
            chunk_size,
        }
    }

    /// Process an arbitrary chunk of mono samples; returns resampled output
    /// at `out_rate`. Same-rate construction is a pass-through.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if self.in_rate == self.out_rate {
            return input.to_vec();
        }

        self.input_buffer.extend_from_slice(input);

        let mut output = Vec::new();
        while self.input_buffer.len() >= self.chunk_size {
            let chunk: Vec<f32> = self.input_buffer.drain(..self.chunk_size).collect();
            let input_frames = vec![chunk];

            match self.resampler.process(&input_frames, None) {
                Ok(frames) => {
                    if let Some(channel) = frames.into_iter().next() {
                        output.extend(channel);
                    }
                }
                Err(e) => {
                    tracing::warn!("Resampler error, dropping chunk: {}", e);
                }
            }
        }

        output
    }

    /// Clear buffered input and the filter state (used across interruptions).
    pub fn reset(&mut self) {
        self.input_buffer.clear();
        self.resampler.reset();
    }

    pub fn input_rate(&self) -> u32 {
        self.in_rate
    }

    pub fn output_rate(&self) -> u32 {
        self.out_rate
    }
}
