pub mod capture;
pub mod chunker;
pub mod codec;
pub mod frame_reader;
pub mod playback;
pub mod resampler;
pub mod ring_buffer;
pub mod sink;

// Public API
pub use capture::{CaptureThread, DeviceConfig};
pub use chunker::{AudioBlock, BlockChunker, ChunkerConfig};
pub use codec::{decode_frame, encode_frame, from_transport_text, to_transport_text, CodecError};
pub use frame_reader::FrameReader;
pub use playback::{PlaybackEvent, PlaybackScheduler};
pub use resampler::StreamResampler;
pub use ring_buffer::AudioRingBuffer;
pub use sink::{PlaybackConfig, PlaybackThread};

/// Outbound capture format: what the remote peer expects.
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;
/// Inbound synthesis format: what the remote peer produces.
pub const INBOUND_SAMPLE_RATE: u32 = 24_000;
/// Samples per outbound block (~256 ms at 16 kHz).
pub const BLOCK_SAMPLES: usize = 4096;
