//! PCM frame codec: floating samples <-> 16-bit little-endian frames, and
//! raw bytes <-> the base64 text that rides inside transport envelopes.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("PCM byte length {0} is not a whole number of 16-bit samples")]
    TruncatedSample(usize),

    #[error("Channel count must be non-zero")]
    ZeroChannels,
}

/// Encode floating samples in [-1, 1] as 16-bit signed little-endian PCM.
///
/// Out-of-range input saturates to ±32767 instead of wrapping; the wrapping
/// overflow some encoders exhibit turns a mildly hot signal into full-scale
/// noise, so saturation is the deliberate choice here.
pub fn encode_frame(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let scaled = (s * 32768.0) as i32;
        let v = scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode 16-bit signed little-endian PCM into per-channel floating samples.
///
/// Interleaved input: sample `i` belongs to channel `i % channels`.
pub fn decode_frame(bytes: &[u8], channels: usize) -> Result<Vec<Vec<f32>>, CodecError> {
    if channels == 0 {
        return Err(CodecError::ZeroChannels);
    }
    if bytes.len() % 2 != 0 {
        return Err(CodecError::TruncatedSample(bytes.len()));
    }

    let total = bytes.len() / 2;
    let per_channel = total.div_ceil(channels);
    let mut out: Vec<Vec<f32>> = (0..channels)
        .map(|_| Vec::with_capacity(per_channel))
        .collect();
    for (i, pair) in bytes.chunks_exact(2).enumerate() {
        let v = i16::from_le_bytes([pair[0], pair[1]]);
        out[i % channels].push(v as f32 / 32768.0);
    }
    Ok(out)
}

/// Raw bytes -> ASCII-safe transport text (standard base64).
pub fn to_transport_text(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Transport text -> raw bytes. Exact inverse of [`to_transport_text`].
pub fn from_transport_text(text: &str) -> Result<Vec<u8>, CodecError> {
    Ok(BASE64.decode(text)?)
}
