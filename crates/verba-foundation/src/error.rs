use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Audio subsystem error: {0}")]
    Audio(#[from] AudioError),

    #[error("Live session error: {0}")]
    Session(#[from] SessionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Shutdown requested")]
    ShutdownRequested,

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Input device not found: {name:?}")]
    DeviceNotFound { name: Option<String> },

    #[error("Output device not found")]
    OutputDeviceNotFound,

    #[error("Device disconnected")]
    DeviceDisconnected,

    #[error("Format not supported: {format}")]
    FormatNotSupported { format: String },

    #[error("Buffer overflow, dropped {count} samples")]
    BufferOverflow { count: usize },

    #[error("CPAL error: {0}")]
    Cpal(#[from] cpal::StreamError),

    #[error("Build stream error: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Play stream error: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("Default stream config error: {0}")]
    DefaultStreamConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

/// Errors from the streaming session to the remote inference peer.
///
/// Every variant is session-fatal: the controller transitions to `Closed`
/// and releases audio resources (a half-open session is worse than a clean
/// stop). Per-message decode problems are NOT represented here; those are
/// logged and skipped by the transport reader.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to connect to the inference peer: {0}")]
    Connect(String),

    #[error("Session handshake failed: {0}")]
    Handshake(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Session closed by the remote peer: {0}")]
    RemoteClosed(String),

    #[error("Outbound channel closed")]
    OutboundClosed,
}
