pub mod controller;
pub mod outbound;
pub mod protocol;
pub mod session;
pub mod transport;

// Public API
pub use controller::SessionController;
pub use outbound::{OutboundQueue, PushOutcome};
pub use protocol::{classify, AudioEnvelope, LiveConfig, LiveEvent, ProtocolError};
pub use session::{VoiceSession, VoiceSessionConfig};
pub use transport::{LiveTransport, SessionHandle, WsTransport};
