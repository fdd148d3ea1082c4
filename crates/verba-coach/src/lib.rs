pub mod chat;
pub mod client;
pub mod level;
pub mod speaking;
pub mod writing;

pub use chat::{tutor_reply, ChatRole, ChatTurn, FALLBACK_REPLY};
pub use client::{CoachError, GenAiClient};
pub use level::ProficiencyLevel;
pub use speaking::{request_speaking_feedback, SpeakingFeedback};
pub use writing::{request_writing_feedback, WritingFeedback};
