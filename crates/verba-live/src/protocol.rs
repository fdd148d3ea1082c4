//! Wire types for the bidirectional inference session.
//!
//! Outbound frames are JSON envelopes carrying base64 PCM; inbound frames
//! are classified into exactly one [`LiveEvent`] before the controller sees
//! them, so nothing downstream probes nested optional fields.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use verba_audio::codec::{self, CodecError};

/// Mime tag for outbound capture blocks; the rate is part of the contract.
pub const OUTBOUND_MIME: &str = "audio/pcm;rate=16000";

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed server message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed audio payload: {0}")]
    Payload(#[from] CodecError),
}

/// Session parameters sent in the setup message.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub model: String,
    pub voice: String,
    pub system_instruction: String,
}

/// A mime-tagged, base64-encoded audio payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AudioEnvelope {
    pub mime_type: String,
    pub data: String,
}

impl AudioEnvelope {
    /// Wrap an encoded 16 kHz PCM block for transport.
    pub fn from_pcm(bytes: &[u8]) -> Self {
        Self {
            mime_type: OUTBOUND_MIME.to_string(),
            data: codec::to_transport_text(bytes),
        }
    }
}

/// One inbound message, already decoded and classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    /// The peer acknowledged session setup; streaming may begin.
    SetupComplete,
    /// A synthesized audio segment (raw 16-bit little-endian PCM, 24 kHz mono).
    Audio { pcm: Vec<u8> },
    /// The peer cancelled its in-flight speech (the user barged in).
    Interrupted,
    /// The peer finished a response turn.
    TurnComplete,
    /// A message carrying nothing this subsystem consumes.
    Empty,
    /// Transport-level: the peer closed the session.
    Closed { reason: String },
    /// Transport-level: the connection failed.
    TransportError { message: String },
}

// ── Client messages ─────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SetupMessage<'a> {
    setup: Setup<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Setup<'a> {
    model: &'a str,
    generation_config: GenerationConfig<'a>,
    system_instruction: Content<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_modalities: [&'a str; 1],
    speech_config: SpeechConfig<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig<'a> {
    voice_config: VoiceConfig<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig<'a> {
    prebuilt_voice_config: PrebuiltVoiceConfig<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig<'a> {
    voice_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Content<'a> {
    parts: [TextPart<'a>; 1],
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RealtimeInputMessage<'a> {
    realtime_input: RealtimeInput<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RealtimeInput<'a> {
    media_chunks: [&'a AudioEnvelope; 1],
}

/// Serialize the session-open message: audio-only response modality, a voice
/// identity, and the level-specific system instruction.
pub fn setup_message(cfg: &LiveConfig) -> String {
    let msg = SetupMessage {
        setup: Setup {
            model: &cfg.model,
            generation_config: GenerationConfig {
                response_modalities: ["AUDIO"],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: &cfg.voice,
                        },
                    },
                },
            },
            system_instruction: Content {
                parts: [TextPart {
                    text: &cfg.system_instruction,
                }],
            },
        },
    };
    serde_json::to_string(&msg).expect("setup message serialization cannot fail")
}

/// Serialize one outbound capture block.
pub fn realtime_input(envelope: &AudioEnvelope) -> String {
    let msg = RealtimeInputMessage {
        realtime_input: RealtimeInput {
            media_chunks: [envelope],
        },
    };
    serde_json::to_string(&msg).expect("realtime input serialization cannot fail")
}

// ── Server messages ─────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerMessage {
    setup_complete: Option<serde_json::Value>,
    server_content: Option<ServerContent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerContent {
    model_turn: Option<ModelTurn>,
    #[serde(default)]
    interrupted: Option<bool>,
    #[serde(default)]
    turn_complete: Option<bool>,
}

#[derive(Deserialize)]
struct ModelTurn {
    parts: Vec<Part>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    inline_data: Option<InlineData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[allow(dead_code)]
    mime_type: Option<String>,
    data: String,
}

/// Classify one raw inbound frame as exactly one event.
///
/// An interruption outranks audio delivered in the same message: scheduling
/// a segment just to cancel it in the same breath is pointless. Base64 and
/// JSON failures surface as recoverable errors; the caller logs and skips.
pub fn classify(raw: &str) -> Result<LiveEvent, ProtocolError> {
    let msg: ServerMessage = serde_json::from_str(raw)?;

    if msg.setup_complete.is_some() {
        return Ok(LiveEvent::SetupComplete);
    }

    let Some(content) = msg.server_content else {
        return Ok(LiveEvent::Empty);
    };

    if content.interrupted.unwrap_or(false) {
        return Ok(LiveEvent::Interrupted);
    }

    if let Some(turn) = content.model_turn {
        if let Some(inline) = turn.parts.into_iter().find_map(|p| p.inline_data) {
            let pcm = codec::from_transport_text(&inline.data)?;
            return Ok(LiveEvent::Audio { pcm });
        }
    }

    if content.turn_complete.unwrap_or(false) {
        return Ok(LiveEvent::TurnComplete);
    }

    Ok(LiveEvent::Empty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_message_carries_modality_voice_and_instruction() {
        let cfg = LiveConfig {
            model: "models/test-native-audio".to_string(),
            voice: "Zephyr".to_string(),
            system_instruction: "Tutor the user.".to_string(),
        };
        let json: serde_json::Value = serde_json::from_str(&setup_message(&cfg)).unwrap();
        assert_eq!(json["setup"]["model"], "models/test-native-audio");
        assert_eq!(
            json["setup"]["generationConfig"]["responseModalities"][0],
            "AUDIO"
        );
        assert_eq!(
            json["setup"]["generationConfig"]["speechConfig"]["voiceConfig"]
                ["prebuiltVoiceConfig"]["voiceName"],
            "Zephyr"
        );
        assert_eq!(
            json["setup"]["systemInstruction"]["parts"][0]["text"],
            "Tutor the user."
        );
    }

    #[test]
    fn realtime_input_wraps_one_chunk_with_the_outbound_mime() {
        let env = AudioEnvelope::from_pcm(&[1, 2, 3, 4]);
        let json: serde_json::Value = serde_json::from_str(&realtime_input(&env)).unwrap();
        let chunk = &json["realtimeInput"]["mediaChunks"][0];
        assert_eq!(chunk["mimeType"], OUTBOUND_MIME);
        assert_eq!(chunk["data"], codec::to_transport_text(&[1, 2, 3, 4]));
    }

    #[test]
    fn classifies_setup_complete() {
        let ev = classify(r#"{"setupComplete": {}}"#).unwrap();
        assert_eq!(ev, LiveEvent::SetupComplete);
    }

    #[test]
    fn classifies_audio_segment() {
        let data = codec::to_transport_text(&[0, 1, 254, 255]);
        let raw = format!(
            r#"{{"serverContent":{{"modelTurn":{{"parts":[{{"inlineData":{{"mimeType":"audio/pcm;rate=24000","data":"{}"}}}}]}}}}}}"#,
            data
        );
        let ev = classify(&raw).unwrap();
        assert_eq!(
            ev,
            LiveEvent::Audio {
                pcm: vec![0, 1, 254, 255]
            }
        );
    }

    #[test]
    fn interruption_outranks_audio_in_the_same_message() {
        let data = codec::to_transport_text(&[0u8; 4]);
        let raw = format!(
            r#"{{"serverContent":{{"interrupted":true,"modelTurn":{{"parts":[{{"inlineData":{{"data":"{}"}}}}]}}}}}}"#,
            data
        );
        assert_eq!(classify(&raw).unwrap(), LiveEvent::Interrupted);
    }

    #[test]
    fn classifies_turn_complete() {
        let ev = classify(r#"{"serverContent":{"turnComplete":true}}"#).unwrap();
        assert_eq!(ev, LiveEvent::TurnComplete);
    }

    #[test]
    fn unknown_shapes_classify_as_empty() {
        assert_eq!(classify(r#"{}"#).unwrap(), LiveEvent::Empty);
        assert_eq!(
            classify(r#"{"serverContent":{}}"#).unwrap(),
            LiveEvent::Empty
        );
        assert_eq!(
            classify(r#"{"serverContent":{"modelTurn":{"parts":[{"text":"hi"}]}}}"#).unwrap(),
            LiveEvent::Empty
        );
    }

    #[test]
    fn malformed_base64_is_a_recoverable_error() {
        let raw = r#"{"serverContent":{"modelTurn":{"parts":[{"inlineData":{"data":"!!!not-base64!!!"}}]}}}"#;
        assert!(matches!(
            classify(raw),
            Err(ProtocolError::Payload(CodecError::Base64(_)))
        ));
    }

    #[test]
    fn malformed_json_is_a_recoverable_error() {
        assert!(matches!(
            classify("not json at all"),
            Err(ProtocolError::Json(_))
        ));
    }
}
