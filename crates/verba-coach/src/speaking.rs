use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::{
    CoachError, Content, GenAiClient, GenerateContentRequest, GenerationConfig, InlineData, Part,
};
use crate::level::ProficiencyLevel;
use verba_audio::codec;

/// Structured evaluation of a recorded speaking drill.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakingFeedback {
    /// 0-100 sub-scores.
    pub pronunciation: u8,
    pub fluency: u8,
    pub accuracy: u8,
    /// What the model heard.
    pub transcription: String,
    pub phonetic_issues: Vec<String>,
    pub phrasing_tips: Vec<String>,
    pub evaluation: String,
}

fn speaking_prompt(level: ProficiencyLevel, scenario: &str) -> String {
    format!(
        "The attached audio is a {} English student practicing this scenario: \
         \"{}\". Transcribe what they said, then evaluate pronunciation, fluency, \
         and accuracy for the scenario, each as a 0-100 score. List concrete \
         phonetic issues and phrasing tips.",
        level.target_band(),
        scenario
    )
}

fn speaking_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "pronunciation": { "type": "INTEGER" },
            "fluency": { "type": "INTEGER" },
            "accuracy": { "type": "INTEGER" },
            "transcription": { "type": "STRING" },
            "phoneticIssues": { "type": "ARRAY", "items": { "type": "STRING" } },
            "phrasingTips": { "type": "ARRAY", "items": { "type": "STRING" } },
            "evaluation": { "type": "STRING" }
        },
        "required": [
            "pronunciation", "fluency", "accuracy",
            "transcription", "phoneticIssues", "phrasingTips", "evaluation"
        ]
    })
}

pub(crate) fn speaking_request(
    level: ProficiencyLevel,
    scenario: &str,
    clip: &[u8],
    clip_mime: &str,
) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts: vec![
                Part {
                    text: Some(speaking_prompt(level, scenario)),
                    inline_data: None,
                },
                Part {
                    text: None,
                    inline_data: Some(InlineData {
                        mime_type: clip_mime.to_string(),
                        data: codec::to_transport_text(clip),
                    }),
                },
            ],
        }],
        system_instruction: None,
        generation_config: Some(GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(speaking_schema()),
            ..Default::default()
        }),
    }
}

/// Complete recorded clip + scenario + level in, structured feedback out.
pub async fn request_speaking_feedback(
    client: &GenAiClient,
    model: &str,
    level: ProficiencyLevel,
    scenario: &str,
    clip: &[u8],
    clip_mime: &str,
) -> Result<SpeakingFeedback, CoachError> {
    let request = speaking_request(level, scenario, clip, clip_mime);
    let response = client.generate(model, &request).await?;
    let payload = response.text().ok_or(CoachError::EmptyResponse)?;
    Ok(serde_json::from_str(payload)?)
}
