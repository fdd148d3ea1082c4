use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::{CoachError, Content, GenAiClient, GenerateContentRequest, GenerationConfig};
use crate::level::ProficiencyLevel;

/// Structured evaluation of a writing sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WritingFeedback {
    /// Estimated CEFR level of the text.
    pub score: String,
    pub corrections: Vec<String>,
    pub vocabulary_suggestions: Vec<String>,
    pub general_feedback: String,
}

fn writing_prompt(level: ProficiencyLevel, text: &str) -> String {
    format!(
        "Evaluate the following text for a {} English student. Provide feedback on \
         grammar, vocabulary, and structure. Suggest 3 improvements. Text: \"{}\"",
        level.target_band(),
        text
    )
}

fn writing_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "score": { "type": "STRING", "description": "Estimated CEFR level" },
            "corrections": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Specific grammatical corrections"
            },
            "vocabularySuggestions": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Better word choices"
            },
            "generalFeedback": { "type": "STRING" }
        },
        "required": ["score", "corrections", "vocabularySuggestions", "generalFeedback"]
    })
}

pub(crate) fn writing_request(level: ProficiencyLevel, text: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content::text(Some("user"), writing_prompt(level, text))],
        system_instruction: None,
        generation_config: Some(GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(writing_schema()),
            ..Default::default()
        }),
    }
}

/// Raw text + level in, structured feedback out.
///
/// The error is typed so the caller can show its own fallback; the UI flow
/// treats any failure as "no feedback this time", never a crash.
pub async fn request_writing_feedback(
    client: &GenAiClient,
    model: &str,
    level: ProficiencyLevel,
    text: &str,
) -> Result<WritingFeedback, CoachError> {
    let request = writing_request(level, text);
    let response = client.generate(model, &request).await?;
    let payload = response.text().ok_or(CoachError::EmptyResponse)?;
    Ok(serde_json::from_str(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_band_and_text() {
        let prompt = writing_prompt(ProficiencyLevel::Intermediate, "I has a cold.");
        assert!(prompt.contains("B1"));
        assert!(prompt.contains("I has a cold."));
    }

    #[test]
    fn request_constrains_the_response_to_json() {
        let req = writing_request(ProficiencyLevel::Beginner, "hello");
        let cfg = req.generation_config.unwrap();
        assert_eq!(cfg.response_mime_type.as_deref(), Some("application/json"));
        let schema = cfg.response_schema.unwrap();
        assert_eq!(schema["required"][0], "score");
    }

    #[test]
    fn feedback_parses_from_schema_shaped_reply() {
        let raw = r#"{
            "score": "B1",
            "corrections": ["Use 'have', not 'has', with 'I'."],
            "vocabularySuggestions": ["Consider 'symptoms' instead of 'problems'."],
            "generalFeedback": "Clear structure; watch subject-verb agreement."
        }"#;
        let fb: WritingFeedback = serde_json::from_str(raw).unwrap();
        assert_eq!(fb.score, "B1");
        assert_eq!(fb.corrections.len(), 1);
        assert_eq!(fb.vocabulary_suggestions.len(), 1);
    }

    #[tokio::test]
    async fn unreachable_endpoint_surfaces_a_typed_error() {
        let client = GenAiClient::new("http://127.0.0.1:9/v1beta", "test-key");
        let err = request_writing_feedback(
            &client,
            "test-model",
            ProficiencyLevel::Intermediate,
            "some text",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CoachError::Http(_)));
    }
}
