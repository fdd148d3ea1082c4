use crate::client::{Content, GenAiClient, GenerateContentRequest, GenerationConfig};
use crate::level::ProficiencyLevel;

/// Shown instead of crashing the conversation when the tutor call fails.
pub const FALLBACK_REPLY: &str =
    "I'm sorry, I'm having trouble connecting to my brain right now. Please try again!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Model,
}

impl ChatRole {
    fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        }
    }
}

/// One turn of the tutoring conversation, oldest first.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

pub(crate) fn chat_request(level: ProficiencyLevel, history: &[ChatTurn]) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: history
            .iter()
            .map(|turn| Content::text(Some(turn.role.as_str()), turn.text.clone()))
            .collect(),
        system_instruction: Some(Content::text(None, level.chat_instruction())),
        generation_config: Some(GenerationConfig {
            temperature: Some(0.7),
            top_p: Some(0.95),
            ..Default::default()
        }),
    }
}

/// Send the ordered conversation history, get one completion back.
///
/// Failures never propagate to the caller; the user sees a fallback line
/// and the conversation continues.
pub async fn tutor_reply(
    client: &GenAiClient,
    model: &str,
    level: ProficiencyLevel,
    history: &[ChatTurn],
) -> String {
    let request = chat_request(level, history);
    match client.generate(model, &request).await {
        Ok(response) => match response.text() {
            Some(text) => text.to_string(),
            None => {
                tracing::warn!("Tutor reply carried no text");
                FALLBACK_REPLY.to_string()
            }
        },
        Err(e) => {
            tracing::warn!("Tutor request failed: {}", e);
            FALLBACK_REPLY.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_order_and_roles_are_preserved() {
        let history = vec![
            ChatTurn::model("Hello! Ready to practice?"),
            ChatTurn::user("Yes, I have a headache."),
        ];
        let req = chat_request(ProficiencyLevel::Intermediate, &history);
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["contents"][0]["role"], "model");
        assert_eq!(json["contents"][1]["role"], "user");
        assert_eq!(
            json["contents"][1]["parts"][0]["text"],
            "Yes, I have a headache."
        );
        assert_eq!(json["generationConfig"]["temperature"], 0.7);
    }

    #[test]
    fn system_instruction_matches_level() {
        let req = chat_request(ProficiencyLevel::Advanced, &[]);
        let instruction = req.system_instruction.unwrap().parts[0]
            .text
            .clone()
            .unwrap();
        assert!(instruction.contains("B2"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_returns_fallback() {
        // Port 9 (discard) refuses connections immediately
        let client = GenAiClient::new("http://127.0.0.1:9/v1beta", "test-key");
        let reply = tutor_reply(
            &client,
            "test-model",
            ProficiencyLevel::Intermediate,
            &[ChatTurn::user("hi")],
        )
        .await;
        assert_eq!(reply, FALLBACK_REPLY);
    }
}
