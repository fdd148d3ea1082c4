use serde::{Deserialize, Serialize};

/// Tutoring difficulty; parameterizes every collaborator prompt and the
/// live session's system instruction. Orthogonal to the audio pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProficiencyLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl ProficiencyLevel {
    /// CEFR band the student is working toward.
    pub fn target_band(&self) -> &'static str {
        match self {
            ProficiencyLevel::Beginner => "A2",
            ProficiencyLevel::Intermediate => "B1",
            ProficiencyLevel::Advanced => "B2",
        }
    }

    /// Band the student is coming from.
    fn current_band(&self) -> &'static str {
        match self {
            ProficiencyLevel::Beginner => "A1",
            ProficiencyLevel::Intermediate => "A2",
            ProficiencyLevel::Advanced => "B1",
        }
    }

    /// System instruction for the text chat tutor.
    pub fn chat_instruction(&self) -> String {
        format!(
            "You are an expert English Language Tutor specializing in the CEFR {target} level.\n\
             Your goal is to help a student transition from {current} to {target}.\n\
             Guidelines:\n\
             1. Use {target}-level vocabulary.\n\
             2. If the user makes a significant grammatical error, gently correct them at the end of your response.\n\
             3. Be encouraging and conversational.\n\
             4. CURRENT FOCUS: Medicine and Health. Encourage the use of medical terms like \"appointment\", \"symptoms\", \"pharmacist\", and \"treatment\".\n\
             5. Focus topics: Daily routines, health, travel, work, and environment.",
            target = self.target_band(),
            current = self.current_band(),
        )
    }

    /// System instruction for the live voice session.
    pub fn live_instruction(&self) -> String {
        format!(
            "You are a friendly English Tutor focusing on Medical English. \
             Help the user practice symptoms, doctor interactions, and health \
             vocabulary at {} level.",
            self.target_band()
        )
    }
}

impl std::str::FromStr for ProficiencyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "beginner" => Ok(ProficiencyLevel::Beginner),
            "intermediate" => Ok(ProficiencyLevel::Intermediate),
            "advanced" => Ok(ProficiencyLevel::Advanced),
            other => Err(format!(
                "Unknown level '{}'; expected beginner, intermediate, or advanced",
                other
            )),
        }
    }
}

impl std::fmt::Display for ProficiencyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProficiencyLevel::Beginner => "beginner",
            ProficiencyLevel::Intermediate => "intermediate",
            ProficiencyLevel::Advanced => "advanced",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(
            "Intermediate".parse::<ProficiencyLevel>().unwrap(),
            ProficiencyLevel::Intermediate
        );
        assert!("fluent".parse::<ProficiencyLevel>().is_err());
    }

    #[test]
    fn instructions_mention_the_target_band() {
        for (level, band) in [
            (ProficiencyLevel::Beginner, "A2"),
            (ProficiencyLevel::Intermediate, "B1"),
            (ProficiencyLevel::Advanced, "B2"),
        ] {
            assert!(level.chat_instruction().contains(band));
            assert!(level.live_instruction().contains(band));
        }
    }
}
