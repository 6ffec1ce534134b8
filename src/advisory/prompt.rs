//! Prompt construction for stage evaluations

use crate::persona::Persona;
use crate::stages::StageDescriptor;

use super::traits::AdvisoryRequest;

/// Sampling parameters passed through to the backend
#[derive(Debug, Clone, Copy)]
pub struct PromptSettings {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1000,
        }
    }
}

const SYSTEM_PROMPT: &str = "You are simulating a real workshop participant. \
Answer from the participant's point of view and reply with a single JSON object only.";

const REPLY_SCHEMA: &str = r#"{
  "actualMinutes": <number, minutes actually spent>,
  "timePerception": "TooShort" | "JustRight" | "TooLong",
  "easeOfUse": <integer 1-10>,
  "clarity": <integer 1-10>,
  "value": <integer 1-10>,
  "painPoints": [<string>, ...],
  "positivePoints": [<string>, ...],
  "suggestions": [<string>, ...],
  "wouldContinue": <true | false>,
  "emotionalState": <short description of how the participant feels>
}"#;

/// Build the request for one persona at one stage.
///
/// `digest` is the caller's bounded summary of earlier stages, so the
/// request size does not grow with the number of elapsed stages.
pub fn build_request(
    persona: &Persona,
    stage: &StageDescriptor,
    digest: &str,
    settings: PromptSettings,
) -> AdvisoryRequest {
    let mut prompt = String::with_capacity(1024);

    prompt.push_str("Participant:\n");
    prompt.push_str(&format!("- Name: {}\n", persona.name));
    prompt.push_str(&format!("- Department: {}\n", persona.department));
    if let Some(ref company) = persona.company {
        prompt.push_str(&format!("- Company: {}\n", company));
    }
    prompt.push_str(&format!("- Team size: {}\n", persona.team_size));
    prompt.push_str(&format!("- Digital maturity: {}\n", persona.digital_maturity));
    if let Some(age) = persona.age {
        prompt.push_str(&format!("- Age: {}\n", age));
    }
    if let Some(years) = persona.experience_years {
        prompt.push_str(&format!("- Years in role: {}\n", years));
    }

    prompt.push_str(&format!(
        "\nCurrent stage {}: {}\n{}\nExpected duration: {} minutes\n",
        stage.number, stage.name, stage.description, stage.expected_minutes
    ));

    prompt.push_str("\nEarlier stages:\n");
    prompt.push_str(digest);
    prompt.push_str("\n\nDescribe this participant's experience of the current stage as JSON:\n");
    prompt.push_str(REPLY_SCHEMA);

    AdvisoryRequest {
        persona_id: persona.id.clone(),
        maturity: persona.digital_maturity,
        stage_number: stage.number,
        stage_name: stage.name.clone(),
        expected_minutes: stage.expected_minutes,
        system_prompt: SYSTEM_PROMPT.to_string(),
        prompt,
        temperature: settings.temperature,
        max_tokens: settings.max_tokens,
    }
}
