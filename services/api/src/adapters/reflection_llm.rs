//! services/api/src/adapters/reflection_llm.rs
//!
//! This module contains the adapter for the weekly reflection LLM.
//! It implements the `WeeklyReflectionService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use journal_core::{
    domain::{Trend, WeeklyAiReflection},
    ports::{PortError, PortResult, WeeklyReflectionService},
};
use serde::Deserialize;

const SYSTEM_INSTRUCTIONS: &str = r#"You are a gentle journaling companion writing a short weekly reflection.

You receive a digest of one user's journal entries from the past week: how many entries they wrote, and one line per entry with its date, mood, sentiment score (-1.0 to 1.0) and a one-line summary.

Write:
- reflectionText: 3-5 neutral, warm sentences describing the emotional shape of the week. Do not diagnose, do not quote the summaries verbatim, and address the user as "you".
- trend: exactly one of IMPROVING, DECLINING or MIXED, judged from how mood and sentiment moved across the week.
- suggestion: one small, concrete emotional suggestion for the coming week, in a single sentence.

Respond with ONLY a JSON object of the form:
{"reflectionText": "...", "trend": "IMPROVING", "suggestion": "..."}"#;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `WeeklyReflectionService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiReflectionAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiReflectionAdapter {
    /// Creates a new `OpenAiReflectionAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// Response Parsing
//=========================================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReflection {
    reflection_text: String,
    trend: String,
    suggestion: String,
}

/// Parses the model's JSON reply. Anything short of a complete, valid reflection is an error.
pub fn parse_reflection(reply: &str) -> PortResult<WeeklyAiReflection> {
    let raw: RawReflection = serde_json::from_str(strip_code_fence(reply))
        .map_err(|e| PortError::Unexpected(format!("Reflection reply is not valid JSON: {}", e)))?;

    let reflection_text = raw.reflection_text.trim().to_string();
    if reflection_text.is_empty() {
        return Err(PortError::Unexpected(
            "Reflection reply contained no text.".to_string(),
        ));
    }

    let trend = raw
        .trend
        .trim()
        .to_ascii_uppercase()
        .parse::<Trend>()
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

    Ok(WeeklyAiReflection {
        reflection_text,
        trend,
        suggestion: raw.suggestion.trim().to_string(),
    })
}

/// Removes a surrounding Markdown code fence, if the model added one.
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

//=========================================================================================
// `WeeklyReflectionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl WeeklyReflectionService for OpenAiReflectionAdapter {
    /// Asks the model for a reflection on the week's digest. One attempt, no retries.
    async fn generate_weekly_reflection(
        &self,
        weekly_signal: &str,
    ) -> PortResult<WeeklyAiReflection> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(weekly_signal)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .response_format(ResponseFormat::JsonObject)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Reflection LLM response contained no text content.".to_string())
            })?;

        parse_reflection(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_plain_json_reply() {
        let reply = r#"{"reflectionText": " You found calm midweek. ", "trend": "IMPROVING", "suggestion": "Keep the evening walks."}"#;

        let reflection = parse_reflection(reply).unwrap();

        assert_eq!(reflection.reflection_text, "You found calm midweek.");
        assert_eq!(reflection.trend, Trend::Improving);
        assert_eq!(reflection.suggestion, "Keep the evening walks.");
    }

    #[test]
    fn tolerates_a_fenced_reply_and_lowercase_trend() {
        let reply = "```json\n{\"reflectionText\": \"Ups and downs.\", \"trend\": \"mixed\", \"suggestion\": \"Be kind to yourself.\"}\n```";

        let reflection = parse_reflection(reply).unwrap();

        assert_eq!(reflection.trend, Trend::Mixed);
    }

    #[test]
    fn unknown_trend_is_an_error() {
        let reply = r#"{"reflectionText": "Fine.", "trend": "FLAT", "suggestion": "Rest."}"#;
        assert!(parse_reflection(reply).is_err());
    }

    #[test]
    fn missing_fields_or_blank_text_are_errors() {
        assert!(parse_reflection(r#"{"reflectionText": "Fine."}"#).is_err());
        assert!(parse_reflection(r#"{"reflectionText": "  ", "trend": "MIXED", "suggestion": "x"}"#).is_err());
        assert!(parse_reflection("I'm sorry, I can't help with that.").is_err());
    }
}
