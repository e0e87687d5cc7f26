//! services/api/src/adapters/analysis_llm.rs
//!
//! This module contains the adapter for the entry analysis LLM.
//! It implements the `EntryAnalysisService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use journal_core::{
    domain::{EntryAnalysis, NEUTRAL_MOOD},
    ports::{EntryAnalysisService, PortError, PortResult},
};

const SYSTEM_INSTRUCTIONS: &str = r#"You analyse personal journal entries. For the entry you are given, provide:

1. Mood: the primary mood in one word (Happy, Sad, Anxious, Reflective, Grateful, Excited, Neutral, ...)
2. Summary: a 1-2 sentence summary of the entry
3. Sentiment Score: overall sentiment from -1.0 (very negative) to 1.0 (very positive), 0.0 is neutral

Format your response EXACTLY like this, one field per line:
Mood: [mood]
Summary: [summary text]
Sentiment Score: [score]"#;

const DEFAULT_SUMMARY: &str = "Journal entry recorded";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `EntryAnalysisService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiAnalysisAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiAnalysisAdapter {
    /// Creates a new `OpenAiAnalysisAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

/// Reads the `Key: value` lines of the model's reply, filling gaps with defaults.
pub fn parse_analysis(reply: &str) -> EntryAnalysis {
    let mut mood = None;
    let mut summary = None;
    let mut sentiment_score = None;

    for line in reply.lines().map(str::trim) {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.trim().to_ascii_lowercase().as_str() {
            "mood" => mood = Some(value.to_string()),
            "summary" => summary = Some(value.to_string()),
            "sentiment score" => {
                let score = value.parse::<f64>().ok().filter(|s| s.is_finite());
                sentiment_score = Some(score.unwrap_or(0.0).clamp(-1.0, 1.0))
            }
            _ => {}
        }
    }

    EntryAnalysis {
        mood: mood.unwrap_or_else(|| NEUTRAL_MOOD.to_string()),
        summary: summary.unwrap_or_else(|| DEFAULT_SUMMARY.to_string()),
        sentiment_score: sentiment_score.unwrap_or(0.0),
    }
}

//=========================================================================================
// `EntryAnalysisService` Trait Implementation
//=========================================================================================

#[async_trait]
impl EntryAnalysisService for OpenAiAnalysisAdapter {
    async fn analyze_entry(&self, content: &str) -> PortResult<EntryAnalysis> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(format!("Journal Entry:\n\"{}\"", content))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        if let Some(choice) = response.choices.into_iter().next() {
            if let Some(content) = choice.message.content {
                Ok(parse_analysis(&content))
            } else {
                Err(PortError::Unexpected(
                    "Analysis LLM response contained no text content.".to_string(),
                ))
            }
        } else {
            Err(PortError::Unexpected(
                "Analysis LLM returned no choices in its response.".to_string(),
            ))
        }
    }
}
