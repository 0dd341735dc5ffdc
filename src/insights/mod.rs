//! Natural-language insights over the run statistics.
//!
//! The pipeline talks to the text-generation service only through the
//! [`InsightGenerator`] trait. Any failure, including a missing credential,
//! turns into an unavailable [`AiInsights`] value and never aborts the run.

pub mod claude;
pub mod prompt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::InsightError;

pub use claude::ClaudeGenerator;
pub use prompt::build_prompt;

/// Summary text used whenever no analysis could be generated.
pub const UNAVAILABLE_SUMMARY: &str = "AI insights unavailable";

/// Longest summary taken from an analysis without a paragraph break.
const SUMMARY_MAX_CHARS: usize = 300;

/// One call-and-response exchange with a text-generation service.
#[async_trait]
pub trait InsightGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, InsightError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiInsights {
    pub available: bool,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub full_analysis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl AiInsights {
    pub fn from_analysis(text: &str) -> Self {
        Self {
            available: true,
            summary: summarize(text),
            full_analysis: Some(text.trim().to_string()),
            reason: None,
            generated_at: Utc::now(),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            summary: UNAVAILABLE_SUMMARY.to_string(),
            full_analysis: None,
            reason: Some(reason.into()),
            generated_at: Utc::now(),
        }
    }
}

/// First paragraph of `text`, or its first 300 characters if it has no break.
pub fn summarize(text: &str) -> String {
    let text = text.trim();
    match text.split_once("\n\n") {
        Some((first, _)) => first.trim().to_string(),
        None => text.chars().take(SUMMARY_MAX_CHARS).collect(),
    }
}

/// Asks `generator` for an analysis of `prompt`, degrading to a placeholder.
///
/// `None` means no generator could be built, usually for lack of a
/// credential.
#[tracing::instrument(skip_all, fields(prompt_chars = prompt.len(), max_tokens = max_tokens))]
pub async fn generate_insights(
    generator: Option<&dyn InsightGenerator>,
    prompt: &str,
    max_tokens: u32,
) -> AiInsights {
    let Some(generator) = generator else {
        info!("No insight generator configured, skipping AI insights");
        return AiInsights::unavailable("no credential configured");
    };

    match generator.generate(prompt, max_tokens).await {
        Ok(text) if !text.trim().is_empty() => {
            info!(chars = text.len(), "AI insights generated");
            AiInsights::from_analysis(&text)
        }
        Ok(_) => {
            warn!("Insight generator returned empty text");
            AiInsights::unavailable(InsightError::EmptyResponse.to_string())
        }
        Err(e) => {
            warn!(error = %e, "Insight generation failed");
            AiInsights::unavailable(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Result<&'static str, u16>);

    #[async_trait]
    impl InsightGenerator for Fixed {
        async fn generate(&self, _prompt: &str, _max_tokens: u32) -> Result<String, InsightError> {
            match self.0 {
                Ok(text) => Ok(text.to_string()),
                Err(status) => Err(InsightError::Api {
                    status,
                    body: "overloaded".into(),
                }),
            }
        }
    }

    #[test]
    fn test_summarize_takes_first_paragraph() {
        assert_eq!(summarize("First para.\n\nSecond para."), "First para.");
        assert_eq!(summarize("  one line  "), "one line");
        let long = "x".repeat(400);
        assert_eq!(summarize(&long).len(), 300);
    }

    #[tokio::test]
    async fn test_no_generator_is_unavailable() {
        let insights = generate_insights(None, "prompt", 100).await;
        assert!(!insights.available);
        assert_eq!(insights.summary, UNAVAILABLE_SUMMARY);
        assert!(insights.reason.is_some());
    }

    #[tokio::test]
    async fn test_generator_error_is_unavailable() {
        let generator = Fixed(Err(529));
        let insights = generate_insights(Some(&generator), "prompt", 100).await;
        assert!(!insights.available);
        assert!(insights.reason.unwrap().contains("529"));
    }

    #[tokio::test]
    async fn test_generated_text_is_available() {
        let generator = Fixed(Ok("Summary here.\n\n1. Finding"));
        let insights = generate_insights(Some(&generator), "prompt", 100).await;
        assert!(insights.available);
        assert_eq!(insights.summary, "Summary here.");
        assert_eq!(insights.full_analysis.as_deref(), Some("Summary here.\n\n1. Finding"));

        let json = serde_json::to_value(&insights).unwrap();
        assert!(json.get("reason").is_none());
    }

    #[tokio::test]
    async fn test_blank_text_is_unavailable() {
        let generator = Fixed(Ok("   "));
        assert!(!generate_insights(Some(&generator), "prompt", 100).await.available);
    }
}
