//! Text assistant collaborator: receipt parsing and recipe ideas.
//!
//! The service treats the assistant as an opaque text-in, data-out dependency.
//! [`GenerativeAssistant`] talks to a `generateContent`-style HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AssistantConfig;
use crate::core::{ItemDraft, parse_drafts};
use crate::errors::{Error, Result};

/// A service that reads free text and proposes items or recipes.
#[async_trait]
pub trait Assistant: Send + Sync {
    /// Proposes item drafts for `text`, knowing the household's member names.
    async fn parse_grocery_text(&self, text: &str, member_names: &[String]) -> Result<Vec<ItemDraft>>;

    /// Suggests one recipe for the given ingredients.
    async fn suggest_recipe(&self, ingredients: &[String]) -> Result<String>;
}

/// Prompt asking for a JSON array of item drafts.
#[must_use]
pub fn grocery_prompt(text: &str, member_names: &[String]) -> String {
    format!(
        "You are a grocery parsing assistant. Extract grocery items from this text and return valid JSON.\n\n\
         Text: \"{text}\"\n\n\
         Available users for cost splitting: {names}\n\n\
         Instructions:\n\
         - If text mentions who items are for (e.g. \"for everyone\", \"for me and Alice\"), map to matching user names\n\
         - If not specified, include all users\n\
         - Return ONLY a JSON array, no other text\n\n\
         JSON format:\n\
         [{{\"name\": \"item name\", \"quantity\": 1, \"unit\": \"pcs\", \"totalPrice\": 0.00, \"sharedBy\": [\"User1\", \"User2\"]}}]\n\n\
         Parse the text now:",
        names = member_names.join(", ")
    )
}

/// Prompt asking for a single short recipe.
#[must_use]
pub fn recipe_prompt(ingredients: &[String]) -> String {
    format!(
        "I have these ingredients: {}.\nSuggest ONE simple recipe in this exact format:\n**Recipe Name** - Brief one-sentence description.",
        ingredients.join(", ")
    )
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<PartIn<'a>>,
}

#[derive(Debug, Serialize)]
struct PartIn<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<PartOut>,
}

#[derive(Debug, Deserialize)]
struct PartOut {
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default()
    }
}

/// Assistant backed by a hosted generative model.
#[derive(Debug, Clone)]
pub struct GenerativeAssistant {
    endpoint: Url,
    api_key: String,
    http: reqwest::Client,
}

impl GenerativeAssistant {
    /// Builds the client; requests give up after `timeout`.
    pub fn new(config: &AssistantConfig, timeout: Duration) -> Result<Self> {
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let endpoint = Url::parse(&base)
            .and_then(|url| url.join(&format!("models/{}:generateContent", config.model)))
            .map_err(|e| Error::Config {
                message: format!("invalid assistant URL {base}: {e}"),
            })?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint,
            api_key: config.api_key.clone(),
            http,
        })
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![PartIn { text: prompt }],
            }],
        };
        let response = self
            .http
            .post(self.endpoint.clone())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Assistant {
                message: format!("model request failed with {status}"),
            });
        }
        let text = response.json::<GenerateResponse>().await?.text();
        debug!("Assistant replied with {} characters", text.len());
        Ok(text)
    }
}

#[async_trait]
impl Assistant for GenerativeAssistant {
    async fn parse_grocery_text(&self, text: &str, member_names: &[String]) -> Result<Vec<ItemDraft>> {
        let reply = self.generate(&grocery_prompt(text, member_names)).await?;
        Ok(parse_drafts(&reply))
    }

    async fn suggest_recipe(&self, ingredients: &[String]) -> Result<String> {
        self.generate(&recipe_prompt(ingredients)).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_grocery_prompt_lists_members() {
        let prompt = grocery_prompt("2 milk for me and Alice", &["Me".into(), "Alice".into()]);
        assert!(prompt.contains("Text: \"2 milk for me and Alice\""));
        assert!(prompt.contains("Available users for cost splitting: Me, Alice"));
        assert!(prompt.contains("\"totalPrice\": 0.00"));
    }

    #[test]
    fn test_response_text_joins_parts() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"**Omelette**"},{"text":" - eggs."}]}}]}"#,
        )
        .unwrap();
        assert_eq!(response.text(), "**Omelette** - eggs.");

        let empty: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.text(), "");
    }

    #[test]
    fn test_endpoint_includes_model() {
        let assistant = GenerativeAssistant::new(
            &AssistantConfig {
                api_key: "k".into(),
                model: "gemma-3-4b-it".into(),
                base_url: "https://example.com/v1beta".into(),
            },
            Duration::from_secs(30),
        )
        .unwrap();
        assert_eq!(
            assistant.endpoint.as_str(),
            "https://example.com/v1beta/models/gemma-3-4b-it:generateContent"
        );
    }
}
