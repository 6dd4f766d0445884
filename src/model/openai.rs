//! Production model adapter for OpenAI-compatible endpoints.
//!
//! One reqwest client serves all three capability traits: chat completions
//! for intent extraction and explanation writing, the embeddings endpoint
//! for vectors. Works against cloud endpoints or local servers (Ollama,
//! LM Studio) that speak the same API.

use crate::config::ModelConfig;
use crate::intent::{ExtractedIntent, Intent};
use crate::model::{
    Embedder, ExplanationDraft, ExplanationWriter, ExtractionContext, IntentExtractor, ModelError,
};
use crate::profiles::CandidateProfile;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const EXTRACT_SYSTEM_PROMPT: &str = "You turn a dating search request into JSON with fields: \
vibe (romantic|adventurous|chill|intellectual|funny|serious|any), \
filters {age_min, age_max, max_distance_km, location, interests[], dealbreakers[]}, \
traits[], interests[], personality[], semantic_query (a clean one-line restatement), \
confidence (0..1), restated (bool, refinements only: true when the new text fully \
replaces the prior search instead of narrowing it). Respond with JSON only.";

const EXPLAIN_SYSTEM_PROMPT: &str = "You write a short, warm match explanation as JSON with \
fields: tagline (max 8 words), summary (2 sentences, grounded in the profile), \
conversation_starters (up to 3 openers referencing shared interests). Respond with JSON only.";

pub struct OpenAiModelClient {
    client: reqwest::Client,
    config: ModelConfig,
}

impl OpenAiModelClient {
    pub fn new(config: ModelConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// Build `{base}/v1/{path}`, tolerating a base_url that already ends in
    /// `/v1` or a trailing slash.
    fn api_url(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let base = base.strip_suffix("/v1").unwrap_or(base);
        format!("{}/v1/{}", base, path)
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => req.header("Authorization", format!("Bearer {}", key)),
            None => req,
        }
    }

    async fn chat(&self, system: &str, user: String) -> Result<String, ModelError> {
        let body = ChatRequest {
            model: self.config.chat_model.clone(),
            messages: vec![
                ChatRequestMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatRequestMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.2,
        };

        let url = self.api_url("chat/completions");
        log::debug!("model chat request to {}", url);

        let response = self.authorized(self.client.post(&url).json(&body)).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ModelError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| ModelError::Malformed(format!("chat response: {}", e)))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ModelError::Malformed("chat response had no choices".to_string()))
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatRequestMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequestMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Serialize)]
struct EmbeddingsRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    embedding: Vec<f32>,
}

/// Cut the JSON object out of a model answer that may be wrapped in prose
/// or a code fence.
fn json_slice(content: &str) -> Result<&str, ModelError> {
    let start = content
        .find('{')
        .ok_or_else(|| ModelError::Malformed("no JSON object in model output".to_string()))?;
    let end = content
        .rfind('}')
        .ok_or_else(|| ModelError::Malformed("unterminated JSON in model output".to_string()))?;
    if end < start {
        return Err(ModelError::Malformed("unterminated JSON in model output".to_string()));
    }
    Ok(&content[start..=end])
}

#[async_trait]
impl IntentExtractor for OpenAiModelClient {
    async fn extract(
        &self,
        query: &str,
        context: ExtractionContext<'_>,
    ) -> Result<ExtractedIntent, ModelError> {
        let mut user = format!("Search request: {}", query);

        if let Some(prior) = context.prior {
            let prior_json = serde_json::to_string(prior)
                .map_err(|e| ModelError::Malformed(format!("prior intent: {}", e)))?;
            user.push_str("\nThis refines a previous search. Prior intent: ");
            user.push_str(&prior_json);
        }
        if let Some(prefs) = context.preferences {
            let tokens = prefs.top_tokens(8);
            if !tokens.is_empty() {
                user.push_str("\nThe user has historically responded well to: ");
                user.push_str(&tokens.join(", "));
            }
        }

        let content = self.chat(EXTRACT_SYSTEM_PROMPT, user).await?;
        let extracted: ExtractedIntent = serde_json::from_str(json_slice(&content)?)
            .map_err(|e| ModelError::Malformed(format!("intent payload: {}", e)))?;
        Ok(extracted)
    }
}

#[async_trait]
impl Embedder for OpenAiModelClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        let body = EmbeddingsRequest {
            model: self.config.embed_model.clone(),
            input: vec![text.to_string()],
        };

        let url = self.api_url("embeddings");
        let response = self.authorized(self.client.post(&url).json(&body)).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ModelError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: EmbeddingsResponse = serde_json::from_str(&text)
            .map_err(|e| ModelError::Malformed(format!("embeddings response: {}", e)))?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ModelError::Malformed("embeddings response was empty".to_string()))
    }
}

#[async_trait]
impl ExplanationWriter for OpenAiModelClient {
    async fn write_explanation(
        &self,
        profile: &CandidateProfile,
        intent: &Intent,
    ) -> Result<ExplanationDraft, ModelError> {
        let user = format!(
            "The searcher wants: {}\nCandidate: {}, {}. Bio: {}. Traits: {}. Interests: {}.",
            intent.semantic_query,
            profile.name,
            profile.age,
            profile.bio,
            profile.traits.join(", "),
            profile.interests.join(", "),
        );

        let content = self.chat(EXPLAIN_SYSTEM_PROMPT, user).await?;
        let draft: ExplanationDraft = serde_json::from_str(json_slice(&content)?)
            .map_err(|e| ModelError::Malformed(format!("explanation payload: {}", e)))?;
        Ok(draft)
    }
}
