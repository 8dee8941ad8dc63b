//! Gemini generateContent backend.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::DroverConfig;
use crate::error::{DroverError, Result};
use crate::types::{Role, Usage};

use super::http::{shared_client, status_to_error};
use super::{BackendRequest, BackendResponse, GenerationBackend};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiBackend {
    api_key: String,
    base_url: String,
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.unwrap_or_else(|| BASE_URL.to_string()),
        }
    }

    /// Build from injected config; requires a "gemini" API key.
    pub fn from_config(config: &DroverConfig) -> Result<Self> {
        let api_key = config
            .get_api_key("gemini")
            .ok_or_else(|| DroverError::Authentication("Missing GEMINI_API_KEY".into()))?;
        Ok(Self::new(api_key, config.get_base_url("gemini")))
    }

    fn build_request_body(&self, request: &BackendRequest) -> serde_json::Value {
        let contents: Vec<serde_json::Value> = request
            .conversation
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    Role::User => "user",
                    Role::Model => "model",
                };
                serde_json::json!({
                    "role": role,
                    "parts": [{"text": turn.text}],
                })
            })
            .collect();

        let mut body = serde_json::json!({ "contents": contents });
        let obj = body.as_object_mut().unwrap();

        if let Some(ref system) = request.system_instruction {
            obj.insert(
                "systemInstruction".into(),
                serde_json::json!({"parts": [{"text": system}]}),
            );
        }

        let mut gen_config = serde_json::Map::new();
        gen_config.insert("temperature".into(), request.temperature.into());
        if let Some(max) = request.max_output_tokens {
            gen_config.insert("maxOutputTokens".into(), max.into());
        }
        if request.json_mode {
            gen_config.insert("responseMimeType".into(), "application/json".into());
            if let Some(ref schema) = request.schema {
                gen_config.insert("responseSchema".into(), schema.clone());
            }
        }
        obj.insert(
            "generationConfig".into(),
            serde_json::Value::Object(gen_config),
        );

        body
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &BackendRequest) -> Result<BackendResponse> {
        let body = self.build_request_body(request);
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, request.model, self.api_key
        );

        debug!(model = %request.model, "Gemini generateContent");

        let resp = shared_client().post(&url).json(&body).send().await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let data: GeminiResponse = resp.json().await?;

        let candidate = data
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| DroverError::api(200, "No candidates in Gemini response"))?;

        let text: String = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        let usage = data
            .usage_metadata
            .map(|u| Usage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            })
            .unwrap_or_default();

        Ok(BackendResponse { text, usage })
    }
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}
