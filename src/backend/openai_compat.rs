//! OpenAI-compatible chat completions backend.
//!
//! Works against any service exposing the `/v1/chat/completions`
//! surface; used as the last-resort hop in policies that route off
//! Gemini entirely.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::DroverConfig;
use crate::error::{DroverError, Result};
use crate::types::{Role, Usage};

use super::http::{bearer_headers, shared_client, status_to_error};
use super::{BackendRequest, BackendResponse, GenerationBackend};

pub struct OpenAiCompatBackend {
    api_key: String,
    base_url: String,
}

impl OpenAiCompatBackend {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    /// Build from injected config; requires both a key and a base URL.
    pub fn from_config(config: &DroverConfig) -> Result<Self> {
        let api_key = config
            .get_api_key("openai-compatible")
            .ok_or_else(|| DroverError::Authentication("Missing OPENAI_COMPAT_API_KEY".into()))?;
        let base_url = config
            .get_base_url("openai-compatible")
            .ok_or_else(|| DroverError::Configuration("Missing OPENAI_COMPAT_BASE_URL".into()))?;
        Ok(Self::new(api_key, base_url))
    }

    fn build_request_body(&self, request: &BackendRequest) -> serde_json::Value {
        let mut messages = Vec::new();
        if let Some(ref system) = request.system_instruction {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        for turn in &request.conversation {
            let role = match turn.role {
                Role::User => "user",
                Role::Model => "assistant",
            };
            messages.push(serde_json::json!({"role": role, "content": turn.text}));
        }

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.temperature,
        });
        let obj = body.as_object_mut().unwrap();
        if let Some(max) = request.max_output_tokens {
            obj.insert("max_tokens".into(), max.into());
        }
        if request.json_mode {
            obj.insert(
                "response_format".into(),
                serde_json::json!({"type": "json_object"}),
            );
        }

        body
    }
}

#[async_trait]
impl GenerationBackend for OpenAiCompatBackend {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn generate(&self, request: &BackendRequest) -> Result<BackendResponse> {
        let body = self.build_request_body(request);
        let url = format!("{}/v1/chat/completions", self.base_url);

        debug!(model = %request.model, "chat completions request");

        let resp = shared_client()
            .post(&url)
            .headers(bearer_headers(&self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let data: ChatResponse = resp.json().await?;

        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| DroverError::api(200, "No choices in completion response"))?;

        let usage = data
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(BackendResponse {
            text: choice.message.content.unwrap_or_default(),
            usage,
        })
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}
