//! Generation backend trait and service adapters.

pub mod http;

#[cfg(feature = "gemini")]
pub mod gemini;

#[cfg(feature = "openai-compatible")]
pub mod openai_compat;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ConversationTurn, Usage};

/// One attempt's worth of request, already bound to a concrete model.
#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub model: String,
    pub system_instruction: Option<String>,
    pub conversation: Vec<ConversationTurn>,
    pub json_mode: bool,
    pub schema: Option<serde_json::Value>,
    pub temperature: f64,
    pub max_output_tokens: Option<u32>,
}

/// Raw text response from a backend.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub text: String,
    pub usage: Usage,
}

/// A generation service adapter.
///
/// Implementations are stateless per call and must be safe for
/// concurrent use across overlapping `generate` invocations.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    /// Issue one generation request. Cancellation is cooperative: the
    /// caller drops this future when the attempt deadline fires.
    async fn generate(&self, request: &BackendRequest) -> Result<BackendResponse>;
}
