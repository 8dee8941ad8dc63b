//! Result, metadata, and usage types returned by the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token usage for a generation, accumulated across attempts.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    /// Merge another usage into this one (accumulate).
    pub fn merge(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// How a single attempt ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    TimedOut,
    Errored { message: String },
}

/// One loop iteration, immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-based position in the attempt sequence.
    pub attempt_number: u32,
    pub model: String,
    pub is_fallback: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: AttemptOutcome,
}

/// Metadata carried on both result arms.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationMeta {
    /// Model that produced the successful response; `None` on failure.
    pub model: Option<String>,
    pub total_ms: u64,
    pub attempts: u32,
    pub per_attempt_ms: Vec<u64>,
    pub attempt_log: Vec<AttemptRecord>,
    pub usage: Usage,
    pub cache_hit: bool,
}

/// Terminal failure code surfaced to callers.
///
/// Model-unavailable conditions are folded into the attempt loop and
/// parse failures into `ApiError`; callers never see anything else.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureCode {
    Timeout,
    ApiError,
}

/// Terminal failure surfaced to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureError {
    pub code: FailureCode,
    pub message: String,
}

/// Outcome of one `generate` call. Both arms carry metadata, so the
/// type is returned by value rather than wrapped in `Result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationResult {
    Success {
        value: serde_json::Value,
        meta: GenerationMeta,
    },
    Failure {
        error: FailureError,
        meta: GenerationMeta,
    },
}

impl GenerationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn meta(&self) -> &GenerationMeta {
        match self {
            Self::Success { meta, .. } | Self::Failure { meta, .. } => meta,
        }
    }

    /// The successful value, if any.
    pub fn value(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Success { value, .. } => Some(value),
            Self::Failure { .. } => None,
        }
    }

    /// Consume the result, yielding the successful value.
    pub fn into_value(self) -> Option<serde_json::Value> {
        match self {
            Self::Success { value, .. } => Some(value),
            Self::Failure { .. } => None,
        }
    }

    /// The failure, if any.
    pub fn failure(&self) -> Option<&FailureError> {
        match self {
            Self::Failure { error, .. } => Some(error),
            Self::Success { .. } => None,
        }
    }
}
