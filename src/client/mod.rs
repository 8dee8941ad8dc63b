//! The bounded retry loop around a generation backend.
//!
//! One `generate` call is a strictly sequential async operation:
//! attempts are ordered, each owns its own deadline, and dropping a
//! timed-out attempt's future is the only cancellation mechanism.
//! Concurrent calls share nothing mutable beyond the connection pool.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::backend::{BackendRequest, GenerationBackend};
use crate::error::DroverError;
use crate::router::{self, ModelChoice, ModelPolicy};
use crate::types::{
    AttemptOutcome, AttemptRecord, ConversationTurn, FailureCode, FailureError, GenerationMeta,
    GenerationRequest, GenerationResult,
};
use crate::validate::{build_repair_prompt, normalize, validate, ValidationIssue, ValidationOutcome};

/// Whether a schema-invalid response triggers one repair re-ask or
/// falls straight through to the caller's fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepairPolicy {
    #[default]
    Never,
    OneRepairAttempt,
}

/// Outcome of `generate_validated`: generation and semantic validation
/// are separate failure surfaces, so callers can fall back differently.
#[derive(Debug, Clone)]
pub enum ValidatedGeneration {
    Valid {
        value: serde_json::Value,
        meta: GenerationMeta,
    },
    /// Structurally parsed but schema-non-conformant even after the
    /// lenient coercion pass (and optional repair cycle).
    Invalid {
        value: serde_json::Value,
        issues: Vec<ValidationIssue>,
        meta: GenerationMeta,
    },
    Failed {
        error: FailureError,
        meta: GenerationMeta,
    },
}

/// Client orchestrating model selection, per-attempt deadlines, and
/// retry with backoff. Stateless across calls; the policy table is the
/// only shared (immutable) state.
pub struct StructuredGenerationClient {
    backend: Arc<dyn GenerationBackend>,
    policy: ModelPolicy,
}

impl StructuredGenerationClient {
    pub fn new(backend: Arc<dyn GenerationBackend>, policy: ModelPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn policy(&self) -> &ModelPolicy {
        &self.policy
    }

    /// Execute the attempt loop and return a normalized result.
    ///
    /// Success is returned on the first structurally parseable
    /// response; semantic validation happens one layer up. Exhaustion
    /// surfaces `Timeout` when the final error was a deadline expiry,
    /// `ApiError` otherwise.
    pub async fn generate(&self, request: GenerationRequest) -> GenerationResult {
        let loop_started = Instant::now();
        let mut meta = GenerationMeta::default();
        let mut attempts: u32 = 0;
        let mut last_error: Option<DroverError> = None;

        while attempts < request.max_attempts {
            let choice = self.policy.select_model(request.task, attempts);
            attempts += 1;

            debug!(
                task = %request.task,
                model = %choice.model,
                attempt = attempts,
                is_fallback = choice.is_fallback,
                "issuing generation attempt"
            );

            let backend_request = to_backend_request(&request, &choice);
            let started_at = chrono::Utc::now();
            let attempt_started = Instant::now();

            let outcome = tokio::time::timeout(
                request.timeout,
                self.backend.generate(&backend_request),
            )
            .await;

            let duration_ms = attempt_started.elapsed().as_millis() as u64;
            meta.per_attempt_ms.push(duration_ms);

            let error = match outcome {
                Ok(Ok(response)) => {
                    meta.usage.merge(&response.usage);
                    match finalize(&response.text, request.json_mode) {
                        Ok(value) => {
                            meta.attempt_log.push(AttemptRecord {
                                attempt_number: attempts,
                                model: choice.model.clone(),
                                is_fallback: choice.is_fallback,
                                started_at,
                                duration_ms,
                                outcome: AttemptOutcome::Succeeded,
                            });
                            meta.model = Some(choice.model);
                            meta.attempts = attempts;
                            meta.total_ms = loop_started.elapsed().as_millis() as u64;
                            return GenerationResult::Success { value, meta };
                        }
                        Err(e) => e,
                    }
                }
                Ok(Err(e)) => e,
                Err(_elapsed) => DroverError::Timeout(request.timeout.as_millis() as u64),
            };

            meta.attempt_log.push(AttemptRecord {
                attempt_number: attempts,
                model: choice.model.clone(),
                is_fallback: choice.is_fallback,
                started_at,
                duration_ms,
                outcome: match &error {
                    DroverError::Timeout(_) => AttemptOutcome::TimedOut,
                    other => AttemptOutcome::Errored {
                        message: other.to_string(),
                    },
                },
            });

            if error.is_model_unavailable() {
                // The identifier itself is bad; backing off would only
                // delay the next model.
                warn!(model = %choice.model, error = %error, "model unavailable, advancing");
                last_error = Some(error);
                continue;
            }

            if !error.is_retryable() || attempts >= request.max_attempts {
                last_error = Some(error);
                break;
            }

            let delay = error
                .retry_after_hint()
                .map(Duration::from_millis)
                .unwrap_or_else(|| router::retry_delay(attempts));
            warn!(
                attempt = attempts,
                max_attempts = request.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying after transient error"
            );
            last_error = Some(error);
            tokio::time::sleep(delay).await;
        }

        meta.attempts = attempts;
        meta.total_ms = loop_started.elapsed().as_millis() as u64;

        let (code, message) = match &last_error {
            Some(e @ DroverError::Timeout(_)) => (FailureCode::Timeout, e.to_string()),
            Some(e) => (FailureCode::ApiError, e.to_string()),
            None => (FailureCode::ApiError, "no attempts were made".to_string()),
        };
        GenerationResult::Failure {
            error: FailureError { code, message },
            meta,
        }
    }

    /// Generate, then run the lenient-coerce / strict-validate pipeline
    /// against the request schema.
    ///
    /// With [`RepairPolicy::OneRepairAttempt`], a schema-invalid
    /// response triggers exactly one re-ask built from the validation
    /// issues; there is no unbounded repair loop.
    pub async fn generate_validated(
        &self,
        request: GenerationRequest,
        repair: RepairPolicy,
    ) -> ValidatedGeneration {
        let schema = request.schema.clone();
        let result = self.generate(request.clone()).await;
        let (value, meta) = match result {
            GenerationResult::Success { value, meta } => (value, meta),
            GenerationResult::Failure { error, meta } => {
                return ValidatedGeneration::Failed { error, meta }
            }
        };

        let Some(schema) = schema else {
            return ValidatedGeneration::Valid { value, meta };
        };

        let cleaned = normalize(&value, &schema);
        match validate(&cleaned, &schema) {
            ValidationOutcome::Valid { data } => ValidatedGeneration::Valid { value: data, meta },
            ValidationOutcome::Invalid { issues } => match repair {
                RepairPolicy::Never => ValidatedGeneration::Invalid {
                    value: cleaned,
                    issues,
                    meta,
                },
                RepairPolicy::OneRepairAttempt => {
                    self.repair_once(request, &value, issues, meta).await
                }
            },
        }
    }

    async fn repair_once(
        &self,
        original: GenerationRequest,
        invalid_output: &serde_json::Value,
        issues: Vec<ValidationIssue>,
        first_meta: GenerationMeta,
    ) -> ValidatedGeneration {
        let original_prompt = original.latest_user_text().unwrap_or_default().to_string();
        let invalid_text = serde_json::to_string(invalid_output).unwrap_or_default();
        let prompt = build_repair_prompt(&original_prompt, &invalid_text, &issues);

        warn!(issues = issues.len(), "re-asking once with repair prompt");

        let mut request = original;
        let schema = request.schema.clone();
        request.conversation.push(ConversationTurn::user(prompt));

        match self.generate(request).await {
            GenerationResult::Success { value, meta } => {
                let meta = merge_meta(first_meta, meta);
                let Some(schema) = schema else {
                    return ValidatedGeneration::Valid { value, meta };
                };
                let cleaned = normalize(&value, &schema);
                match validate(&cleaned, &schema) {
                    ValidationOutcome::Valid { data } => ValidatedGeneration::Valid {
                        value: data,
                        meta,
                    },
                    ValidationOutcome::Invalid { issues } => ValidatedGeneration::Invalid {
                        value: cleaned,
                        issues,
                        meta,
                    },
                }
            }
            GenerationResult::Failure { error, meta } => ValidatedGeneration::Failed {
                error,
                meta: merge_meta(first_meta, meta),
            },
        }
    }
}

/// Fold the first pass's timings into the repair pass's metadata.
fn merge_meta(first: GenerationMeta, second: GenerationMeta) -> GenerationMeta {
    let mut merged = second;
    merged.attempts += first.attempts;
    merged.total_ms += first.total_ms;
    let mut per_attempt_ms = first.per_attempt_ms;
    per_attempt_ms.extend(merged.per_attempt_ms);
    merged.per_attempt_ms = per_attempt_ms;
    let mut attempt_log = first.attempt_log;
    attempt_log.extend(merged.attempt_log);
    merged.attempt_log = attempt_log;
    let mut usage = first.usage;
    usage.merge(&merged.usage);
    merged.usage = usage;
    merged
}

fn to_backend_request(request: &GenerationRequest, choice: &ModelChoice) -> BackendRequest {
    BackendRequest {
        model: choice.model.clone(),
        system_instruction: request.system_instruction.clone(),
        conversation: request.conversation.clone(),
        json_mode: request.json_mode,
        schema: request.schema.clone(),
        temperature: request.temperature,
        max_output_tokens: request.max_output_tokens,
    }
}

/// Turn raw response text into the result value.
///
/// A JSON-mode parse failure is an error like any other and flows into
/// the classification branch of the loop.
fn finalize(text: &str, json_mode: bool) -> Result<serde_json::Value, DroverError> {
    if json_mode {
        let stripped = strip_code_fences(text);
        Ok(serde_json::from_str(&stripped)?)
    } else {
        Ok(serde_json::Value::String(text.to_string()))
    }
}

/// Strip markdown code fences from a JSON response.
fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        let without_opening = if let Some(rest) = trimmed.strip_prefix("```json") {
            rest
        } else if let Some(rest) = trimmed.strip_prefix("```") {
            rest
        } else {
            trimmed
        };
        if let Some(stripped) = without_opening.strip_suffix("```") {
            return stripped.trim().to_string();
        }
        return without_opening.trim().to_string();
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_code_fences_plain_json() {
        assert_eq!(
            strip_code_fences(r#"{"key": "value"}"#),
            r#"{"key": "value"}"#
        );
    }

    #[test]
    fn strip_code_fences_with_json_fence() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_code_fences(input), r#"{"key": "value"}"#);
    }

    #[test]
    fn strip_code_fences_with_bare_fence() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_code_fences(input), r#"{"key": "value"}"#);
    }

    #[test]
    fn strip_code_fences_unterminated_fence() {
        let input = "```json\n{\"key\": 1}";
        assert_eq!(strip_code_fences(input), r#"{"key": 1}"#);
    }

    #[test]
    fn finalize_json_mode_parses_fenced_and_plain_identically() {
        let plain = finalize(r#"{"page": 1}"#, true).unwrap();
        let fenced = finalize("```json\n{\"page\": 1}\n```", true).unwrap();
        assert_eq!(plain, fenced);
    }

    #[test]
    fn finalize_text_mode_wraps_string() {
        let value = finalize("plain prose", false).unwrap();
        assert_eq!(value, serde_json::Value::String("plain prose".into()));
    }

    #[test]
    fn finalize_json_mode_rejects_prose() {
        assert!(finalize("Not JSON at all", true).is_err());
    }
}
