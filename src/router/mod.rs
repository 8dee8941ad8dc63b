//! Task-to-model routing and backoff.
//!
//! Selection is a pure function of `(task, attempt_index)`; error
//! classification lives on [`crate::error::DroverError`] so the client
//! loop and backends share one taxonomy.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::{DroverError, Result};
use crate::task::Task;

/// Consecutive attempts on one model before advancing to the next.
pub const ATTEMPTS_PER_MODEL: u32 = 3;

/// Backoff ceiling. Uncapped exponential backoff would push a late
/// attempt past any sane caller deadline.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Uniform jitter added on top of the exponential base.
const JITTER_MS: u64 = 1000;

/// The model chosen for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChoice {
    pub model: String,
    /// True for any non-primary model, including the clamped last-resort
    /// state past the end of the list.
    pub is_fallback: bool,
}

/// Immutable per-task model lists: one primary, zero or more fallbacks.
///
/// The non-empty invariant is checked at construction, never at call
/// time, so `select_model` cannot fail.
#[derive(Debug, Clone)]
pub struct ModelPolicy {
    table: HashMap<Task, Vec<String>>,
}

impl Default for ModelPolicy {
    fn default() -> Self {
        let entries: [(Task, &[&str]); 5] = [
            (Task::ExplainPage, &["gemini-2.5-flash", "gemini-2.5-flash-lite"]),
            (Task::SynthesizeSummary, &["gemini-2.5-flash", "gemini-2.5-flash-lite"]),
            (Task::GenerateQuiz, &["gemini-2.5-pro", "gemini-2.5-flash"]),
            (Task::DiagnoseBarrier, &["gemini-2.5-pro", "gemini-2.5-flash"]),
            (Task::Embedding, &["gemini-embedding-001", "text-embedding-004"]),
        ];
        let table = entries
            .into_iter()
            .map(|(task, models)| (task, models.iter().map(|m| m.to_string()).collect()))
            .collect();
        Self { table }
    }
}

impl ModelPolicy {
    /// Build a policy from an explicit table.
    ///
    /// Every task must have at least one model.
    pub fn new(table: HashMap<Task, Vec<String>>) -> Result<Self> {
        use strum::IntoEnumIterator;
        for task in Task::iter() {
            match table.get(&task) {
                None => {
                    return Err(DroverError::Configuration(format!(
                        "no model list configured for task '{task}'"
                    )))
                }
                Some(models) if models.is_empty() => {
                    return Err(DroverError::Configuration(format!(
                        "empty model list for task '{task}'"
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(Self { table })
    }

    /// The ordered model list for a task.
    pub fn models_for(&self, task: Task) -> &[String] {
        self.table
            .get(&task)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Pick the model for an attempt.
    ///
    /// Each model gets [`ATTEMPTS_PER_MODEL`] consecutive attempts;
    /// indexes past the end clamp to the last model, which keeps being
    /// retried rather than erroring out of the router.
    pub fn select_model(&self, task: Task, attempt_index: u32) -> ModelChoice {
        let models = self.models_for(task);
        let model_index = (attempt_index / ATTEMPTS_PER_MODEL) as usize;
        let clamped = model_index >= models.len();
        let effective = model_index.min(models.len().saturating_sub(1));
        ModelChoice {
            model: models[effective].clone(),
            is_fallback: clamped || effective > 0,
        }
    }
}

/// Exponential backoff with jitter: `min(2^i, 30) seconds` base plus a
/// uniform `[0, 1s)` fuzz.
pub fn retry_delay(attempt_index: u32) -> Duration {
    // 2^5 seconds already exceeds the cap.
    let base = Duration::from_millis((1u64 << attempt_index.min(5)) * 1000).min(MAX_BACKOFF);
    let jitter = Duration::from_millis((rand_factor() * JITTER_MS as f64) as u64);
    base + jitter
}

/// Simple pseudo-random factor [0, 1) without pulling in the rand crate.
fn rand_factor() -> f64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .hash(&mut hasher);
    std::thread::current().id().hash(&mut hasher);

    let hash = hasher.finish();
    (hash % 10000) as f64 / 10000.0
}
