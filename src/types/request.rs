//! Generation request construction.

use std::time::Duration;

use bon::Builder;

use super::message::{ConversationTurn, Role};
use crate::task::Task;

/// Default per-attempt deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(40_000);

/// Default attempt budget across all models.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f64 = 0.2;

/// One logical generation call, constructed fresh per call and never
/// mutated mid-flight.
#[derive(Debug, Clone, Builder)]
pub struct GenerationRequest {
    /// Logical task, used to look up the model policy.
    pub task: Task,
    /// Optional system instruction, carried separately from the turns.
    pub system_instruction: Option<String>,
    /// Ordered user/model turns.
    #[builder(default)]
    pub conversation: Vec<ConversationTurn>,
    /// When set, the response must be a single parseable JSON document.
    #[builder(default = false)]
    pub json_mode: bool,
    /// JSON-schema-like descriptor forwarded to backends that support
    /// constrained output, and used by the validation layer.
    pub schema: Option<serde_json::Value>,
    #[builder(default = DEFAULT_TEMPERATURE)]
    pub temperature: f64,
    pub max_output_tokens: Option<u32>,
    /// Hard wall-clock deadline per attempt.
    #[builder(default = DEFAULT_TIMEOUT)]
    pub timeout: Duration,
    #[builder(default = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,
}

impl GenerationRequest {
    /// Text of the most recent user turn, if any.
    ///
    /// Used as the "original prompt" when composing a repair prompt and
    /// as the input snippet for cache-key derivation.
    pub fn latest_user_text(&self) -> Option<&str> {
        self.conversation
            .iter()
            .rev()
            .find(|turn| turn.role == Role::User)
            .map(|turn| turn.text.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_applies_defaults() {
        let request = GenerationRequest::builder()
            .task(Task::ExplainPage)
            .build();
        assert_eq!(request.timeout, DEFAULT_TIMEOUT);
        assert_eq!(request.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(request.temperature, DEFAULT_TEMPERATURE);
        assert!(!request.json_mode);
        assert!(request.conversation.is_empty());
    }

    #[test]
    fn latest_user_text_skips_model_turns() {
        let request = GenerationRequest::builder()
            .task(Task::GenerateQuiz)
            .conversation(vec![
                ConversationTurn::user("first"),
                ConversationTurn::model("reply"),
                ConversationTurn::user("second"),
                ConversationTurn::model("another reply"),
            ])
            .build();
        assert_eq!(request.latest_user_text(), Some("second"));
    }

    #[test]
    fn latest_user_text_empty_conversation() {
        let request = GenerationRequest::builder()
            .task(Task::Embedding)
            .build();
        assert_eq!(request.latest_user_text(), None);
    }
}
