//! Convenience re-exports for common use.

pub use crate::backend::{BackendRequest, BackendResponse, GenerationBackend};
pub use crate::cache::{CacheScope, CachedClient, KeyValueStore, MemoryStore};
pub use crate::client::{RepairPolicy, StructuredGenerationClient, ValidatedGeneration};
pub use crate::config::DroverConfig;
pub use crate::error::{DroverError, Result};
pub use crate::router::{ModelChoice, ModelPolicy};
pub use crate::task::Task;
pub use crate::types::{
    AttemptOutcome, AttemptRecord, ConversationTurn, FailureCode, FailureError, GenerationMeta,
    GenerationRequest, GenerationResult, Role, Usage,
};
pub use crate::validate::{
    build_repair_prompt, normalize, validate, ValidationIssue, ValidationOutcome,
};
