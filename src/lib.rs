//! Drover — resilient structured-generation client.
//!
//! Routes each logical task across a prioritized list of model
//! identifiers, retries transient failures with bounded backoff,
//! enforces a hard wall-clock deadline per attempt, and validates the
//! returned JSON against per-endpoint schemas before callers touch it.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use drover::prelude::*;
//! use drover::backend::gemini::GeminiBackend;
//!
//! # async fn example() -> drover::error::Result<()> {
//! let config = DroverConfig::from_env();
//! let backend = Arc::new(GeminiBackend::from_config(&config)?);
//! let client = StructuredGenerationClient::new(backend, ModelPolicy::default());
//!
//! let request = GenerationRequest::builder()
//!     .task(Task::ExplainPage)
//!     .system_instruction("You are a patient tutor.".to_string())
//!     .conversation(vec![ConversationTurn::user("Explain page 12 simply.")])
//!     .json_mode(true)
//!     .build();
//!
//! match client.generate(request).await {
//!     GenerationResult::Success { value, meta } => {
//!         println!("{value} (model {:?}, {} attempts)", meta.model, meta.attempts);
//!     }
//!     GenerationResult::Failure { error, .. } => {
//!         // Callers apply their deterministic local fallback here.
//!         eprintln!("generation failed: {}", error.message);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod prelude;
pub mod router;
pub mod task;
pub mod types;
pub mod validate;
