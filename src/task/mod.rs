//! Logical task identifiers used for model routing.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// A logical unit of generation work.
///
/// Each task maps to an ordered model list in [`crate::router::ModelPolicy`];
/// the identifier strings ("explain-page", ...) appear in logs and cache keys.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Task {
    ExplainPage,
    SynthesizeSummary,
    GenerateQuiz,
    DiagnoseBarrier,
    Embedding,
}
