//! Survey conversation engine — walks a respondent through the block graph,
//! resolving branching against accumulated answers, rendering templated
//! content, and tracking completion progress.

pub mod engine;
pub mod error;
pub mod progress;
pub mod render;
pub mod resolver;
pub mod variables;

pub use engine::{AnswerOutcome, StartOutcome, SurveyEngine};
pub use error::EngineError;
pub use render::FormattedBlock;
pub use resolver::ResolvedBlock;
