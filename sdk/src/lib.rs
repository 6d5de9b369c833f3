//! Concierge SDK
//!
//! Shared library providing the error taxonomy and the records that cross the
//! boundary of the shopping concierge core. Used by the engine and by any
//! front end that renders its results.

/// Error types and handling
pub mod errors;

/// Requirement slots and the interview requirement set
pub mod requirements;

/// Recommendation and preference records
pub mod types;

// Re-export commonly used types
pub use errors::{ConciergeErrorExt, EngineError, Stage, StageError};
pub use requirements::{Budget, Constraint, QaTurn, RequirementSet, Slot, SlotValue};
pub use types::{PreferenceRecord, Price, Rationale, Recommendation, SpecValue};
