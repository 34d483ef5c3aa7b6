//! Core pipeline types and abstractions

pub mod config;
pub mod correlation;
pub mod log;
pub mod observation;
pub mod series;
pub mod stats;
pub mod store;

// Re-export main types for cleaner imports
pub use correlation::{Coefficient, CorrelationMatrix, CorrelationResult, GroupedObservation};
pub use observation::{Observation, RawObservation};
pub use series::{LeadingNulls, NormalizeOptions, Series, SeriesError, TrailingNulls};
pub use store::{Document, DocumentStore};
