//! # Index Analytics
//!
//! The arithmetic of the index, kept free of I/O.
//!
//! ## Architectural Principles
//!
//! - **Pure logic:** Nothing here touches the network or the database. Callers
//!   read rows, hand them in, and persist what comes back.
//! - **Stateless calculation:** `IndexCalculator` only carries its weighting
//!   scheme, which makes it trivial to test.
//!
//! ## Public API
//!
//! - `IndexCalculator` / `IndexReturn`: the daily index return from two days of closes.
//! - `report`: derived views for reporting (weights, cumulative returns,
//!   composition changes, summary metrics).
//! - `AnalyticsError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod calculator;
pub mod error;
pub mod report;

// Re-export the key components to create a clean, public-facing API.
pub use calculator::{IndexCalculator, IndexReturn};
pub use error::AnalyticsError;
pub use report::{
    composition_changes, composition_weights, performance_series, summarize, CompositionChange,
    IndexSummary, PerformancePoint, WeightedConstituent,
};
