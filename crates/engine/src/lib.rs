//! # Engine
//!
//! Orchestrates one `update` run against the index database:
//!
//! 1. acquire the run lock next to the database,
//! 2. list the ticker universe and keep the first `top_n` symbols,
//! 3. snapshot market cap and price for each symbol,
//! 4. append the recent daily bars for each symbol,
//! 5. compute and append the day's index return.
//!
//! Per-symbol failures are logged and skipped. A failing universe source, the
//! store, or too little history ends the run with an `EngineError`.

pub mod error;
pub mod lock;
pub mod pipeline;

pub use error::EngineError;
pub use lock::RunLock;
pub use pipeline::{calculate_return, record_return, IndexPipeline, RunSummary};
