//! Core functionality for the face landmarks agent.
//!
//! This module contains:
//! - Events produced from detection results
//! - The result aggregator collapsing expression runs and debouncing face boxes

pub mod aggregator;
pub mod events;

// Re-export commonly used types
pub use aggregator::{
    average_age, most_occurred_gender, AggregatorConfig, ResultAggregator,
};
pub use events::{AggregatorEvent, ExpressionEvent};
