//! Core domain types and logic.

pub mod trade;
pub mod lot;
pub mod matching;
pub mod position;
pub mod capital;
pub mod metrics;
pub mod period;
pub mod journal;
pub mod config_validation;
pub mod error;
