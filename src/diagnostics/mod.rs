//! Structured diagnostics for cache population
//!
//! Per-city outcomes of a fetch run are collected instead of being swallowed,
//! so callers can report which cities were skipped and why.

pub mod population;

pub use population::{CityDiagnostic, PopulateReport, SkipReason};
