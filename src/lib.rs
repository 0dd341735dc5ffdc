//! Civic Value Index: neighborhood-level joins of municipal open data.
//!
//! Crime, 311, home-value and budget extracts are cleaned into typed
//! records, aggregated per neighborhood, correlated and scored into a
//! composite index, then written as a JSON/CSV bundle that a read-only HTTP
//! API serves.

pub mod analyzers;
pub mod api;
pub mod cleaner;
pub mod config;
pub mod error;
pub mod geo;
pub mod insights;
pub mod loader;
pub mod neighborhood;
pub mod output;
pub mod pipeline;
pub mod report;
