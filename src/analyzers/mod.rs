//! Neighborhood aggregation, correlation and scoring.
//!
//! Cleaned records are grouped into per-source metric tables, outer-joined
//! into one profile table, correlated, and scored into the Civic Value Index.
//! Run-level statistics are computed from the scored profiles.

pub mod aggregate;
pub mod buckets;
pub mod correlate;
pub mod join;
pub mod score;
pub mod statistics;
pub mod tier;
pub mod types;
pub mod utility;
