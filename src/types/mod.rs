//! Identifier types shared across the crate.
//!
//! Each interaction run is tagged with a [`RunId`] so that log lines and the
//! returned [`Outcome`](crate::agent::Outcome) can be correlated.

mod run_id;

pub use run_id::RunId;
