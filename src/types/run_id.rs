//! Run identifier type using TypeID format.
//!
//! Format: `run_01h455vb4pex5vsknk084sn02q`

use mti::prelude::*;
use serde::{Serialize, Serializer};
use std::fmt;

/// Identifies one `run_interaction` call of the agent loop.
///
/// Time-sortable, so runs written to the same log file order naturally.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(MagicTypeId);

impl RunId {
    /// The TypeID prefix for run identifiers.
    pub const PREFIX: &'static str = "run";

    /// Creates a fresh run ID backed by a UUIDv7.
    #[must_use]
    pub fn new() -> Self {
        Self(Self::PREFIX.create_type_id::<V7>())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for RunId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.to_string().serialize(serializer)
    }
}
