//! Identifier for hunts.

use serde::{Deserialize, Serialize};

/// Identifier of a hunt. Ids are 1-based and their order is the unlock order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HuntId(pub u32);

impl HuntId {
    /// Create from a raw id.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// The id that follows this one in the unlock chain.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Raw numeric value.
    pub fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for HuntId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for HuntId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for HuntId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}
