//! GPU identification domain type

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one GPU by its driver index (0-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceHandle(u32);

impl DeviceHandle {
    /// Create a handle for the GPU at `index`
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Get the GPU index
    #[inline]
    pub const fn index(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPU {}", self.0)
    }
}

impl From<u32> for DeviceHandle {
    fn from(index: u32) -> Self {
        Self::new(index)
    }
}
