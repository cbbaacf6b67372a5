//! Qubit addressing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a qubit within a circuit register.
///
/// Bit `i` of a computational basis index corresponds to `QubitId(i)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QubitId(pub u32);

impl QubitId {
    /// Index as `usize`, for addressing amplitudes and feature slices.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for QubitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

impl From<u32> for QubitId {
    fn from(id: u32) -> Self {
        QubitId(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(QubitId(3).to_string(), "q3");
    }

    #[test]
    fn test_ordering_and_index() {
        assert!(QubitId(1) < QubitId(2));
        assert_eq!(QubitId(7).index(), 7);
    }

    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&QubitId(5)).unwrap();
        assert_eq!(json, "5");
    }
}
