//! Ingestion outcome types.

use std::fmt;

/// Success or failure indicator returned to ingestion callers.
///
/// Rendered as the plain-text bodies `ok` and `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// The identifier was recorded in the open window (or was already there).
    Accepted,
    /// The identifier was dropped because the store failed.
    Failed,
}

impl AcceptOutcome {
    /// Returns the response body for this outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "ok",
            Self::Failed => "failed",
        }
    }

    /// Returns true if the identifier was recorded.
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }
}

impl fmt::Display for AcceptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_bodies() {
        assert_eq!(AcceptOutcome::Accepted.as_str(), "ok");
        assert_eq!(AcceptOutcome::Failed.to_string(), "failed");
        assert!(AcceptOutcome::Accepted.is_accepted());
        assert!(!AcceptOutcome::Failed.is_accepted());
    }
}
