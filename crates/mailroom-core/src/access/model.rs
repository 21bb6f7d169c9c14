//! Access gate data models.

/// Stored permission flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessFlag {
    /// Access granted (`Y`).
    Granted,
    /// Access revoked or never granted (`N`).
    Revoked,
}

impl AccessFlag {
    /// Parse from database string representation.
    ///
    /// Only an exact `Y` grants access; any other stored value reads as
    /// revoked.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.trim() == "Y" {
            Self::Granted
        } else {
            Self::Revoked
        }
    }

    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Granted => "Y",
            Self::Revoked => "N",
        }
    }
}

/// Outcome of an access lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessVerdict {
    /// A record with a `Y` flag exists.
    Granted,
    /// A record exists without a `Y` flag.
    NotGranted,
    /// No record exists for the pair.
    Unknown,
}

impl AccessVerdict {
    /// True only for [`AccessVerdict::Granted`].
    #[must_use]
    pub const fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

impl From<Option<AccessFlag>> for AccessVerdict {
    fn from(flag: Option<AccessFlag>) -> Self {
        match flag {
            Some(AccessFlag::Granted) => Self::Granted,
            Some(AccessFlag::Revoked) => Self::NotGranted,
            None => Self::Unknown,
        }
    }
}

/// A stored permission relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRecord {
    /// Row identifier.
    pub id: i64,
    /// Identity that is granted access.
    pub primary_id: String,
    /// Identity whose messages are exposed.
    pub secondary_id: String,
    /// Current flag.
    pub flag: AccessFlag,
    /// Creation timestamp as stored.
    pub created_at: String,
}

/// Which messages a correspondence view retrieves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalStrategy {
    /// Only messages from the primary identity to the filter identity.
    SingleCorrespondent,
    /// Every message to the filter identity, whoever sent it.
    Cohort,
}

impl RetrievalStrategy {
    /// Granted access unlocks the cohort; anything else stays restricted.
    #[must_use]
    pub const fn for_verdict(verdict: AccessVerdict) -> Self {
        match verdict {
            AccessVerdict::Granted => Self::Cohort,
            AccessVerdict::NotGranted | AccessVerdict::Unknown => Self::SingleCorrespondent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_round_trip_and_lenient_parse() {
        assert_eq!(AccessFlag::parse(AccessFlag::Granted.as_str()), AccessFlag::Granted);
        assert_eq!(AccessFlag::parse(AccessFlag::Revoked.as_str()), AccessFlag::Revoked);
        assert_eq!(AccessFlag::parse("y"), AccessFlag::Revoked);
        assert_eq!(AccessFlag::parse(""), AccessFlag::Revoked);
    }

    #[test]
    fn test_unknown_is_restricted() {
        assert_eq!(AccessVerdict::from(None), AccessVerdict::Unknown);
        assert_eq!(
            RetrievalStrategy::for_verdict(AccessVerdict::Unknown),
            RetrievalStrategy::SingleCorrespondent
        );
        assert_eq!(
            RetrievalStrategy::for_verdict(AccessVerdict::NotGranted),
            RetrievalStrategy::SingleCorrespondent
        );
        assert_eq!(
            RetrievalStrategy::for_verdict(AccessVerdict::Granted),
            RetrievalStrategy::Cohort
        );
        assert!(!AccessVerdict::Unknown.is_granted());
    }
}
