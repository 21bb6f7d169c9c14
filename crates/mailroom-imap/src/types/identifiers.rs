//! Message identifiers and command tags.

use std::fmt;
use std::num::NonZeroU32;

/// Command tag correlating a request with its completion response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag(pub String);

impl Tag {
    /// Creates a tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the tag text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! nonzero_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub NonZeroU32);

        impl $name {
            /// Wraps a raw value; zero is not a valid identifier.
            #[must_use]
            pub fn new(n: u32) -> Option<Self> {
                NonZeroU32::new(n).map(Self)
            }

            /// Returns the raw value.
            #[must_use]
            pub fn get(self) -> u32 {
                self.0.get()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

nonzero_id!(
    /// Per-session message sequence number; shifts when messages are expunged.
    SeqNum
);

nonzero_id!(
    /// Durable message identifier, stable across sessions while UIDVALIDITY holds.
    Uid
);

nonzero_id!(
    /// Mailbox UIDVALIDITY; a change invalidates every stored UID.
    UidValidity
);

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_rejected() {
        assert!(SeqNum::new(0).is_none());
        assert!(Uid::new(0).is_none());
        assert!(UidValidity::new(0).is_none());
    }

    #[test]
    fn display_and_ordering() {
        let a = Uid::new(101).unwrap();
        let b = Uid::new(102).unwrap();
        assert!(a < b);
        assert_eq!(b.to_string(), "102");
        assert_eq!(Tag::new("A0007").to_string(), "A0007");
    }
}
