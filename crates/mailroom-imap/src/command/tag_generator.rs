//! Command tag allocation.

/// Hands out sequential command tags (`A0001`, `A0002`, ...).
#[derive(Debug, Clone)]
pub struct TagGenerator {
    prefix: char,
    issued: u32,
}

impl TagGenerator {
    /// Creates a generator whose tags start with `prefix`.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self { prefix, issued: 0 }
    }

    /// Returns the next tag.
    ///
    /// The counter wraps after `u32::MAX` tags; only in-flight tags need to
    /// be unique and a session never has more than one outstanding command.
    pub fn next(&mut self) -> String {
        self.issued = self.issued.wrapping_add(1);
        format!("{}{:04}", self.prefix, self.issued)
    }

    /// Number of tags issued so far.
    #[must_use]
    pub const fn issued(&self) -> u32 {
        self.issued
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
    }
}

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
    fn tags_are_sequential_and_padded() {
        let mut tags = TagGenerator::default();
        assert_eq!(tags.next(), "A0001");
        assert_eq!(tags.next(), "A0002");
        assert_eq!(tags.issued(), 2);
    }

    #[test]
    fn wide_counters_keep_growing() {
        let mut tags = TagGenerator::new('M');
        for _ in 0..10_000 {
            let _ = tags.next();
        }
        assert_eq!(tags.next(), "M10001");
    }

    #[test]
    fn counter_wraps_instead_of_panicking() {
        let mut tags = TagGenerator {
            prefix: 'A',
            issued: u32::MAX,
        };
        assert_eq!(tags.next(), "A0000");
    }
}
