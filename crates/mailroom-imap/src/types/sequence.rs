//! Message sets used by SEARCH and FETCH.
//!
//! Both sets are stored as ordered runs so that a list of search hits
//! serializes compactly (`101:103,107`).

use std::fmt;

use super::{SeqNum, Uid};

/// An inclusive run; `end == None` means "up to the last message" (`*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    start: u32,
    end: Option<u32>,
}

impl fmt::Display for Run {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) if end == self.start => write!(f, "{}", self.start),
            Some(end) => write!(f, "{}:{end}", self.start),
            None => write!(f, "{}:*", self.start),
        }
    }
}

/// Collapses sorted, deduplicated numbers into contiguous runs.
fn coalesce(mut values: Vec<u32>) -> Vec<Run> {
    values.sort_unstable();
    values.dedup();

    let mut runs: Vec<Run> = Vec::new();
    for value in values {
        match runs.last_mut() {
            Some(Run {
                end: Some(end), ..
            }) if end.checked_add(1) == Some(value) => *end = value,
            _ => runs.push(Run {
                start: value,
                end: Some(value),
            }),
        }
    }
    runs
}

fn write_runs(f: &mut fmt::Formatter<'_>, runs: &[Run]) -> fmt::Result {
    for (i, run) in runs.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{run}")?;
    }
    Ok(())
}

/// A set of sequence numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceSet {
    runs: Vec<Run>,
}

impl SequenceSet {
    /// A single message.
    #[must_use]
    pub fn single(n: u32) -> Option<Self> {
        SeqNum::new(n).map(|seq| Self {
            runs: vec![Run {
                start: seq.get(),
                end: Some(seq.get()),
            }],
        })
    }

    /// The inclusive range `start..=end`.
    #[must_use]
    pub fn range(start: u32, end: u32) -> Option<Self> {
        let start = SeqNum::new(start)?.get();
        let end = SeqNum::new(end)?.get();
        Some(Self {
            runs: vec![Run {
                start: start.min(end),
                end: Some(start.max(end)),
            }],
        })
    }

    /// Every message in the mailbox (`1:*`).
    #[must_use]
    pub fn all() -> Self {
        Self {
            runs: vec![Run {
                start: 1,
                end: None,
            }],
        }
    }

    /// Builds a set from arbitrary sequence numbers. Returns `None` when empty.
    #[must_use]
    pub fn from_seqs(seqs: impl IntoIterator<Item = SeqNum>) -> Option<Self> {
        let runs = coalesce(seqs.into_iter().map(SeqNum::get).collect());
        (!runs.is_empty()).then_some(Self { runs })
    }
}

impl fmt::Display for SequenceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_runs(f, &self.runs)
    }
}

/// A set of UIDs, used with the `UID` command prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UidSet {
    runs: Vec<Run>,
}

impl UidSet {
    /// A single UID.
    #[must_use]
    pub fn single(uid: Uid) -> Self {
        Self {
            runs: vec![Run {
                start: uid.get(),
                end: Some(uid.get()),
            }],
        }
    }

    /// Builds a set from arbitrary UIDs. Returns `None` when empty.
    #[must_use]
    pub fn from_uids(uids: impl IntoIterator<Item = Uid>) -> Option<Self> {
        let runs = coalesce(uids.into_iter().map(Uid::get).collect());
        (!runs.is_empty()).then_some(Self { runs })
    }

    /// Number of UIDs covered; `None` when the set is open-ended.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        self.runs.iter().try_fold(0usize, |acc, run| {
            let end = run.end?;
            Some(acc + (end - run.start) as usize + 1)
        })
    }

    /// Always false; empty sets are unrepresentable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

impl fmt::Display for UidSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_runs(f, &self.runs)
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

    fn uids(values: &[u32]) -> Vec<Uid> {
        values.iter().map(|&v| Uid::new(v).unwrap()).collect()
    }

    #[test]
    fn sequence_set_constructors() {
        assert_eq!(SequenceSet::single(4).unwrap().to_string(), "4");
        assert_eq!(SequenceSet::range(1, 25).unwrap().to_string(), "1:25");
        assert_eq!(SequenceSet::range(9, 3).unwrap().to_string(), "3:9");
        assert_eq!(SequenceSet::all().to_string(), "1:*");
        assert!(SequenceSet::single(0).is_none());
        assert!(SequenceSet::range(0, 5).is_none());
    }

    #[test]
    fn uid_set_coalesces_runs() {
        let set = UidSet::from_uids(uids(&[107, 101, 103, 102, 102])).unwrap();
        assert_eq!(set.to_string(), "101:103,107");
        assert_eq!(set.len(), Some(4));
    }

    #[test]
    fn uid_set_empty_is_none() {
        assert!(UidSet::from_uids(Vec::new()).is_none());
    }

    #[test]
    fn uid_set_single() {
        let set = UidSet::single(Uid::new(42).unwrap());
        assert_eq!(set.to_string(), "42");
        assert_eq!(set.len(), Some(1));
        assert!(!set.is_empty());
    }

    #[test]
    fn sequence_set_from_seqs() {
        let seqs = [3, 1, 2, 9].map(|n| SeqNum::new(n).unwrap());
        assert_eq!(SequenceSet::from_seqs(seqs).unwrap().to_string(), "1:3,9");
    }
}
