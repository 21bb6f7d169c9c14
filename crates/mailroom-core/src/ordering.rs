//! Ordering and correspondent deduplication.

use std::collections::HashSet;

use crate::model::MessageSummary;

/// Sorts newest first.
///
/// The sort is stable: messages with equal timestamps keep their fetch
/// order. Messages without a timestamp go last.
#[must_use]
pub fn order(mut summaries: Vec<MessageSummary>) -> Vec<MessageSummary> {
    // None < Some, so the reversed comparison puts undated messages last
    summaries.sort_by(|a, b| b.date.cmp(&a.date));
    summaries
}

/// Lowercased, trimmed address.
#[must_use]
pub fn canonical_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Cohort key: the canonical local part.
fn cohort_key(identity: &str) -> String {
    let canonical = canonical_address(identity);
    match canonical.split_once('@') {
        Some((local, _)) => local.to_string(),
        None => canonical,
    }
}

/// Distinct cohort keys of `identities`, in first-seen order.
///
/// Addresses differing only in case, surrounding whitespace or domain
/// collapse to one entry. `primary` never appears in the result, and blank
/// identities are skipped. Feeding the output back in returns it unchanged.
#[must_use]
pub fn dedupe_cohort<'a>(
    identities: impl IntoIterator<Item = &'a str>,
    primary: &str,
) -> Vec<String> {
    let excluded = cohort_key(primary);
    let mut seen = HashSet::new();
    identities
        .into_iter()
        .map(cohort_key)
        .filter(|key| !key.is_empty() && *key != excluded)
        .filter(|key| seen.insert(key.clone()))
        .collect()
}

/// Distinct recipients of `summaries`, excluding `primary`.
///
/// Every `To` address of every message counts, in message then header
/// order.
#[must_use]
pub fn dedupe_recipients(summaries: &[MessageSummary], primary: &str) -> Vec<String> {
    dedupe_cohort(
        summaries
            .iter()
            .flat_map(|s| s.recipients.iter().map(String::as_str)),
        primary,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use proptest::prelude::*;

    use super::*;

    fn summary(uid: u32, to: &str, date: Option<DateTime<Utc>>) -> MessageSummary {
        MessageSummary {
            seq: uid,
            uid,
            subject: String::new(),
            from: "a@x".to_string(),
            from_name: None,
            to: to.to_string(),
            recipients: vec![to.to_string()],
            date,
            attachments: vec![],
        }
    }

    fn at(secs: i64) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(secs, 0).single()
    }

    #[test]
    fn test_two_message_scenario() {
        let fetched = vec![summary(101, "b@x", at(1_000)), summary(102, "c@x", at(2_000))];

        let ordered = order(fetched);
        let uids: Vec<u32> = ordered.iter().map(|s| s.uid).collect();
        assert_eq!(uids, vec![102, 101]);

        let mut recipients = dedupe_recipients(&ordered, "a@x");
        recipients.sort();
        assert_eq!(recipients, vec!["b", "c"]);
    }

    #[test]
    fn test_every_recipient_is_listed() {
        let mut group = summary(1, "b@x", at(10));
        group.recipients = vec!["b@x".to_string(), "A@x".to_string(), "c@y".to_string()];
        let summaries = vec![group, summary(2, "d@x", at(5))];
        assert_eq!(dedupe_recipients(&summaries, "a@x"), vec!["b", "c", "d"]);
    }

    #[test]
    fn test_ties_keep_fetch_order_and_undated_last() {
        let ordered = order(vec![
            summary(1, "b@x", None),
            summary(2, "b@x", at(5)),
            summary(3, "b@x", at(5)),
            summary(4, "b@x", at(9)),
        ]);
        let uids: Vec<u32> = ordered.iter().map(|s| s.uid).collect();
        assert_eq!(uids, vec![4, 2, 3, 1]);
    }

    #[test]
    fn test_dedupe_collapses_case_space_and_domain() {
        let ids = [" Bob@X.org", "bob@y.net", "BOB@x.org ", "carol@x.org", "alice@x.org", ""];
        assert_eq!(dedupe_cohort(ids, "Alice@Clinic.org"), vec!["bob", "carol"]);
    }

    #[test]
    fn test_canonical_address() {
        assert_eq!(canonical_address("  Ana@Example.COM \t"), "ana@example.com");
    }

    proptest! {
        #[test]
        fn order_is_sorted_and_stable(dates in proptest::collection::vec(proptest::option::of(0i64..20), 0..40)) {
            let input: Vec<MessageSummary> = dates
                .iter()
                .enumerate()
                .map(|(i, secs)| summary(u32::try_from(i).unwrap() + 1, "b@x", secs.and_then(at)))
                .collect();
            let ordered = order(input);

            for pair in ordered.windows(2) {
                prop_assert!(pair[0].date >= pair[1].date);
                if pair[0].date == pair[1].date {
                    prop_assert!(pair[0].uid < pair[1].uid);
                }
            }
        }

        #[test]
        fn dedupe_is_idempotent(ids in proptest::collection::vec("[a-cA-C ]{0,3}(@[xy])?", 0..30)) {
            let once = dedupe_cohort(ids.iter().map(String::as_str), "a@x");
            let twice = dedupe_cohort(once.iter().map(String::as_str), "a@x");
            prop_assert_eq!(&once, &twice);

            let unique: HashSet<&String> = once.iter().collect();
            prop_assert_eq!(unique.len(), once.len());
        }
    }
}
