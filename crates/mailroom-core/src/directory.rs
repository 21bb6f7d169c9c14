//! Correspondent directory lookups.

use mailroom_imap::{FetchAttribute, FetchItem, FetchItems, Mailbox, UidSet};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::fetch::{FetchOptions, fetch_summaries};
use crate::gateway::MailSession;
use crate::ordering::{dedupe_recipients, order};
use crate::search::{SearchPlan, plan, resolve};
use crate::{Error, Result};

/// How many of the newest sent messages are inspected for a display name.
pub const DISPLAY_NAME_WINDOW: usize = 10;

/// Finds the display name `address` signs its mail with.
///
/// Looks at the newest [`DISPLAY_NAME_WINDOW`] messages sent from the
/// address, newest first, and returns the first non-empty name attached to
/// a matching sender, title-cased. Returns an empty string when no message
/// carries one.
///
/// # Errors
///
/// Returns [`Error::Search`] or [`Error::Fetch`] when the server refuses a
/// step.
pub async fn resolve_display_name<S>(
    session: &mut MailSession<S>,
    mailbox: &Mailbox,
    address: &str,
) -> Result<String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let address = address.trim();
    let SearchPlan::Predicate(criteria) = plan(Some(address), None) else {
        return Ok(String::new());
    };

    session
        .examine(mailbox)
        .await
        .map_err(|source| Error::Search {
            stage: "examine",
            source,
        })?;
    let mut uids = session
        .uid_search(&criteria)
        .await
        .map_err(|source| Error::Search {
            stage: "search",
            source,
        })?;
    uids.sort_unstable();
    let recent = uids.split_off(uids.len().saturating_sub(DISPLAY_NAME_WINDOW));

    let Some(set) = UidSet::from_uids(recent) else {
        tracing::debug!(address, "no sent messages, display name unknown");
        return Ok(String::new());
    };

    let fetched = session
        .uid_fetch(
            &set,
            FetchItems(vec![FetchAttribute::Uid, FetchAttribute::Envelope]),
        )
        .await
        .map_err(|source| Error::Fetch {
            stage: "envelope",
            source,
        })?;

    let mut envelopes: Vec<_> = fetched
        .into_iter()
        .filter_map(|(_, items)| {
            let mut uid = None;
            let mut envelope = None;
            for item in items {
                match item {
                    FetchItem::Uid(value) => uid = Some(value),
                    FetchItem::Envelope(value) => envelope = Some(value),
                    _ => {}
                }
            }
            Some((uid?, envelope?))
        })
        .collect();
    envelopes.sort_by(|a, b| b.0.cmp(&a.0));

    let name = envelopes
        .iter()
        .flat_map(|(_, envelope)| &envelope.from)
        .find_map(|sender| {
            let email = sender.email()?;
            if !email.eq_ignore_ascii_case(address) {
                return None;
            }
            sender.display_name().map(title_case)
        })
        .unwrap_or_default();

    tracing::debug!(address, found = !name.is_empty(), "display name resolved");
    Ok(name)
}

/// Uppercases the first letter of every word and lowercases the rest.
fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut at_word_start = true;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// True when at least one message was sent from `sender` to `recipient`.
///
/// # Errors
///
/// Returns [`Error::Search`] when the search fails.
pub async fn has_correspondence<S>(
    session: &mut MailSession<S>,
    mailbox: &Mailbox,
    sender: &str,
    recipient: &str,
) -> Result<bool>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let set = resolve(session, mailbox, &plan(Some(sender), Some(recipient))).await?;
    Ok(!set.is_empty())
}

/// The local part of a well-formed address.
///
/// In this deployment the local part is the correspondent's mobile number.
///
/// # Errors
///
/// Returns [`Error::InvalidAddress`] unless the address has exactly one `@`
/// with text on both sides.
pub fn extract_mobile_number(address: &str) -> Result<String> {
    let address = address.trim();
    let invalid = || Error::InvalidAddress(address.to_string());

    let (local, domain) = address.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    Ok(local.to_string())
}

/// Everyone `primary` has written to, newest correspondence first.
///
/// Entries are cohort keys (see [`crate::ordering::dedupe_cohort`]); the
/// primary is never listed.
///
/// # Errors
///
/// Propagates search and fetch failures.
pub async fn fetch_correspondents<S>(
    session: &mut MailSession<S>,
    mailbox: &Mailbox,
    primary: &str,
    options: &FetchOptions,
) -> Result<Vec<String>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let set = resolve(session, mailbox, &plan(Some(primary), None)).await?;
    let summaries = order(fetch_summaries(session, mailbox, &set, options).await?);
    let correspondents = dedupe_recipients(&summaries, primary);
    tracing::debug!(
        primary,
        messages = summaries.len(),
        correspondents = correspondents.len(),
        "correspondents listed"
    );
    Ok(correspondents)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;
    use crate::testing::{
        PLAIN_STRUCTURE, envelope, envelope_to_all, examine, login, session, summary_line,
    };

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("DR. ana  MARIA-lopez"), "Dr. Ana  Maria-Lopez");
        assert_eq!(title_case("émile"), "Émile");
    }

    #[test]
    fn test_extract_mobile_number() {
        assert_eq!(extract_mobile_number(" 9876543210@clinic.org ").unwrap(), "9876543210");
        for bad in ["", "plain", "@clinic.org", "123@", "a@b@c"] {
            assert!(
                matches!(extract_mobile_number(bad), Err(Error::InvalidAddress(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_display_name_prefers_newest_match() {
        let older = envelope("Mon, 1 Jan 2024 10:00:00 +0000", "old", ("ANA OLD", "ana", "x.org"), ("b", "x"));
        let newer = envelope("Tue, 2 Jan 2024 10:00:00 +0000", "new", ("ana LOPEZ", "Ana", "X.org"), ("b", "x"));
        let response = format!(
            "* 1 FETCH (UID 4 ENVELOPE {older})\r\n* 2 FETCH (UID 9 ENVELOPE {newer})\r\nA0004 OK FETCH completed\r\n"
        );

        let mut builder = Builder::new();
        login(&mut builder);
        let mock = examine(&mut builder, 2, 2)
            .write(b"A0003 UID SEARCH HEADER From ana@x.org\r\n")
            .read(b"* SEARCH 9 4\r\nA0003 OK SEARCH completed\r\n")
            .write(b"A0004 UID FETCH 4,9 (UID ENVELOPE)\r\n")
            .read(response.as_bytes())
            .build();
        let mut s = session(mock).await;

        let name = resolve_display_name(&mut s, &Mailbox::inbox(), "ana@x.org")
            .await
            .unwrap();
        assert_eq!(name, "Ana Lopez");
    }

    #[tokio::test]
    async fn test_display_name_missing_is_empty() {
        let mut builder = Builder::new();
        login(&mut builder);
        let mock = examine(&mut builder, 2, 0)
            .write(b"A0003 UID SEARCH HEADER From ana@x.org\r\n")
            .read(b"* SEARCH\r\nA0003 OK SEARCH completed\r\n")
            .build();
        let mut s = session(mock).await;

        let name = resolve_display_name(&mut s, &Mailbox::inbox(), "ana@x.org")
            .await
            .unwrap();
        assert!(name.is_empty());
    }

    #[tokio::test]
    async fn test_has_correspondence() {
        let mut builder = Builder::new();
        login(&mut builder);
        let mock = examine(&mut builder, 2, 5)
            .write(b"A0003 UID SEARCH HEADER From a@x HEADER To b@x\r\n")
            .read(b"* SEARCH 3\r\nA0003 OK SEARCH completed\r\n")
            .write(b"A0004 UID SEARCH HEADER From a@x HEADER To c@x\r\n")
            .read(b"* SEARCH\r\nA0004 OK SEARCH completed\r\n")
            .build();
        let mut s = session(mock).await;

        assert!(has_correspondence(&mut s, &Mailbox::inbox(), "a@x", "b@x").await.unwrap());
        assert!(!has_correspondence(&mut s, &Mailbox::inbox(), "a@x", "c@x").await.unwrap());
    }

    #[tokio::test]
    async fn test_fetch_correspondents() {
        let first = envelope("Mon, 1 Jan 2024 10:00:00 +0000", "one", ("Ana", "a", "x"), ("111", "x"));
        let second = envelope("Wed, 3 Jan 2024 10:00:00 +0000", "two", ("Ana", "a", "x"), ("222", "y"));
        let third = envelope("Tue, 2 Jan 2024 10:00:00 +0000", "three", ("Ana", "a", "x"), ("111", "y"));
        let mut response = String::new();
        response.push_str(&summary_line(1, 11, &first, PLAIN_STRUCTURE));
        response.push_str(&summary_line(2, 12, &second, PLAIN_STRUCTURE));
        response.push_str(&summary_line(3, 13, &third, PLAIN_STRUCTURE));
        response.push_str("A0004 OK FETCH completed\r\n");

        let mut builder = Builder::new();
        login(&mut builder);
        let mock = examine(&mut builder, 2, 3)
            .write(b"A0003 UID SEARCH HEADER From a@x\r\n")
            .read(b"* SEARCH 11 12 13\r\nA0003 OK SEARCH completed\r\n")
            .write(b"A0004 UID FETCH 11:13 (UID INTERNALDATE ENVELOPE BODYSTRUCTURE)\r\n")
            .read(response.as_bytes())
            .build();
        let mut s = session(mock).await;

        let correspondents = fetch_correspondents(&mut s, &Mailbox::inbox(), "a@x", &FetchOptions::new(2))
            .await
            .unwrap();
        assert_eq!(correspondents, vec!["222", "111"]);
    }

    #[tokio::test]
    async fn test_fetch_correspondents_lists_every_recipient() {
        let group = envelope_to_all(
            "Mon, 1 Jan 2024 10:00:00 +0000",
            "group",
            ("Ana", "a", "x"),
            &[("111", "x"), ("222", "x"), ("a", "x")],
        );
        let single = envelope("Tue, 2 Jan 2024 10:00:00 +0000", "single", ("Ana", "a", "x"), ("333", "x"));
        let mut response = String::new();
        response.push_str(&summary_line(1, 21, &group, PLAIN_STRUCTURE));
        response.push_str(&summary_line(2, 22, &single, PLAIN_STRUCTURE));
        response.push_str("A0004 OK FETCH completed\r\n");

        let mut builder = Builder::new();
        login(&mut builder);
        let mock = examine(&mut builder, 2, 2)
            .write(b"A0003 UID SEARCH HEADER From a@x\r\n")
            .read(b"* SEARCH 21 22\r\nA0003 OK SEARCH completed\r\n")
            .write(b"A0004 UID FETCH 21:22 (UID INTERNALDATE ENVELOPE BODYSTRUCTURE)\r\n")
            .read(response.as_bytes())
            .build();
        let mut s = session(mock).await;

        let correspondents = fetch_correspondents(&mut s, &Mailbox::inbox(), "a@x", &FetchOptions::new(2))
            .await
            .unwrap();
        assert_eq!(correspondents, vec!["333", "111", "222"]);
    }
}
