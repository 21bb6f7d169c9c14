//! Concurrent fetch engine.
//!
//! One batched metadata FETCH per call; the per-message post-processing
//! (address formatting, date parsing, attachment inventory) then fans out
//! over a bounded pool of tasks. All tasks are joined before anything is
//! returned, and results come back in fetch order regardless of which task
//! finished first.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mailroom_imap::{BodyStructure, Envelope, FetchItem, FetchItems, Mailbox, SeqNum};
use mailroom_mime::encoding::{decode_rfc2047, decode_rfc2231};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::DEFAULT_FETCH_WORKERS;
use crate::gateway::MailSession;
use crate::model::MessageSummary;
use crate::search::MessageSet;
use crate::{Error, Result};

/// Fetch tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    workers: usize,
}

impl FetchOptions {
    /// Caps concurrent post-processing tasks at `workers` (at least one).
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// The worker cap.
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_WORKERS)
    }
}

/// Fetches summaries for every message in `set`.
///
/// Messages without a UID, a sender or a recipient are dropped and logged;
/// they never fail the batch. The mailbox is only read: every item fetched
/// here leaves `\Seen` untouched.
///
/// # Errors
///
/// Returns [`Error::Fetch`] when the mailbox cannot be opened or the FETCH
/// fails (no partial results), and [`Error::Worker`] if a post-processing
/// task dies.
pub async fn fetch_summaries<S>(
    session: &mut MailSession<S>,
    mailbox: &Mailbox,
    set: &MessageSet,
    options: &FetchOptions,
) -> Result<Vec<MessageSummary>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    session
        .examine(mailbox)
        .await
        .map_err(|source| Error::Fetch {
            stage: "examine",
            source,
        })?;

    let fetched = match set {
        MessageSet::Empty => return Ok(Vec::new()),
        MessageSet::Sequence(seqs) => session.fetch(seqs, FetchItems::summary()).await,
        MessageSet::Uids(uids) => session.uid_fetch(uids, FetchItems::summary()).await,
    }
    .map_err(|source| Error::Fetch {
        stage: "metadata",
        source,
    })?;

    let total = fetched.len();
    let permits = Arc::new(Semaphore::new(options.workers()));
    let mut tasks = JoinSet::new();

    for (index, (seq, items)) in fetched.into_iter().enumerate() {
        // bounds live tasks, not just running ones
        let permit = Arc::clone(&permits)
            .acquire_owned()
            .await
            .map_err(|e| Error::Worker(e.to_string()))?;
        tasks.spawn(async move {
            let _permit = permit;
            (index, summarize(seq, items))
        });
    }

    let mut slots: Vec<Option<MessageSummary>> = vec![None; total];
    while let Some(joined) = tasks.join_next().await {
        let (index, summary) = joined.map_err(|e| Error::Worker(e.to_string()))?;
        slots[index] = summary;
    }

    let summaries: Vec<MessageSummary> = slots.into_iter().flatten().collect();
    tracing::debug!(
        fetched = total,
        kept = summaries.len(),
        workers = options.workers(),
        "summaries fetched"
    );
    Ok(summaries)
}

/// Builds a summary from one message's FETCH items.
///
/// Returns `None` when the UID, the envelope, a sender or a recipient is
/// missing.
#[must_use]
pub fn summarize(seq: SeqNum, items: Vec<FetchItem>) -> Option<MessageSummary> {
    let mut uid = None;
    let mut envelope: Option<Box<Envelope>> = None;
    let mut structure = None;
    let mut internal_date = None;

    for item in items {
        match item {
            FetchItem::Uid(value) => uid = Some(value),
            FetchItem::Envelope(value) => envelope = Some(value),
            FetchItem::BodyStructure(value) => structure = Some(value),
            FetchItem::InternalDate(value) => internal_date = Some(value),
            _ => {}
        }
    }

    let (Some(uid), Some(envelope)) = (uid, envelope) else {
        tracing::debug!(%seq, "dropping message without uid or envelope");
        return None;
    };

    let sender = envelope.from.iter().find(|a| a.email().is_some());
    let from = sender.and_then(mailroom_imap::Address::email);
    let recipients: Vec<String> = envelope
        .to
        .iter()
        .filter_map(mailroom_imap::Address::email)
        .collect();
    let (Some(from), Some(to)) = (from, recipients.first().cloned()) else {
        tracing::debug!(%seq, %uid, "dropping message without sender or recipient");
        return None;
    };

    Some(MessageSummary {
        seq: seq.get(),
        uid: uid.get(),
        subject: envelope
            .subject
            .as_deref()
            .map(decode_rfc2047)
            .unwrap_or_default(),
        from,
        from_name: sender
            .and_then(mailroom_imap::Address::display_name)
            .map(decode_rfc2047),
        to,
        recipients,
        date: message_date(envelope.date.as_deref(), internal_date.as_deref()),
        attachments: structure.as_ref().map(attachment_names).unwrap_or_default(),
    })
}

/// Names of every attachment or inline leaf, in structure order.
///
/// The disposition `filename` wins over the content-type `name`; parts
/// without a usable name are skipped.
#[must_use]
pub fn attachment_names(structure: &BodyStructure) -> Vec<String> {
    structure
        .leaves()
        .into_iter()
        .filter(|part| {
            part.disposition
                .as_ref()
                .is_some_and(|d| d.is_attachment() || d.is_inline())
        })
        .filter_map(part_filename)
        .collect()
}

fn part_filename(part: &BodyStructure) -> Option<String> {
    let usable = |name: String| {
        let name = name.trim().to_string();
        (!name.is_empty()).then_some(name)
    };

    let disposition = part.disposition.as_ref();
    disposition
        .and_then(|d| d.param("filename"))
        .map(decode_rfc2047)
        .and_then(usable)
        .or_else(|| {
            disposition
                .and_then(|d| d.param("filename*"))
                .map(decode_rfc2231)
                .and_then(usable)
        })
        .or_else(|| part.param("name").map(decode_rfc2047).and_then(usable))
}

/// The `Date:` header, falling back to the server's INTERNALDATE.
fn message_date(header: Option<&str>, internal: Option<&str>) -> Option<DateTime<Utc>> {
    header
        .and_then(parse_header_date)
        .or_else(|| internal.and_then(parse_internal_date))
}

fn parse_header_date(value: &str) -> Option<DateTime<Utc>> {
    // trailing zone comments like "(UTC)" are not part of RFC 2822 proper
    let value = value.find('(').map_or(value, |i| &value[..i]).trim();
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

fn parse_internal_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(value.trim(), "%d-%b-%Y %H:%M:%S %z")
        .ok()
        .map(|date| date.with_timezone(&Utc))
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
    use mailroom_imap::{Address, BodyKind, Disposition, SequenceSet, Uid, UidSet};
    use tokio_test::io::Builder;

    use super::*;
    use crate::testing::{
        ATTACHMENT_STRUCTURE, PLAIN_STRUCTURE, envelope, examine, login, session, summary_line,
    };

    fn pairs(list: &[(&str, &str)]) -> Vec<(String, String)> {
        list.iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn leaf(media: &str, params: &[(&str, &str)]) -> BodyStructure {
        let (media_type, media_subtype) = media.split_once('/').unwrap();
        BodyStructure {
            media_type: media_type.to_string(),
            media_subtype: media_subtype.to_string(),
            params: pairs(params),
            disposition: None,
            kind: BodyKind::Single {
                id: None,
                description: None,
                encoding: "base64".to_string(),
                size: 10,
                lines: None,
            },
        }
    }

    fn disposed(kind: &str, params: &[(&str, &str)], mut part: BodyStructure) -> BodyStructure {
        part.disposition = Some(Disposition {
            kind: kind.to_string(),
            params: pairs(params),
        });
        part
    }

    fn multipart(parts: Vec<BodyStructure>) -> BodyStructure {
        BodyStructure {
            media_type: "multipart".to_string(),
            media_subtype: "mixed".to_string(),
            params: vec![],
            disposition: None,
            kind: BodyKind::Multipart { parts },
        }
    }

    fn address(local: &str, host: &str) -> Address {
        Address {
            name: None,
            adl: None,
            mailbox: Some(local.to_string()),
            host: Some(host.to_string()),
        }
    }

    #[test]
    fn test_attachment_names_filters_by_disposition_and_name() {
        let structure = multipart(vec![
            leaf("text/plain", &[("charset", "utf-8")]),
            disposed(
                "attachment",
                &[("filename", "report.pdf")],
                leaf("application/pdf", &[]),
            ),
            disposed("inline", &[], leaf("image/png", &[("name", "scan.png")])),
            disposed(
                "attachment",
                &[("filename", "  ")],
                leaf("application/zip", &[]),
            ),
            leaf("image/gif", &[("name", "spacer.gif")]),
            multipart(vec![disposed(
                "attachment",
                &[("filename", "=?UTF-8?Q?r=C3=A9sultats.csv?=")],
                leaf("text/csv", &[]),
            )]),
        ]);

        assert_eq!(
            attachment_names(&structure),
            vec!["report.pdf", "scan.png", "résultats.csv"]
        );
    }

    #[test]
    fn test_disposition_filename_wins_over_name() {
        let part = disposed(
            "attachment",
            &[("filename", "final.pdf")],
            leaf("application/pdf", &[("name", "draft.pdf")]),
        );
        assert_eq!(attachment_names(&part), vec!["final.pdf"]);
    }

    #[test]
    fn test_summarize_requires_sender_and_recipient() {
        let seq = SeqNum::new(1).unwrap();
        let mut env = Envelope {
            subject: Some("=?UTF-8?B?SGVsbG8=?=".to_string()),
            from: vec![Address {
                name: Some("Ana Ruiz".to_string()),
                ..address("a", "x")
            }],
            ..Envelope::default()
        };

        let items = |env: &Envelope| {
            vec![
                FetchItem::Uid(Uid::new(101).unwrap()),
                FetchItem::Envelope(Box::new(env.clone())),
            ]
        };
        assert!(summarize(seq, items(&env)).is_none());

        env.to = vec![address("b", "x"), address("c", "y")];
        let summary = summarize(seq, items(&env)).unwrap();
        assert_eq!(summary.uid, 101);
        assert_eq!(summary.subject, "Hello");
        assert_eq!(summary.from, "a@x");
        assert_eq!(summary.from_name.as_deref(), Some("Ana Ruiz"));
        assert_eq!(summary.to, "b@x");
        assert_eq!(summary.recipients, vec!["b@x", "c@y"]);
        assert!(summary.date.is_none());

        assert!(summarize(seq, vec![FetchItem::Envelope(Box::new(env))]).is_none());
    }

    #[test]
    fn test_dates() {
        let header = parse_header_date("Fri, 1 Mar 2024 10:00:00 +0100 (CET)").unwrap();
        assert_eq!(header.to_rfc3339(), "2024-03-01T09:00:00+00:00");

        let internal = parse_internal_date(" 1-Mar-2024 09:00:00 +0000").unwrap();
        assert_eq!(internal, header);

        assert_eq!(message_date(Some("garbage"), Some("01-Mar-2024 09:00:00 +0000")), Some(internal));
        assert_eq!(message_date(None, None), None);
    }

    #[tokio::test]
    async fn test_fetch_keeps_order_and_drops_malformed() {
        let first = envelope("Fri, 1 Mar 2024 09:00:00 +0000", "one", ("Ana", "a", "x"), ("b", "x"));
        let second = envelope("Sat, 2 Mar 2024 09:00:00 +0000", "two", ("Ana", "a", "x"), ("c", "x"));
        let no_recipient = "(NIL \"three\" ((NIL NIL \"a\" \"x\")) NIL NIL NIL NIL NIL NIL NIL)";

        let mut response = String::new();
        response.push_str(&summary_line(1, 101, &first, PLAIN_STRUCTURE));
        response.push_str(&summary_line(2, 102, &second, ATTACHMENT_STRUCTURE));
        response.push_str(&summary_line(3, 103, no_recipient, PLAIN_STRUCTURE));
        response.push_str("A0003 OK FETCH completed\r\n");

        let mut builder = Builder::new();
        login(&mut builder);
        let mock = examine(&mut builder, 2, 3)
            .write(b"A0003 UID FETCH 101:103 (UID INTERNALDATE ENVELOPE BODYSTRUCTURE)\r\n")
            .read(response.as_bytes())
            .build();
        let mut s = session(mock).await;

        let uids = [101, 102, 103].map(|n| Uid::new(n).unwrap());
        let set = MessageSet::Uids(UidSet::from_uids(uids).unwrap());
        let summaries = fetch_summaries(&mut s, &Mailbox::inbox(), &set, &FetchOptions::new(1))
            .await
            .unwrap();

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].uid, 101);
        assert_eq!(summaries[1].uid, 102);
        assert_eq!(summaries[1].to, "c@x");
        assert_eq!(summaries[1].attachments, vec!["report.pdf"]);
        assert!(summaries[0].date < summaries[1].date);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_batch_error() {
        let mut builder = Builder::new();
        login(&mut builder);
        let mock = examine(&mut builder, 2, 3)
            .write(b"A0003 FETCH 1:3 (UID INTERNALDATE ENVELOPE BODYSTRUCTURE)\r\n")
            .read(b"* 1 FETCH (UID 5)\r\nA0003 NO server unavailable\r\n")
            .build();
        let mut s = session(mock).await;

        let set = MessageSet::Sequence(SequenceSet::range(1, 3).unwrap());
        let err = fetch_summaries(&mut s, &Mailbox::inbox(), &set, &FetchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fetch { stage: "metadata", .. }));
    }

    #[tokio::test]
    async fn test_empty_set_fetches_nothing() {
        let mut builder = Builder::new();
        login(&mut builder);
        let mock = examine(&mut builder, 2, 0).build();
        let mut s = session(mock).await;

        let summaries =
            fetch_summaries(&mut s, &Mailbox::inbox(), &MessageSet::Empty, &FetchOptions::default())
                .await
                .unwrap();
        assert!(summaries.is_empty());
    }

    #[test]
    fn test_worker_cap_is_at_least_one() {
        assert_eq!(FetchOptions::new(0).workers(), 1);
        assert_eq!(FetchOptions::default().workers(), 8);
    }
}
