//! Implementation for the selected state.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::authenticated::open_mailbox;
use super::states::Selected;
use crate::Result;
use crate::command::{Command, FetchItems, FetchTarget, SearchCriteria};
use crate::parser::{FetchItem, UntaggedResponse};
use crate::types::{Mailbox, MailboxStatus, SeqNum, SequenceSet, Uid, UidSet};

impl<S> Client<S, Selected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// The selected mailbox.
    #[must_use]
    pub const fn mailbox(&self) -> &Mailbox {
        self.state.mailbox()
    }

    /// Status snapshot taken when the mailbox was opened.
    #[must_use]
    pub const fn status(&self) -> &MailboxStatus {
        self.state.status()
    }

    /// Re-opens a mailbox read-only, possibly the same one.
    pub async fn examine(self, mailbox: &Mailbox) -> Result<Self> {
        open_mailbox(self, mailbox, true).await
    }

    /// Re-opens a mailbox read-write.
    pub async fn select(self, mailbox: &Mailbox) -> Result<Self> {
        open_mailbox(self, mailbox, false).await
    }

    /// `SEARCH`, returning sequence numbers in server order.
    pub async fn search(&mut self, criteria: &SearchCriteria) -> Result<Vec<SeqNum>> {
        let hits = self.run_search(criteria, false).await?;
        Ok(hits.into_iter().filter_map(SeqNum::new).collect())
    }

    /// `UID SEARCH`, returning UIDs in server order.
    pub async fn uid_search(&mut self, criteria: &SearchCriteria) -> Result<Vec<Uid>> {
        let hits = self.run_search(criteria, true).await?;
        Ok(hits.into_iter().filter_map(Uid::new).collect())
    }

    async fn run_search(&mut self, criteria: &SearchCriteria, uid: bool) -> Result<Vec<u32>> {
        let command = Command::Search {
            criteria: criteria.clone(),
            uid,
        };
        let completion = self.execute(&command).await?;

        let hits: Vec<u32> = completion
            .untagged
            .into_iter()
            .filter_map(|untagged| match untagged {
                UntaggedResponse::Search(hits) => Some(hits),
                _ => None,
            })
            .flatten()
            .collect();
        tracing::debug!(command = command.name(), hits = hits.len(), "search completed");
        Ok(hits)
    }

    /// `FETCH` by sequence numbers.
    ///
    /// Returns (sequence number, data items) pairs in arrival order.
    pub async fn fetch(
        &mut self,
        set: &SequenceSet,
        items: FetchItems,
    ) -> Result<Vec<(SeqNum, Vec<FetchItem>)>> {
        self.run_fetch(FetchTarget::Sequence(set.clone()), items)
            .await
    }

    /// `UID FETCH`.
    ///
    /// Servers include the `UID` item in every response to this command.
    pub async fn uid_fetch(
        &mut self,
        set: &UidSet,
        items: FetchItems,
    ) -> Result<Vec<(SeqNum, Vec<FetchItem>)>> {
        self.run_fetch(FetchTarget::Uid(set.clone()), items).await
    }

    async fn run_fetch(
        &mut self,
        target: FetchTarget,
        items: FetchItems,
    ) -> Result<Vec<(SeqNum, Vec<FetchItem>)>> {
        let completion = self.execute(&Command::Fetch { target, items }).await?;

        Ok(completion
            .untagged
            .into_iter()
            .filter_map(|untagged| match untagged {
                UntaggedResponse::Fetch { seq, items } => Some((seq, items)),
                _ => None,
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio_test::io::{Builder, Mock};

    use super::*;
    use crate::Error;
    use crate::connection::NotAuthenticated;
    use crate::command::FetchAttribute;

    fn opening(builder: &mut Builder) -> &mut Builder {
        builder
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN u p\r\n")
            .read(b"A0001 OK done\r\n")
            .write(b"A0002 EXAMINE INBOX\r\n")
            .read(b"* 3 EXISTS\r\nA0002 OK [READ-ONLY] done\r\n")
    }

    async fn selected(mock: Mock) -> Client<Mock, Selected> {
        Client::<_, NotAuthenticated>::from_stream(mock)
            .await
            .unwrap()
            .login("u", "p")
            .await
            .unwrap()
            .examine(&Mailbox::inbox())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_uid_search_by_header() {
        let mock = opening(&mut Builder::new())
            .write(b"A0003 UID SEARCH HEADER From alice@example.com\r\n")
            .read(b"* SEARCH 101 205\r\nA0003 OK SEARCH completed\r\n")
            .build();
        let mut client = selected(mock).await;

        let criteria = SearchCriteria::Header("From".to_string(), "alice@example.com".to_string());
        let uids = client.uid_search(&criteria).await.unwrap();
        assert_eq!(uids, vec![Uid::new(101).unwrap(), Uid::new(205).unwrap()]);
    }

    #[tokio::test]
    async fn test_empty_search() {
        let mock = opening(&mut Builder::new())
            .write(b"A0003 SEARCH ALL\r\n")
            .read(b"* SEARCH\r\nA0003 OK done\r\n")
            .build();
        let mut client = selected(mock).await;
        assert!(client.search(&SearchCriteria::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_uid_fetch_full_message() {
        let mock = opening(&mut Builder::new())
            .write(b"A0003 UID FETCH 7 (UID BODY.PEEK[])\r\n")
            .read(b"* 2 FETCH (UID 7 BODY[] {5}\r\nhello)\r\n")
            .read(b"A0003 OK FETCH completed\r\n")
            .build();
        let mut client = selected(mock).await;

        let set = UidSet::single(Uid::new(7).unwrap());
        let items = FetchItems(vec![FetchAttribute::Uid, FetchAttribute::full_message()]);
        let messages = client.uid_fetch(&set, items).await.unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, SeqNum::new(2).unwrap());
        assert_eq!(
            messages[0].1[1],
            FetchItem::Body {
                section: None,
                data: Some(b"hello".to_vec()),
            }
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_surfaces_command() {
        let mock = opening(&mut Builder::new())
            .write(b"A0003 FETCH 1:3 (UID)\r\n")
            .read(b"A0003 NO Mailbox is locked\r\n")
            .build();
        let mut client = selected(mock).await;

        let set = SequenceSet::range(1, 3).unwrap();
        let err = client
            .fetch(&set, FetchItems(vec![FetchAttribute::Uid]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::No { command: "FETCH", ref text } if text == "Mailbox is locked"));
    }

    #[tokio::test]
    async fn test_smuggled_command_never_reaches_the_wire() {
        let mock = opening(&mut Builder::new())
            .write(b"A0004 NOOP\r\n")
            .read(b"A0004 OK done\r\n")
            .build();
        let mut client = selected(mock).await;

        let criteria = SearchCriteria::Header("To".to_string(), "b@x\r\nA9 LOGOUT".to_string());
        let err = client.uid_search(&criteria).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument("HEADER value")));
        client.noop().await.unwrap();
    }

    #[tokio::test]
    async fn test_unparseable_untagged_is_skipped() {
        let mock = opening(&mut Builder::new())
            .write(b"A0003 NOOP\r\n")
            .read(b"* \x01garbage\r\n* 4 EXISTS\r\nA0003 OK done\r\n")
            .build();
        let mut client = selected(mock).await;
        client.noop().await.unwrap();
    }
}
