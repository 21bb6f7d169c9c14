//! High-level facade over the retrieval pipeline.
//!
//! Every call opens its own session, runs one operation in it and logs out.

use mailroom_imap::{ImapStream, Uid};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::access::{AccessRepository, AccessVerdict, RetrievalStrategy};
use crate::config::MailroomConfig;
use crate::directory::{fetch_correspondents, resolve_display_name};
use crate::fetch::fetch_summaries;
use crate::gateway::{MailSession, with_session};
use crate::model::{MessageBody, MessageSummary};
use crate::ordering::order;
use crate::reconstruct::{AttachmentData, fetch_attachment, reconstruct};
use crate::search::{SearchPlan, plan, resolve};
use crate::Result;

/// Retrieval service: configuration plus the access store.
pub struct Mailroom {
    config: MailroomConfig,
    access: AccessRepository,
}

impl std::fmt::Debug for Mailroom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailroom")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Mailroom {
    /// Creates the service, opening the access store named in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::AccessStore`] if the store cannot be opened.
    pub async fn new(config: MailroomConfig) -> Result<Self> {
        let access = match config.access_db.as_deref() {
            Some(path) => AccessRepository::new(path).await?,
            None => AccessRepository::in_memory().await?,
        };
        Ok(Self::with_repository(config, access))
    }

    /// Creates the service around an existing access store.
    #[must_use]
    pub const fn with_repository(config: MailroomConfig, access: AccessRepository) -> Self {
        Self { config, access }
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &MailroomConfig {
        &self.config
    }

    /// The access store.
    #[must_use]
    pub const fn access(&self) -> &AccessRepository {
        &self.access
    }

    /// Chooses how to search for `primary`'s correspondence.
    ///
    /// Without a filter the primary's own mail is searched. With one, the
    /// access gate decides: a granted pair searches everything addressed to
    /// the filter identity, anything else only the mail between the two.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::AccessStore`] if the gate cannot be read.
    pub async fn plan_for(
        &self,
        primary: &str,
        filter: Option<&str>,
    ) -> Result<(RetrievalStrategy, SearchPlan)> {
        let filter = filter.map(str::trim).filter(|f| !f.is_empty());
        let verdict = match filter {
            Some(filter) => self.access.check_access(primary, filter).await?,
            None => AccessVerdict::Unknown,
        };

        let strategy = RetrievalStrategy::for_verdict(verdict);
        let search = match strategy {
            RetrievalStrategy::Cohort => plan(None, filter),
            RetrievalStrategy::SingleCorrespondent => plan(Some(primary), filter),
        };
        tracing::debug!(primary, ?filter, ?verdict, ?strategy, "retrieval planned");
        Ok((strategy, search))
    }

    /// Summaries of `primary`'s correspondence, newest first.
    ///
    /// # Errors
    ///
    /// Returns connection, search, fetch or access-store errors.
    pub async fn correspondence(
        &self,
        primary: &str,
        filter: Option<&str>,
    ) -> Result<Vec<MessageSummary>> {
        with_session(&self.config, async |session: &mut MailSession<ImapStream>| {
            self.correspondence_in(session, primary, filter).await
        })
        .await
    }

    /// [`Mailroom::correspondence`] over an already open session.
    ///
    /// # Errors
    ///
    /// Returns search, fetch or access-store errors.
    pub async fn correspondence_in<S>(
        &self,
        session: &mut MailSession<S>,
        primary: &str,
        filter: Option<&str>,
    ) -> Result<Vec<MessageSummary>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (_, search) = self.plan_for(primary, filter).await?;
        let mailbox = self.config.mailbox();
        let set = resolve(session, &mailbox, &search).await?;
        let summaries =
            fetch_summaries(session, &mailbox, &set, &self.config.fetch_options()).await?;
        tracing::info!(primary, count = summaries.len(), "correspondence retrieved");
        Ok(order(summaries))
    }

    /// Readable body and inline images of message `uid`.
    ///
    /// # Errors
    ///
    /// Returns connection or fetch errors, [`crate::Error::MessageNotFound`],
    /// [`crate::Error::EmptyBody`], [`crate::Error::Parse`] or
    /// [`crate::Error::NoContent`].
    pub async fn message_body(&self, uid: Uid) -> Result<MessageBody> {
        let mailbox = self.config.mailbox();
        with_session(&self.config, async |session: &mut MailSession<ImapStream>| {
            reconstruct(session, &mailbox, uid).await
        })
        .await
    }

    /// The attachment named `filename` in message `uid`.
    ///
    /// # Errors
    ///
    /// As [`Mailroom::message_body`], plus
    /// [`crate::Error::AttachmentNotFound`].
    pub async fn attachment(&self, uid: Uid, filename: &str) -> Result<AttachmentData> {
        let mailbox = self.config.mailbox();
        with_session(&self.config, async |session: &mut MailSession<ImapStream>| {
            fetch_attachment(session, &mailbox, uid, filename).await
        })
        .await
    }

    /// Display name `address` signs its mail with; empty when unknown.
    ///
    /// # Errors
    ///
    /// Returns connection, search or fetch errors.
    pub async fn display_name(&self, address: &str) -> Result<String> {
        let mailbox = self.config.mailbox();
        with_session(&self.config, async |session: &mut MailSession<ImapStream>| {
            resolve_display_name(session, &mailbox, address).await
        })
        .await
    }

    /// Everyone `primary` has written to.
    ///
    /// # Errors
    ///
    /// Returns connection, search or fetch errors.
    pub async fn correspondents(&self, primary: &str) -> Result<Vec<String>> {
        let mailbox = self.config.mailbox();
        let options = self.config.fetch_options();
        with_session(&self.config, async |session: &mut MailSession<ImapStream>| {
            fetch_correspondents(session, &mailbox, primary, &options).await
        })
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mailroom_imap::SearchCriteria;
    use tokio_test::io::Builder;

    use super::*;
    use crate::access::AccessFlag;
    use crate::config::ServerAddress;
    use crate::testing::{PLAIN_STRUCTURE, envelope, examine, login, session, summary_line};

    async fn mailroom() -> Mailroom {
        let config = MailroomConfig::new(ServerAddress::parse("imap.example.com:993").unwrap(), "u", "p");
        Mailroom::with_repository(config, AccessRepository::in_memory().await.unwrap())
    }

    fn header(field: &str, value: &str) -> SearchCriteria {
        SearchCriteria::Header(field.to_string(), value.to_string())
    }

    #[tokio::test]
    async fn test_without_filter_searches_primary_mail() {
        let service = mailroom().await;
        let (strategy, search) = service.plan_for("doc@x", None).await.unwrap();
        assert_eq!(strategy, RetrievalStrategy::SingleCorrespondent);
        assert_eq!(search, SearchPlan::Predicate(header("From", "doc@x")));
    }

    #[tokio::test]
    async fn test_unknown_and_revoked_pairs_stay_single() {
        let service = mailroom().await;
        let expected = SearchPlan::Predicate(SearchCriteria::And(vec![
            header("From", "doc@x"),
            header("To", "pat@x"),
        ]));

        let (strategy, search) = service.plan_for("doc@x", Some("pat@x")).await.unwrap();
        assert_eq!(strategy, RetrievalStrategy::SingleCorrespondent);
        assert_eq!(search, expected);

        service
            .access()
            .set_access("doc@x", "pat@x", AccessFlag::Revoked)
            .await
            .unwrap();
        let (strategy, search) = service.plan_for("doc@x", Some("pat@x")).await.unwrap();
        assert_eq!(strategy, RetrievalStrategy::SingleCorrespondent);
        assert_eq!(search, expected);
    }

    #[tokio::test]
    async fn test_granted_pair_uses_cohort() {
        let service = mailroom().await;
        service.access().grant_if_revoked("doc@x", "pat@x").await.unwrap();

        let (strategy, search) = service.plan_for("doc@x", Some(" pat@x ")).await.unwrap();
        assert_eq!(strategy, RetrievalStrategy::Cohort);
        assert_eq!(search, SearchPlan::Predicate(header("To", "pat@x")));
    }

    #[tokio::test]
    async fn test_correspondence_is_ordered() {
        let older = envelope("Mon, 1 Jan 2024 10:00:00 +0000", "first", ("Doc", "doc", "x"), ("pat", "x"));
        let newer = envelope("Tue, 2 Jan 2024 10:00:00 +0000", "second", ("Doc", "doc", "x"), ("pat", "x"));
        let mut response = String::new();
        response.push_str(&summary_line(1, 101, &older, PLAIN_STRUCTURE));
        response.push_str(&summary_line(2, 102, &newer, PLAIN_STRUCTURE));
        response.push_str("A0004 OK FETCH completed\r\n");

        let mut builder = Builder::new();
        login(&mut builder);
        let mock = examine(&mut builder, 2, 2)
            .write(b"A0003 UID SEARCH HEADER From doc@x HEADER To pat@x\r\n")
            .read(b"* SEARCH 101 102\r\nA0003 OK SEARCH completed\r\n")
            .write(b"A0004 UID FETCH 101:102 (UID INTERNALDATE ENVELOPE BODYSTRUCTURE)\r\n")
            .read(response.as_bytes())
            .build();
        let mut s = session(mock).await;

        let service = mailroom().await;
        let summaries = service
            .correspondence_in(&mut s, "doc@x", Some("pat@x"))
            .await
            .unwrap();
        let uids: Vec<u32> = summaries.iter().map(|m| m.uid).collect();
        assert_eq!(uids, vec![102, 101]);
        assert_eq!(summaries[0].subject, "second");
    }
}
