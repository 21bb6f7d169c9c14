//! Search planner.
//!
//! Builds the header predicate for a sender and/or recipient identity and
//! resolves it to the set of messages to fetch. Matching itself is the
//! server's header substring match; nothing here re-implements it.

use mailroom_imap::{Mailbox, SearchCriteria, SequenceSet, UidSet};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::gateway::MailSession;
use crate::{Error, Result};

/// What to search for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchPlan {
    /// No identity was given: every message in the mailbox, no search issued.
    Everything,
    /// A header predicate to send to the server.
    Predicate(SearchCriteria),
}

/// Builds a plan from a sender and a recipient identity.
///
/// Blank identities count as absent. With both present the predicate
/// requires both headers to match.
#[must_use]
pub fn plan(sender: Option<&str>, recipient: Option<&str>) -> SearchPlan {
    let present = |identity: Option<&str>| {
        identity
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToString::to_string)
    };

    let mut keys = Vec::new();
    if let Some(sender) = present(sender) {
        keys.push(SearchCriteria::Header("From".to_string(), sender));
    }
    if let Some(recipient) = present(recipient) {
        keys.push(SearchCriteria::Header("To".to_string(), recipient));
    }

    if keys.is_empty() {
        SearchPlan::Everything
    } else {
        SearchPlan::Predicate(SearchCriteria::all_of(keys))
    }
}

/// Messages selected by a resolved plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageSet {
    /// Nothing matched. Not an error.
    Empty,
    /// The full sequence range of the mailbox.
    Sequence(SequenceSet),
    /// UIDs returned by a search.
    Uids(UidSet),
}

impl MessageSet {
    /// True when nothing matched.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Opens `mailbox` read-only and resolves `plan` against it.
///
/// [`SearchPlan::Everything`] becomes `1..=EXISTS` without a search round
/// trip; an empty mailbox resolves to [`MessageSet::Empty`].
///
/// # Errors
///
/// Returns [`Error::Search`] naming the failing stage.
pub async fn resolve<S>(
    session: &mut MailSession<S>,
    mailbox: &Mailbox,
    plan: &SearchPlan,
) -> Result<MessageSet>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let status = session
        .examine(mailbox)
        .await
        .map_err(|source| Error::Search {
            stage: "examine",
            source,
        })?;

    let set = match plan {
        SearchPlan::Everything => {
            SequenceSet::range(1, status.exists).map_or(MessageSet::Empty, MessageSet::Sequence)
        }
        SearchPlan::Predicate(criteria) => {
            let uids = session
                .uid_search(criteria)
                .await
                .map_err(|source| Error::Search {
                    stage: "search",
                    source,
                })?;
            UidSet::from_uids(uids).map_or(MessageSet::Empty, MessageSet::Uids)
        }
    };

    tracing::debug!(%mailbox, ?set, "search resolved");
    Ok(set)
}
