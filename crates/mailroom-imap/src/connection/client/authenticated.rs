//! Implementation for the authenticated state.

use tokio::io::{AsyncRead, AsyncWrite};

use super::states::{Authenticated, Selected};
use super::{Client, Completion};
use crate::Result;
use crate::command::Command;
use crate::parser::UntaggedResponse;
use crate::types::{Mailbox, MailboxStatus, ResponseCode};

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Opens a mailbox read-only.
    ///
    /// A refused EXAMINE logs the session out before the error is returned.
    pub async fn examine(self, mailbox: &Mailbox) -> Result<Client<S, Selected>> {
        open_mailbox(self, mailbox, true).await
    }

    /// Opens a mailbox read-write.
    pub async fn select(self, mailbox: &Mailbox) -> Result<Client<S, Selected>> {
        open_mailbox(self, mailbox, false).await
    }
}

/// Runs SELECT or EXAMINE and moves to the selected state.
pub(super) async fn open_mailbox<S, State>(
    mut client: Client<S, State>,
    mailbox: &Mailbox,
    read_only: bool,
) -> Result<Client<S, Selected>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let command = if read_only {
        Command::Examine(mailbox.clone())
    } else {
        Command::Select(mailbox.clone())
    };

    match client.execute(&command).await {
        Ok(completion) => {
            let status = mailbox_status(&completion, read_only);
            tracing::debug!(
                %mailbox,
                exists = status.exists,
                read_only = status.read_only,
                "mailbox opened"
            );
            Ok(client.transition(Selected::new(mailbox.clone(), status)))
        }
        Err(error) => Err(client.abandon(error).await),
    }
}

/// Collects the mailbox snapshot reported during SELECT/EXAMINE.
fn mailbox_status(completion: &Completion, examine: bool) -> MailboxStatus {
    let mut status = MailboxStatus {
        read_only: examine,
        ..MailboxStatus::default()
    };

    for untagged in &completion.untagged {
        match untagged {
            UntaggedResponse::Exists(n) => status.exists = *n,
            UntaggedResponse::Recent(n) => status.recent = *n,
            UntaggedResponse::Status {
                code: Some(code), ..
            } => apply_code(&mut status, code),
            _ => {}
        }
    }
    if let Some(code) = &completion.code {
        apply_code(&mut status, code);
    }

    status
}

fn apply_code(status: &mut MailboxStatus, code: &ResponseCode) {
    match code {
        ResponseCode::UidValidity(v) => status.uid_validity = Some(*v),
        ResponseCode::UidNext(uid) => status.uid_next = Some(*uid),
        ResponseCode::ReadOnly => status.read_only = true,
        ResponseCode::ReadWrite => status.read_only = false,
        _ => {}
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;
    use crate::Error;
    use crate::connection::NotAuthenticated;
    use crate::types::{Uid, UidValidity};

    async fn logged_in(mock: tokio_test::io::Mock) -> Client<tokio_test::io::Mock, Authenticated> {
        Client::<_, NotAuthenticated>::from_stream(mock)
            .await
            .unwrap()
            .login("u", "p")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_examine_reports_status() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN u p\r\n")
            .read(b"A0001 OK done\r\n")
            .write(b"A0002 EXAMINE INBOX\r\n")
            .read(b"* 172 EXISTS\r\n* 1 RECENT\r\n")
            .read(b"* OK [UIDVALIDITY 3857529045] UIDs valid\r\n")
            .read(b"* OK [UIDNEXT 4392] Predicted next UID\r\n")
            .read(b"* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n")
            .read(b"A0002 OK [READ-ONLY] EXAMINE completed\r\n")
            .build();

        let client = logged_in(mock).await;
        let selected = client.examine(&Mailbox::inbox()).await.unwrap();
        let state = &selected.state;

        assert_eq!(state.mailbox().as_str(), "INBOX");
        assert!(state.is_read_only());
        assert_eq!(state.status().exists, 172);
        assert_eq!(state.status().recent, 1);
        assert_eq!(state.status().uid_validity, UidValidity::new(3_857_529_045));
        assert_eq!(state.status().uid_next, Uid::new(4392));
    }

    #[tokio::test]
    async fn test_refused_examine_logs_out() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN u p\r\n")
            .read(b"A0001 OK done\r\n")
            .write(b"A0002 EXAMINE Missing\r\n")
            .read(b"A0002 NO Mailbox does not exist\r\n")
            .write(b"A0003 LOGOUT\r\n")
            .read(b"* BYE\r\nA0003 OK bye\r\n")
            .build();

        let client = logged_in(mock).await;
        let err = client.examine(&Mailbox::new("Missing")).await.unwrap_err();
        assert!(matches!(err, Error::No { command: "EXAMINE", .. }));
    }
}
