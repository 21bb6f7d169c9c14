//! Scripted IMAP conversations shared by the unit tests.

#![allow(clippy::unwrap_used)]

use mailroom_imap::{Client, NotAuthenticated};
use tokio_test::io::{Builder, Mock};

use crate::gateway::MailSession;

/// Greeting plus a successful `LOGIN u p` as tag `A0001`.
pub fn login(builder: &mut Builder) -> &mut Builder {
    builder
        .read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
        .write(b"A0001 LOGIN u p\r\n")
        .read(b"A0001 OK LOGIN completed\r\n")
}

/// `EXAMINE INBOX` as tag `A000{n}` reporting `exists` messages.
pub fn examine(builder: &mut Builder, tag: u32, exists: u32) -> &mut Builder {
    builder
        .write(format!("A{tag:04} EXAMINE INBOX\r\n").as_bytes())
        .read(format!("* {exists} EXISTS\r\nA{tag:04} OK [READ-ONLY] EXAMINE completed\r\n").as_bytes())
}

/// Logs in over `mock` and wraps the client.
pub async fn session(mock: Mock) -> MailSession<Mock> {
    let client = Client::<_, NotAuthenticated>::from_stream(mock).await.unwrap();
    MailSession::authenticate(client, "u", "p").await.unwrap()
}

/// An envelope with one sender and one recipient.
pub fn envelope(date: &str, subject: &str, from: (&str, &str, &str), to: (&str, &str)) -> String {
    envelope_to_all(date, subject, from, &[to])
}

/// [`envelope`] addressed to several `(local, host)` recipients.
pub fn envelope_to_all(
    date: &str,
    subject: &str,
    from: (&str, &str, &str),
    to: &[(&str, &str)],
) -> String {
    let (name, from_local, from_host) = from;
    let to: String = to
        .iter()
        .map(|(local, host)| format!("(NIL NIL \"{local}\" \"{host}\")"))
        .collect();
    format!(
        "(\"{date}\" \"{subject}\" ((\"{name}\" NIL \"{from_local}\" \"{from_host}\")) \
         ((\"{name}\" NIL \"{from_local}\" \"{from_host}\")) NIL \
         ({to}) NIL NIL NIL \"<{subject}@mailroom>\")"
    )
}

/// A single `text/plain` body structure.
pub const PLAIN_STRUCTURE: &str = "(\"TEXT\" \"PLAIN\" (\"CHARSET\" \"UTF-8\") NIL NIL \"7BIT\" 12 1)";

/// `multipart/mixed` with a text part and a PDF attachment named `report.pdf`.
pub const ATTACHMENT_STRUCTURE: &str = "((\"TEXT\" \"PLAIN\" (\"CHARSET\" \"UTF-8\") NIL NIL \"7BIT\" 12 1)\
(\"APPLICATION\" \"PDF\" (\"NAME\" \"report.pdf\") NIL NIL \"BASE64\" 400 NIL \
(\"ATTACHMENT\" (\"FILENAME\" \"report.pdf\")) NIL) \"MIXED\")";

/// One `* n FETCH` line carrying the summary items.
pub fn summary_line(seq: u32, uid: u32, envelope: &str, structure: &str) -> String {
    format!(
        "* {seq} FETCH (UID {uid} INTERNALDATE \"01-Mar-2024 09:00:00 +0000\" \
         ENVELOPE {envelope} BODYSTRUCTURE {structure})\r\n"
    )
}
