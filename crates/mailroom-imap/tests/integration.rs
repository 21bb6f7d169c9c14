//! Integration tests for the IMAP client.
//!
//! A scripted stream plays the server side of a whole session.

use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use mailroom_imap::{
    Client, Error, FetchItem, FetchItems, Mailbox, NotAuthenticated, ResponseParser,
    SearchCriteria, SequenceSet, UidSet,
};

/// Replays canned server output and records everything the client sends.
struct MockStream {
    responses: Cursor<Vec<u8>>,
    sent: Arc<Mutex<Vec<u8>>>,
}

impl MockStream {
    fn new(responses: &[u8]) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let stream = Self {
            responses: Cursor::new(responses.to_vec()),
            sent: Arc::clone(&sent),
        };
        (stream, sent)
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let data = self.responses.get_ref();
        #[allow(clippy::cast_possible_truncation)]
        let pos = self.responses.position() as usize;

        if pos >= data.len() {
            return Poll::Ready(Ok(()));
        }

        let remaining = &data[pos..];
        let to_read = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..to_read]);
        self.responses.set_position((pos + to_read) as u64);

        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.extend_from_slice(buf);
        }
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn sent_lines(sent: &Arc<Mutex<Vec<u8>>>) -> Vec<String> {
    let bytes = sent.lock().unwrap().clone();
    String::from_utf8(bytes)
        .unwrap()
        .split_terminator("\r\n")
        .map(str::to_string)
        .collect()
}

#[test]
fn test_parser_search_response() {
    let parsed = ResponseParser::parse(b"* SEARCH 4 8 15\r\n").unwrap();
    assert_eq!(
        parsed,
        mailroom_imap::Response::Untagged(mailroom_imap::UntaggedResponse::Search(vec![4, 8, 15]))
    );
}

#[tokio::test]
async fn test_correspondence_session() {
    let script: &[u8] = b"* OK [CAPABILITY IMAP4rev1 AUTH=PLAIN] Dovecot ready.\r\n\
A0001 OK [CAPABILITY IMAP4rev1 SORT] Logged in\r\n\
* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n\
* OK [PERMANENTFLAGS ()] Read-only mailbox.\r\n\
* 2 EXISTS\r\n\
* 0 RECENT\r\n\
* OK [UIDVALIDITY 1700000000] UIDs valid\r\n\
* OK [UIDNEXT 43] Predicted next UID\r\n\
A0002 OK [READ-ONLY] Examine completed\r\n\
* SEARCH 41 42\r\n\
A0003 OK Search completed\r\n\
* 1 FETCH (UID 41 INTERNALDATE \"01-Mar-2024 10:00:00 +0000\" ENVELOPE (\"Fri, 1 Mar 2024 10:00:00 +0000\" \"hello\" ((\"Alice\" NIL \"alice\" \"example.com\")) NIL NIL ((NIL NIL \"bob\" \"example.org\")) NIL NIL NIL NIL) BODYSTRUCTURE (\"text\" \"plain\" (\"charset\" \"utf-8\") NIL NIL \"7bit\" 5 1 NIL NIL NIL NIL))\r\n\
* 2 FETCH (UID 42 INTERNALDATE \"02-Mar-2024 10:00:00 +0000\" ENVELOPE (NIL \"re: hello\" ((NIL NIL \"bob\" \"example.org\")) NIL NIL ((NIL NIL \"alice\" \"example.com\")) NIL NIL NIL NIL) BODYSTRUCTURE ((\"text\" \"plain\" NIL NIL NIL \"7bit\" 2 1 NIL NIL NIL NIL)(\"image\" \"png\" (\"name\" \"cat.png\") NIL NIL \"base64\" 100 NIL (\"inline\" NIL) NIL NIL) \"mixed\" (\"boundary\" \"x\") NIL NIL NIL))\r\n\
A0004 OK Fetch completed\r\n\
* BYE Logging out\r\n\
A0005 OK Logout completed\r\n";

    let (stream, sent) = MockStream::new(script);
    let client = Client::<_, NotAuthenticated>::from_stream(stream).await.unwrap();
    let client = client.login("alice@example.com", "pw").await.unwrap();
    let mut client = client.examine(&Mailbox::new("inbox")).await.unwrap();

    assert_eq!(client.mailbox().as_str(), "INBOX");
    assert_eq!(client.status().exists, 2);
    assert!(client.status().read_only);

    let criteria = SearchCriteria::all_of(vec![
        SearchCriteria::Header("From".to_string(), "alice@example.com".to_string()),
        SearchCriteria::Header("To".to_string(), "bob@example.org".to_string()),
    ]);
    let uids = client.uid_search(&criteria).await.unwrap();
    let set = UidSet::from_uids(uids).unwrap();
    let messages = client.uid_fetch(&set, FetchItems::summary()).await.unwrap();
    assert_eq!(messages.len(), 2);

    let structure = messages[1]
        .1
        .iter()
        .find_map(|item| match item {
            FetchItem::BodyStructure(structure) => Some(structure),
            _ => None,
        })
        .unwrap();
    let leaves = structure.leaves();
    assert_eq!(leaves.len(), 2);
    assert_eq!(leaves[1].param("name"), Some("cat.png"));

    client.logout().await.unwrap();

    assert_eq!(
        sent_lines(&sent),
        vec![
            "A0001 LOGIN alice@example.com pw",
            "A0002 EXAMINE INBOX",
            "A0003 UID SEARCH HEADER From alice@example.com HEADER To bob@example.org",
            "A0004 UID FETCH 41:42 (UID INTERNALDATE ENVELOPE BODYSTRUCTURE)",
            "A0005 LOGOUT",
        ]
    );
}

#[tokio::test]
async fn test_full_range_fetch_by_sequence() {
    let script: &[u8] = b"* OK ready\r\n\
A0001 OK in\r\n\
* 3 EXISTS\r\n\
A0002 OK [READ-ONLY] done\r\n\
* 1 FETCH (UID 5)\r\n\
* 2 FETCH (UID 6)\r\n\
* 3 FETCH (UID 9)\r\n\
A0003 OK done\r\n";

    let (stream, sent) = MockStream::new(script);
    let client = Client::<_, NotAuthenticated>::from_stream(stream).await.unwrap();
    let mut client = client
        .login("u", "p")
        .await
        .unwrap()
        .examine(&Mailbox::inbox())
        .await
        .unwrap();

    let exists = client.status().exists;
    let set = SequenceSet::range(1, exists).unwrap();
    let messages = client
        .fetch(&set, FetchItems(vec![mailroom_imap::FetchAttribute::Uid]))
        .await
        .unwrap();

    assert_eq!(messages.len(), 3);
    assert_eq!(sent_lines(&sent)[2], "A0003 FETCH 1:3 (UID)");
}

#[tokio::test]
async fn test_connection_drop_mid_command() {
    let script: &[u8] = b"* OK ready\r\nA0001 OK in\r\n* 1 EXISTS\r\n";
    let (stream, _sent) = MockStream::new(script);
    let client = Client::<_, NotAuthenticated>::from_stream(stream).await.unwrap();
    let err = client
        .login("u", "p")
        .await
        .unwrap()
        .examine(&Mailbox::inbox())
        .await
        .unwrap_err();
    // the logout attempt also hits EOF; the original error is kept
    assert!(matches!(err, Error::Io(_)));
}
