//! Type-state IMAP client connection.
//!
//! The IMAP connection states are:
//!
//! - `NotAuthenticated`: after the greeting
//! - `Authenticated`: after a successful LOGIN
//! - `Selected`: after a successful SELECT/EXAMINE
//!
//! Each state only exposes methods that are valid for that state. Commands
//! that end a state consume the client.

#![allow(clippy::missing_errors_doc)]

mod authenticated;
mod not_authenticated;
mod selected;
mod states;

use std::io;

use tokio::io::{AsyncRead, AsyncWrite};

pub use self::states::{Authenticated, NotAuthenticated, Selected};
use super::framed::FramedStream;
use crate::command::{Command, TagGenerator};
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{Capability, ResponseCode, Status};
use crate::{Error, Result};

/// IMAP client connection with type-state.
pub struct Client<S, State> {
    pub(crate) stream: FramedStream<S>,
    pub(crate) tag_gen: TagGenerator,
    pub(crate) capabilities: Vec<Capability>,
    pub(crate) state: State,
}

// FramedStream is not Debug
impl<S, State: std::fmt::Debug> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("tag_gen", &self.tag_gen)
            .field("capabilities", &self.capabilities)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Outcome of a command that completed with OK.
#[derive(Debug, Default)]
pub(crate) struct Completion {
    /// Untagged data received while the command ran.
    pub untagged: Vec<UntaggedResponse>,
    /// Response code of the tagged OK, if any.
    pub code: Option<ResponseCode>,
}

/// Shared implementation for all states.
impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the server capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Checks if the server has a specific capability.
    #[must_use]
    pub fn has_capability(&self, cap: &Capability) -> bool {
        self.capabilities.contains(cap)
    }

    /// Returns true if LOGIN is disabled (e.g., before STARTTLS).
    #[must_use]
    pub fn login_disabled(&self) -> bool {
        self.has_capability(&Capability::LoginDisabled)
    }

    /// Sends a NOOP command to keep the connection alive.
    pub async fn noop(&mut self) -> Result<()> {
        self.execute(&Command::Noop).await.map(|_| ())
    }

    /// Sends a CAPABILITY command and updates the stored capabilities.
    pub async fn capability(&mut self) -> Result<Vec<Capability>> {
        self.execute(&Command::Capability).await?;
        Ok(self.capabilities.clone())
    }

    /// Ends the session.
    ///
    /// A server that closes the socket right after its BYE is not an error.
    pub async fn logout(mut self) -> Result<()> {
        match self.execute(&Command::Logout).await {
            Ok(_) => Ok(()),
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Runs one command to completion.
    ///
    /// Untagged responses that fail to parse are logged and skipped; the
    /// tagged status decides success.
    pub(crate) async fn execute(&mut self, command: &Command) -> Result<Completion> {
        let tag = self.tag_gen.next();
        let line = command.serialize(&tag)?;
        tracing::debug!(command = command.name(), %tag, "sending command");
        self.stream.write_command(&line).await?;

        let mut responses = self.stream.read_until_tagged(&tag).await?;
        let tagged = responses
            .pop()
            .ok_or_else(|| Error::Protocol("missing tagged response".to_string()))?;

        let mut completion = Completion::default();
        for raw in &responses {
            match ResponseParser::parse(raw) {
                Ok(Response::Untagged(UntaggedResponse::Capability(caps))) => {
                    self.capabilities = caps;
                }
                Ok(Response::Untagged(untagged)) => completion.untagged.push(untagged),
                Ok(Response::Tagged { .. } | Response::Continuation(_)) => {}
                Err(e) => {
                    tracing::warn!(command = command.name(), error = %e, "skipping unparseable response");
                }
            }
        }

        let Response::Tagged {
            status, code, text, ..
        } = ResponseParser::parse(&tagged)?
        else {
            return Err(Error::Protocol("missing tagged response".to_string()));
        };

        match status {
            Status::Ok | Status::PreAuth => {
                if let Some(ResponseCode::Capability(caps)) = &code {
                    self.capabilities.clone_from(caps);
                }
                completion.code = code;
                Ok(completion)
            }
            Status::No | Status::Bad if matches!(command, Command::Login { .. }) => {
                Err(Error::Auth(text))
            }
            Status::No => Err(Error::No {
                command: command.name(),
                text,
            }),
            Status::Bad => Err(Error::Bad {
                command: command.name(),
                text,
            }),
            Status::Bye => Err(Error::Bye(text)),
        }
    }

    /// Moves the connection into another state.
    pub(crate) fn transition<T>(self, state: T) -> Client<S, T> {
        Client {
            stream: self.stream,
            tag_gen: self.tag_gen,
            capabilities: self.capabilities,
            state,
        }
    }

    /// Sends LOGOUT after a rejected command, keeping the original error.
    pub(crate) async fn abandon(self, error: Error) -> Error {
        if let Err(logout_error) = self.logout().await {
            tracing::debug!(error = %logout_error, "logout after failure did not complete");
        }
        error
    }
}
