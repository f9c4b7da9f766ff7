// error.rs

use std::io::{self, ErrorKind};

use thiserror::Error;

pub const DISCONNECTED: &str = "You have been disconnected from the server.";
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again later.";

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("Unable to connect to server. Please try again later.")]
    ConnectionRefused,
    #[error("Unable to connect to server. Unknown host.")]
    UnknownHost,
    #[error("Unable to connect to server. No route to host.")]
    NoRouteToHost,
    #[error("Unable to connect to server. Socket exception.")]
    Socket(#[source] io::Error),
    #[error("Something went wrong. Please try again later.\n{0}")]
    Unknown(String),
}

impl From<io::Error> for ConnectError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            ErrorKind::ConnectionRefused => ConnectError::ConnectionRefused,
            ErrorKind::HostUnreachable | ErrorKind::NetworkUnreachable => ConnectError::NoRouteToHost,
            ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::TimedOut
            | ErrorKind::AddrInUse
            | ErrorKind::AddrNotAvailable
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe
            | ErrorKind::PermissionDenied => ConnectError::Socket(e),
            _ => ConnectError::Unknown(e.to_string()),
        }
    }
}

/// Mid-session failure on either half of the connection.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("You have been disconnected from the server.")]
    Disconnected,
    #[error("Something went wrong. Please try again later.\n{0}")]
    Io(io::Error),
}

impl From<io::Error> for SessionError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::NotConnected
            | ErrorKind::UnexpectedEof
            | ErrorKind::TimedOut => SessionError::Disconnected,
            _ => SessionError::Io(e),
        }
    }
}

/// Local input problems. These never reach the server.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Invalid command. Please try again.")]
    Malformed,
    #[error("Unknown command. Type /help to see the available commands.")]
    Unknown,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("expected <host>:<port>")]
    MissingPort,
    #[error("host must not be empty")]
    MissingHost,
    #[error("port must be a number between 1 and 65535")]
    InvalidPort,
}
