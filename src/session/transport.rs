//! Request/response contract between a session and a device channel.

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by a transport.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The channel could not be opened.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The device refused the credentials.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The channel closed while a command was outstanding.
    #[error("Connection closed: {0}")]
    Closed(String),

    /// I/O error on the channel.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else the transport wants to report.
    #[error("Transport error: {0}")]
    Other(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// One synchronous request/response channel to one device.
///
/// `send` writes a single command line and returns everything the device
/// printed in response, up to the next prompt. Implementations never retry.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Identifier used in logs (host name, program, simulator name).
    fn identifier(&self) -> &str;

    /// Send one command and wait for its complete response.
    async fn send(&mut self, command: &str) -> TransportResult<String>;

    /// Close the channel.
    async fn close(&mut self) -> TransportResult<()>;
}
