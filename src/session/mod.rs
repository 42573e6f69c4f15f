//! Blocking CLI session to one device.
//!
//! A [`Session`] owns one [`Transport`] and runs at most one exchange at a
//! time. An exchange is either a configuration transaction
//! ([`Session::execute`]: enter configuration mode, send every command,
//! commit and leave) or a single read-only command ([`Session::show`]).
//!
//! Callers wait for the complete reply. A timeout abandons the exchange and
//! leaves the session unusable, since the device state is then unknown; every
//! later call fails with [`SessionError::Disconnected`] until a new session is
//! built. Nothing is retried here.

pub mod dialect;
pub mod process;
pub mod simulated;
pub mod transport;

pub use dialect::Platform;
pub use process::ProcessTransport;
pub use simulated::{SimulatedDevice, SimulatedHandle};
pub use transport::{Transport, TransportError, TransportResult};

use parking_lot::Mutex as SyncMutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::model::CommandLine;

/// Default per-exchange timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised by a session.
#[derive(Error, Debug)]
pub enum SessionError {
    /// No complete reply within the timeout; the session is now unusable.
    #[error("Command timed out after {timeout_ms} ms")]
    Timeout {
        /// Timeout in milliseconds
        timeout_ms: u64,
    },

    /// The device refused a command.
    #[error("Device rejected '{command}': {response}")]
    Rejected {
        /// Offending command
        command: String,
        /// Device response
        response: String,
    },

    /// The channel is gone or the session was invalidated.
    #[error("Session disconnected: {0}")]
    Disconnected(String),

    /// Another exchange is in flight and the session fails fast.
    #[error("Session busy: another exchange is in flight")]
    Busy,

    /// The device refused the credentials.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Any other transport failure.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::ConnectionFailed(msg) | TransportError::Closed(msg) => {
                SessionError::Disconnected(msg)
            }
            TransportError::AuthenticationFailed(msg) => SessionError::AuthenticationFailed(msg),
            TransportError::Io(e) => SessionError::Transport(e.to_string()),
            TransportError::Other(msg) => SessionError::Transport(msg),
        }
    }
}

/// Result type for session operations.
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// What happens to a call made while another exchange is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheduling {
    /// Wait; waiters are served in arrival order.
    #[default]
    Queue,
    /// Fail immediately with [`SessionError::Busy`].
    FailFast,
}

impl std::fmt::Display for Scheduling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scheduling::Queue => write!(f, "queue"),
            Scheduling::FailFast => write!(f, "fail_fast"),
        }
    }
}

impl std::str::FromStr for Scheduling {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "queue" | "fifo" => Ok(Scheduling::Queue),
            "fail_fast" | "failfast" | "busy" => Ok(Scheduling::FailFast),
            _ => Err(crate::error::Error::Config(format!(
                "Unknown scheduling policy: {}. Valid options: queue, fail_fast",
                s
            ))),
        }
    }
}

/// Session construction options.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Device dialect
    pub platform: Platform,
    /// Concurrent-call policy
    pub scheduling: Scheduling,
    /// Default per-exchange timeout
    pub timeout: Duration,
    /// Send the dialect's preparation lines on open
    pub prepare: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            platform: Platform::default(),
            scheduling: Scheduling::default(),
            timeout: DEFAULT_TIMEOUT,
            prepare: true,
        }
    }
}

/// Clears the pending flag when an exchange ends, however it ends.
struct PendingGuard<'a>(&'a AtomicBool);

impl<'a> PendingGuard<'a> {
    fn new(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One logical channel to one device.
pub struct Session {
    id: String,
    options: SessionOptions,
    transport: Mutex<Box<dyn Transport>>,
    pending: AtomicBool,
    broken: SyncMutex<Option<String>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("options", &self.options)
            .field("pending", &self.is_pending())
            .field("broken", &*self.broken.lock())
            .finish()
    }
}

impl Session {
    /// Wrap a transport with default options for `platform`.
    pub fn new<T: Transport + 'static>(transport: T, platform: Platform) -> Self {
        Self::with_options(
            transport,
            SessionOptions {
                platform,
                ..SessionOptions::default()
            },
        )
    }

    /// Wrap a transport with explicit options.
    pub fn with_options<T: Transport + 'static>(transport: T, options: SessionOptions) -> Self {
        Self {
            id: transport.identifier().to_string(),
            options,
            transport: Mutex::new(Box::new(transport)),
            pending: AtomicBool::new(false),
            broken: SyncMutex::new(None),
        }
    }

    /// Set the concurrent-call policy.
    pub fn scheduling(mut self, scheduling: Scheduling) -> Self {
        self.options.scheduling = scheduling;
        self
    }

    /// Set the default per-exchange timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    /// Transport identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Device dialect.
    pub fn platform(&self) -> Platform {
        self.options.platform
    }

    /// Default per-exchange timeout.
    pub fn default_timeout(&self) -> Duration {
        self.options.timeout
    }

    /// True while an exchange is in flight.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    /// False once a timeout, disconnect or close invalidated the session.
    pub fn is_usable(&self) -> bool {
        self.broken.lock().is_none()
    }

    /// Send the dialect's preparation lines (paging off), if enabled.
    pub async fn open(&self) -> SessionResult<()> {
        if !self.options.prepare {
            return Ok(());
        }
        let lines: Vec<String> = self
            .options
            .platform
            .prepare()
            .iter()
            .map(|s| s.to_string())
            .collect();
        self.transact(&lines, false, false, self.options.timeout)
            .await
            .map(|_| ())
    }

    /// Run `commands` as one configuration transaction and return the
    /// captured output. An empty command line is a no-op.
    pub async fn execute(&self, commands: &CommandLine) -> SessionResult<String> {
        self.execute_with_timeout(commands, self.options.timeout).await
    }

    /// [`execute`](Self::execute) with an explicit timeout.
    pub async fn execute_with_timeout(
        &self,
        commands: &CommandLine,
        timeout: Duration,
    ) -> SessionResult<String> {
        if commands.is_empty() {
            return Ok(String::new());
        }
        let lines = self.wrap(commands);
        self.transact(&lines, true, false, timeout).await
    }

    /// [`execute`](Self::execute), but fail with [`SessionError::Busy`] instead
    /// of waiting when another exchange is in flight.
    pub async fn try_execute(&self, commands: &CommandLine) -> SessionResult<String> {
        if commands.is_empty() {
            return Ok(String::new());
        }
        let lines = self.wrap(commands);
        self.transact(&lines, true, true, self.options.timeout).await
    }

    /// Run a single read-only command outside configuration mode.
    pub async fn show(&self, command: &str) -> SessionResult<String> {
        self.transact(&[command.to_string()], false, false, self.options.timeout)
            .await
    }

    /// Close the transport; the session is unusable afterwards.
    pub async fn close(&self) -> SessionResult<()> {
        let mut transport = self.transport.lock().await;
        self.invalidate("session closed");
        transport.close().await.map_err(SessionError::from)
    }

    fn wrap(&self, commands: &CommandLine) -> Vec<String> {
        let platform = self.options.platform;
        platform
            .enter_config()
            .iter()
            .map(|s| s.to_string())
            .chain(commands.iter().map(str::to_string))
            .chain(platform.commit().iter().map(|s| s.to_string()))
            .collect()
    }

    fn invalidate(&self, reason: impl Into<String>) {
        let mut broken = self.broken.lock();
        if broken.is_none() {
            *broken = Some(reason.into());
        }
    }

    fn ensure_usable(&self) -> SessionResult<()> {
        match self.broken.lock().as_ref() {
            Some(reason) => Err(SessionError::Disconnected(reason.clone())),
            None => Ok(()),
        }
    }

    async fn transact(
        &self,
        lines: &[String],
        configure: bool,
        fail_fast: bool,
        timeout: Duration,
    ) -> SessionResult<String> {
        self.ensure_usable()?;
        let mut transport = if fail_fast || self.options.scheduling == Scheduling::FailFast {
            self.transport.try_lock().map_err(|_| SessionError::Busy)?
        } else {
            self.transport.lock().await
        };
        self.ensure_usable()?;
        let _pending = PendingGuard::new(&self.pending);

        let started = Instant::now();
        debug!(session = %self.id, lines = lines.len(), configure, "starting exchange");
        let exchange = Self::exchange(self.options.platform, &mut **transport, lines, configure);
        match tokio::time::timeout(timeout, exchange).await {
            Ok(Ok(output)) => {
                debug!(
                    session = %self.id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    bytes = output.len(),
                    "exchange complete"
                );
                Ok(output)
            }
            Ok(Err(err)) => {
                if let SessionError::Disconnected(reason) = &err {
                    self.invalidate(reason.clone());
                }
                Err(err)
            }
            Err(_) => {
                let timeout_ms = timeout.as_millis() as u64;
                warn!(session = %self.id, timeout_ms, "exchange timed out; session invalidated");
                self.invalidate(format!("previous exchange timed out after {} ms", timeout_ms));
                Err(SessionError::Timeout { timeout_ms })
            }
        }
    }

    async fn exchange(
        platform: Platform,
        transport: &mut dyn Transport,
        lines: &[String],
        configure: bool,
    ) -> SessionResult<String> {
        let mut captured = String::new();
        for line in lines {
            trace!(command = %line, "send");
            let response = transport.send(line).await?;
            trace!(response = %response, "recv");
            if platform.is_rejection(&response) {
                warn!(command = %line, "device rejected command");
                if configure {
                    Self::abort(platform, transport).await;
                }
                return Err(SessionError::Rejected {
                    command: line.clone(),
                    response,
                });
            }
            captured.push_str(&response);
            if !response.is_empty() && !response.ends_with('\n') {
                captured.push('\n');
            }
        }
        Ok(captured)
    }

    /// Best effort; errors are logged and dropped.
    async fn abort(platform: Platform, transport: &mut dyn Transport) {
        for line in platform.abort() {
            if let Err(err) = transport.send(line).await {
                warn!(command = %line, error = %err, "abort failed");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn session() -> (Session, SimulatedHandle) {
        let device = SimulatedDevice::new("sim", Platform::CiscoIos);
        let handle = device.handle();
        (Session::new(device, Platform::CiscoIos), handle)
    }

    #[tokio::test]
    async fn test_empty_command_line_is_noop() {
        let (session, handle) = session();
        let out = session.execute(&CommandLine::default()).await.unwrap();
        assert_eq!(out, "");
        assert!(handle.history().is_empty());
    }

    #[tokio::test]
    async fn test_execute_wraps_in_config_mode() {
        let (session, handle) = session();
        session
            .execute(&CommandLine::new(["hostname edge1"]))
            .await
            .unwrap();
        assert_eq!(
            handle.history(),
            vec!["configure terminal", "hostname edge1", "end"]
        );
        assert!(handle.running_config().contains("hostname edge1"));
    }

    #[tokio::test]
    async fn test_rejection_aborts() {
        let (session, handle) = session();
        handle.reject_matching("^bogus").unwrap();
        let err = session
            .execute(&CommandLine::new(["hostname edge1", "bogus command"]))
            .await
            .unwrap_err();
        match err {
            SessionError::Rejected { command, response } => {
                assert_eq!(command, "bogus command");
                assert!(response.contains("Invalid input"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(handle.history().last().map(String::as_str), Some("end"));
        assert!(session.is_usable());
    }

    #[tokio::test]
    async fn test_timeout_invalidates_session() {
        let (session, handle) = session();
        handle.set_delay(Duration::from_millis(200));
        let err = session
            .execute_with_timeout(&CommandLine::new(["hostname a"]), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Timeout { timeout_ms: 20 }));
        assert!(!session.is_usable());
        let err = session.show("show clock").await.unwrap_err();
        assert!(matches!(err, SessionError::Disconnected(_)));
    }

    #[tokio::test]
    async fn test_fail_fast_while_pending() {
        let (session, handle) = session();
        handle.set_delay(Duration::from_millis(100));
        let session = Arc::new(session.scheduling(Scheduling::FailFast));
        let first = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.execute(&CommandLine::new(["hostname a"])).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(session.is_pending());
        let err = session
            .execute(&CommandLine::new(["hostname b"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Busy));
        first.await.unwrap().unwrap();
        assert!(!session.is_pending());
    }
}
