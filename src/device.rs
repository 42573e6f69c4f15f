//! Device facade: translation units plus one session.
//!
//! A [`Device`] reads a unit's instance (show command, then parse), applies
//! a before/after transition (plan, render, execute) and groups several
//! applies into a [`Transaction`] bounded by one overall deadline.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{CommandLine, ConfigNode};
use crate::session::{Session, SessionError};
use crate::units::{TranslationUnit, UnitRegistry};

/// Outcome of one apply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyOutcome {
    /// Unit applied
    pub unit: String,
    /// Commands sent (empty when nothing changed)
    pub commands: CommandLine,
    /// Raw device output
    pub output: String,
}

impl ApplyOutcome {
    /// True when nothing had to be sent.
    pub fn is_noop(&self) -> bool {
        self.commands.is_empty()
    }
}

/// One unit transition inside a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitChange {
    /// Unit name
    pub unit: String,
    /// Last known device state
    pub before: Option<ConfigNode>,
    /// Desired state
    pub after: Option<ConfigNode>,
}

impl UnitChange {
    /// Transition of `unit` from `before` to `after`.
    pub fn new(unit: impl Into<String>, before: Option<ConfigNode>, after: Option<ConfigNode>) -> Self {
        Self {
            unit: unit.into(),
            before,
            after,
        }
    }
}

/// Where a transaction stopped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionFailure {
    /// Unit whose apply failed
    pub unit: String,
    /// Error text
    pub error: String,
    /// Process exit status for the error
    pub exit_code: i32,
}

/// Report of a transaction, successful or not.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    /// Transaction identifier, for logs
    pub id: Uuid,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// End time
    pub finished_at: DateTime<Utc>,
    /// Applies completed before the end, in order
    pub applied: Vec<ApplyOutcome>,
    /// The failure that stopped the transaction, if any
    pub failure: Option<TransactionFailure>,
}

impl Transaction {
    /// True when every change was applied.
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Names of the units applied.
    pub fn applied_units(&self) -> Vec<&str> {
        self.applied.iter().map(|a| a.unit.as_str()).collect()
    }
}

/// Units and a session for one device.
#[derive(Debug, Clone)]
pub struct Device {
    session: Arc<Session>,
    registry: Arc<UnitRegistry>,
}

impl Device {
    /// Wrap a session and a registry.
    pub fn new(session: Session, registry: UnitRegistry) -> Self {
        Self {
            session: Arc::new(session),
            registry: Arc::new(registry),
        }
    }

    /// Share an existing session and registry.
    pub fn from_shared(session: Arc<Session>, registry: Arc<UnitRegistry>) -> Self {
        Self { session, registry }
    }

    /// Session commands are sent through.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Units this device can read and apply.
    pub fn registry(&self) -> &UnitRegistry {
        &self.registry
    }

    /// Read the instance identified by `id`; `None` when the device has none.
    pub async fn read(&self, unit: &str, id: &ConfigNode) -> Result<Option<ConfigNode>> {
        let unit = self.registry.get(unit)?;
        let command = unit.read_command(id)?;
        let output = self.session.show(&command).await?;
        unit.parse(id, &output)
    }

    /// Move `unit` from `before` to `after`.
    pub async fn apply(
        &self,
        unit: &str,
        before: Option<&ConfigNode>,
        after: Option<&ConfigNode>,
    ) -> Result<ApplyOutcome> {
        let unit = self.registry.get(unit)?;
        let commands = unit.render(before, after)?;
        self.send(unit.as_ref(), commands, None).await
    }

    /// [`apply`](Self::apply), then read the instance back and compare it
    /// with `after`.
    pub async fn apply_and_verify(
        &self,
        unit: &str,
        before: Option<&ConfigNode>,
        after: Option<&ConfigNode>,
    ) -> Result<ApplyOutcome> {
        let translation = self.registry.get(unit)?;
        let id = match after.or(before) {
            Some(node) => translation.id_of(node)?,
            None => return self.apply(unit, before, after).await,
        };
        let outcome = self.apply(unit, before, after).await?;
        let observed = self.read(unit, &id).await?;
        match (after, observed.as_ref()) {
            (Some(want), Some(got)) if want == got => Ok(outcome),
            (None, None) => Ok(outcome),
            (Some(want), got) => Err(Error::VerificationFailed {
                unit: unit.to_string(),
                message: format!("expected {}, read back {}", describe(Some(want)), describe(got)),
            }),
            (None, Some(got)) => Err(Error::VerificationFailed {
                unit: unit.to_string(),
                message: format!("instance still present after delete: {}", describe(Some(got))),
            }),
        }
    }

    /// Apply `changes` in order, stopping at the first failure or when
    /// `deadline` elapses. Completed applies are not rolled back; the report
    /// lists them.
    pub async fn transaction(&self, changes: &[UnitChange], deadline: Duration) -> Transaction {
        let id = Uuid::new_v4();
        let started_at = Utc::now();
        let started = Instant::now();
        let mut applied = Vec::new();
        let mut failure = None;
        debug!(transaction = %id, changes = changes.len(), "starting transaction");

        for change in changes {
            match self.step(change, started, deadline).await {
                Ok(outcome) => applied.push(outcome),
                Err(err) => {
                    warn!(transaction = %id, unit = %change.unit, error = %err, "transaction stopped");
                    failure = Some(TransactionFailure {
                        unit: change.unit.clone(),
                        exit_code: err.exit_code(),
                        error: err.to_string(),
                    });
                    break;
                }
            }
        }

        let report = Transaction {
            id,
            started_at,
            finished_at: Utc::now(),
            applied,
            failure,
        };
        if report.is_success() {
            info!(transaction = %id, units = report.applied.len(), "transaction applied");
        }
        report
    }

    async fn step(&self, change: &UnitChange, started: Instant, deadline: Duration) -> Result<ApplyOutcome> {
        let unit = self.registry.get(&change.unit)?;
        let commands = unit.render(change.before.as_ref(), change.after.as_ref())?;
        let remaining = deadline.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return Err(deadline_exceeded(deadline));
        }
        let timeout = remaining.min(self.session.default_timeout());
        match self.send(unit.as_ref(), commands, Some(timeout)).await {
            Err(Error::Session(SessionError::Timeout { .. })) if timeout < self.session.default_timeout() => {
                Err(deadline_exceeded(deadline))
            }
            other => other,
        }
    }

    async fn send(
        &self,
        unit: &dyn TranslationUnit,
        commands: CommandLine,
        timeout: Option<Duration>,
    ) -> Result<ApplyOutcome> {
        let output = match timeout {
            Some(t) => self.session.execute_with_timeout(&commands, t).await?,
            None => self.session.execute(&commands).await?,
        };
        if !commands.is_empty() {
            info!(unit = %unit.name(), commands = commands.len(), "applied configuration");
        }
        Ok(ApplyOutcome {
            unit: unit.name().to_string(),
            commands,
            output,
        })
    }
}

fn deadline_exceeded(deadline: Duration) -> Error {
    Error::DeadlineExceeded {
        timeout_ms: deadline.as_millis() as u64,
    }
}

fn describe(node: Option<&ConfigNode>) -> String {
    match node {
        Some(n) => serde_json::to_string(n).unwrap_or_else(|_| "<unprintable>".to_string()),
        None => "nothing".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Platform, SimulatedDevice, SimulatedHandle};

    fn device() -> (Device, SimulatedHandle) {
        let sim = SimulatedDevice::new("cer1", Platform::CasaCer);
        let handle = sim.handle();
        let registry = UnitRegistry::with_builtins().unwrap();
        (Device::new(Session::new(sim, Platform::CasaCer), registry), handle)
    }

    fn rpd(index: i64) -> ConfigNode {
        ConfigNode::new()
            .with("name", "node1")
            .with("rpdIndex", index)
            .with("ucam", 2)
            .with("dcam", 11)
            .with("enable", true)
    }

    #[tokio::test]
    async fn test_apply_and_read_back() {
        let (device, _) = device();
        let outcome = device.apply_and_verify("cer_rpd", None, Some(&rpd(12))).await.unwrap();
        assert!(!outcome.is_noop());
        let id = ConfigNode::new().with("name", "node1");
        assert_eq!(device.read("cer_rpd", &id).await.unwrap(), Some(rpd(12)));
    }

    #[tokio::test]
    async fn test_noop_apply_sends_nothing() {
        let (device, handle) = device();
        let outcome = device.apply("cer_rpd", Some(&rpd(12)), Some(&rpd(12))).await.unwrap();
        assert!(outcome.is_noop());
        assert!(handle.history().is_empty());
    }

    #[tokio::test]
    async fn test_transaction_reports_partial_progress() {
        let (device, handle) = device();
        handle.reject_matching("^rpd-index 99$").unwrap();
        let other = rpd(13).with("name", "node2");
        let changes = vec![
            UnitChange::new("cer_rpd", None, Some(rpd(12))),
            UnitChange::new("cer_rpd", None, Some(other.with("rpdIndex", 99))),
            UnitChange::new("cer_rpd", None, Some(rpd(14).with("name", "node3"))),
        ];
        let report = device.transaction(&changes, Duration::from_secs(5)).await;
        assert!(!report.is_success());
        assert_eq!(report.applied_units(), vec!["cer_rpd"]);
        let failure = report.failure.unwrap();
        assert_eq!(failure.exit_code, 2);
    }

    #[tokio::test]
    async fn test_transaction_deadline() {
        let (device, handle) = device();
        handle.set_delay(Duration::from_millis(50));
        let changes = vec![
            UnitChange::new("cer_rpd", None, Some(rpd(12))),
            UnitChange::new("cer_rpd", None, Some(rpd(13).with("name", "node2"))),
        ];
        let report = device.transaction(&changes, Duration::from_millis(120)).await;
        let failure = report.failure.expect("deadline should stop the transaction");
        assert_eq!(failure.exit_code, 3);
        assert!(failure.error.contains("deadline"));
    }

    #[tokio::test]
    async fn test_verify_detects_drift() {
        let (device, handle) = device();
        handle.load_config(
            "cable rpd node1\n rpd-index 12\n ucam 2 dcam 11\n mac-address a870.5d28.b3c8\n no shutdown\n",
        );
        let err = device
            .apply_and_verify("cer_rpd", Some(&rpd(12)), Some(&rpd(13)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::VerificationFailed { .. }));
    }
}
