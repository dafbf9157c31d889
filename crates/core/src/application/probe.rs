// Address Probe - discovers a guest's primary IPv4 address
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::application::constants::{IP_DISCOVERY_COMMAND, NOT_UP_SENTINEL};
use crate::domain::{CommandOutput, Machine};
use crate::port::{ChannelError, CommandChannel, CommandRequest, ProgressReporter};

/// Probe errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// Any fault raised by the channel: connectivity, privilege, exit status
    #[error("Channel execution failed on {machine}: {source}")]
    ChannelExecutionFailure {
        machine: String,
        #[source]
        source: ChannelError,
    },
}

/// What a probe found out about one machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// Last line of the pipeline output
    Address(String),
    /// Command succeeded but printed nothing
    Unknown,
    /// Channel failed, partial output discarded
    NotUp(ChannelError),
}

impl ProbeOutcome {
    /// Single-string form: the address, `""` when unknown, or `# NOT-UP`
    pub fn legacy_text(&self) -> &str {
        match self {
            ProbeOutcome::Address(address) => address,
            ProbeOutcome::Unknown => "",
            ProbeOutcome::NotUp(_) => NOT_UP_SENTINEL,
        }
    }

    pub fn address(&self) -> Option<&str> {
        match self {
            ProbeOutcome::Address(address) => Some(address),
            _ => None,
        }
    }

    pub fn is_up(&self) -> bool {
        !matches!(self, ProbeOutcome::NotUp(_))
    }
}

impl From<Result<Option<String>, ProbeError>> for ProbeOutcome {
    fn from(result: Result<Option<String>, ProbeError>) -> Self {
        match result {
            Ok(Some(address)) => ProbeOutcome::Address(address),
            Ok(None) => ProbeOutcome::Unknown,
            Err(ProbeError::ChannelExecutionFailure { source, .. }) => ProbeOutcome::NotUp(source),
        }
    }
}

/// Probe outcome for a named machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub machine: String,
    pub outcome: ProbeOutcome,
}

/// Address probe service
///
/// One privileged command per machine, no retries. Each call is independent.
pub struct AddressProbe {
    channel: Arc<dyn CommandChannel>,
    progress: Arc<dyn ProgressReporter>,
}

impl AddressProbe {
    pub fn new(channel: Arc<dyn CommandChannel>, progress: Arc<dyn ProgressReporter>) -> Self {
        Self { channel, progress }
    }

    /// Run the discovery pipeline on `machine`
    ///
    /// Returns:
    /// - `Ok(Some(address))` with the last line of stdout
    /// - `Ok(None)` if stdout held no line at all
    /// - `Err(ProbeError::ChannelExecutionFailure)` on any channel error
    ///
    /// The progress line is emitted before the command is sent, whatever the
    /// result.
    pub async fn probe(&self, machine: &Machine) -> Result<Option<String>, ProbeError> {
        self.progress.processing(&machine.name);

        let request = CommandRequest::new(IP_DISCOVERY_COMMAND).privileged(true);
        let mut output = CommandOutput::new();

        let result = self
            .channel
            .execute(machine, &request, &mut |tag, chunk| output.push(tag, chunk))
            .await;

        match result {
            Ok(()) => {
                let address = output.last_line().map(str::to_string);
                debug!(machine = %machine, address = ?address, "Probe completed");
                Ok(address)
            }
            Err(source) => {
                warn!(machine = %machine, error = %source, "Probe failed, machine not up");
                Err(ProbeError::ChannelExecutionFailure {
                    machine: machine.name.clone(),
                    source,
                })
            }
        }
    }

    /// `probe` folded into a `ProbeOutcome`
    pub async fn probe_outcome(&self, machine: &Machine) -> ProbeOutcome {
        self.probe(machine).await.into()
    }

    /// `probe` with failures swallowed into the `# NOT-UP` sentinel
    pub async fn probe_or_sentinel(&self, machine: &Machine) -> String {
        self.probe_outcome(machine).await.legacy_text().to_string()
    }

    /// Probe each machine in turn, one report per machine in input order
    pub async fn survey(&self, machines: &[Machine]) -> Vec<ProbeReport> {
        let mut reports = Vec::with_capacity(machines.len());
        for machine in machines {
            reports.push(ProbeReport {
                machine: machine.name.clone(),
                outcome: self.probe_outcome(machine).await,
            });
        }
        reports
    }
}
