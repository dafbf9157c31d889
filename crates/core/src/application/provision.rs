// Provisioner - runs the install/config/build scripts on a guest
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::domain::{DomainError, Machine, ProvisionPlan, ProvisionStep, StepKind, StreamTag};
use crate::port::{ChannelError, CommandChannel, CommandRequest, ScriptSource, TimeProvider};

/// Provisioning errors
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Failed to read {step} script {path}: {source}")]
    Script {
        step: StepKind,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid {step} step: {source}")]
    InvalidStep {
        step: StepKind,
        #[source]
        source: DomainError,
    },

    #[error("Step {step} failed on {machine}: {source}")]
    StepFailed {
        machine: String,
        step: StepKind,
        #[source]
        source: ChannelError,
    },
}

impl ProvisionError {
    /// Step the error belongs to
    pub fn step(&self) -> StepKind {
        match self {
            ProvisionError::Script { step, .. }
            | ProvisionError::InvalidStep { step, .. }
            | ProvisionError::StepFailed { step, .. } => *step,
        }
    }
}

/// Timing of one completed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: StepKind,
    pub privileged: bool,
    pub duration_ms: i64,
}

/// Result of a full provisioning run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
    pub machine: String,
    pub steps: Vec<StepReport>,
}

impl ProvisionReport {
    pub fn total_duration_ms(&self) -> i64 {
        self.steps.iter().map(|s| s.duration_ms).sum()
    }
}

/// Splits streamed guest output into log lines, per stream
struct GuestLog<'a> {
    machine: &'a str,
    step: StepKind,
    stdout: String,
    stderr: String,
}

impl<'a> GuestLog<'a> {
    fn new(machine: &'a str, step: StepKind) -> Self {
        Self {
            machine,
            step,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    fn push(&mut self, tag: StreamTag, chunk: &str) {
        let pending = match tag {
            StreamTag::Stdout => &mut self.stdout,
            StreamTag::Stderr => &mut self.stderr,
        };
        pending.push_str(chunk);

        while let Some(pos) = pending.find('\n') {
            let line: String = pending.drain(..=pos).collect();
            Self::emit(self.machine, self.step, tag, line.trim_end());
        }
    }

    fn flush(&mut self) {
        for (tag, pending) in [
            (StreamTag::Stdout, &mut self.stdout),
            (StreamTag::Stderr, &mut self.stderr),
        ] {
            if !pending.is_empty() {
                Self::emit(self.machine, self.step, tag, pending.trim_end());
                pending.clear();
            }
        }
    }

    fn emit(machine: &str, step: StepKind, tag: StreamTag, line: &str) {
        match tag {
            StreamTag::Stdout => info!(machine = %machine, step = %step, "{}", line),
            StreamTag::Stderr => warn!(machine = %machine, step = %step, "{}", line),
        }
    }
}

/// Provisioner service
///
/// Steps run strictly in plan order; the first failing step ends the run.
/// Every script is read before the first step starts.
pub struct Provisioner {
    channel: Arc<dyn CommandChannel>,
    scripts: Arc<dyn ScriptSource>,
    time_provider: Arc<dyn TimeProvider>,
}

impl Provisioner {
    pub fn new(
        channel: Arc<dyn CommandChannel>,
        scripts: Arc<dyn ScriptSource>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            channel,
            scripts,
            time_provider,
        }
    }

    /// Run every step of `plan` on `machine`
    ///
    /// # Errors
    /// - ProvisionError::Script if a script cannot be read (nothing has run yet)
    /// - ProvisionError::InvalidStep if an argument cannot be quoted
    /// - ProvisionError::StepFailed for the first step the guest rejects
    pub async fn run(
        &self,
        machine: &Machine,
        plan: &ProvisionPlan,
    ) -> Result<ProvisionReport, ProvisionError> {
        let prepared = self.prepare(plan).await?;

        info!(
            machine = %machine,
            steps = prepared.len(),
            "Starting provisioning"
        );

        let mut report = ProvisionReport {
            machine: machine.name.clone(),
            steps: Vec::with_capacity(prepared.len()),
        };

        for (step, request) in prepared {
            let step_report = self.run_step(machine, step, request).await?;
            report.steps.push(step_report);
        }

        info!(
            machine = %machine,
            duration_ms = report.total_duration_ms(),
            "Provisioning completed"
        );

        Ok(report)
    }

    /// Load scripts and build the guest command of every step
    async fn prepare<'p>(
        &self,
        plan: &'p ProvisionPlan,
    ) -> Result<Vec<(&'p ProvisionStep, CommandRequest)>, ProvisionError> {
        let mut prepared = Vec::with_capacity(plan.steps.len());

        for step in &plan.steps {
            let body = self
                .scripts
                .load(&step.script)
                .await
                .map_err(|source| ProvisionError::Script {
                    step: step.kind,
                    path: step.script.clone(),
                    source,
                })?;

            let command = step
                .command_line(&plan.interpreter)
                .map_err(|source| ProvisionError::InvalidStep {
                    step: step.kind,
                    source,
                })?;

            let request = CommandRequest::new(command)
                .privileged(step.privileged)
                .with_stdin(body);

            prepared.push((step, request));
        }

        Ok(prepared)
    }

    async fn run_step(
        &self,
        machine: &Machine,
        step: &ProvisionStep,
        request: CommandRequest,
    ) -> Result<StepReport, ProvisionError> {
        let args: Vec<&str> = step.args.iter().map(|a| a.display_value()).collect();
        info!(
            machine = %machine,
            step = %step.kind,
            script = %step.script.display(),
            args = ?args,
            privileged = step.privileged,
            "Running provisioning step"
        );

        let start = self.time_provider.now_millis();
        let mut guest_log = GuestLog::new(&machine.name, step.kind);

        let result = self
            .channel
            .execute(machine, &request, &mut |tag, chunk| guest_log.push(tag, chunk))
            .await;
        guest_log.flush();

        let duration_ms = self.time_provider.now_millis() - start;

        if let Err(source) = result {
            error!(
                machine = %machine,
                step = %step.kind,
                duration_ms = duration_ms,
                error = %source,
                "Provisioning step failed"
            );
            return Err(ProvisionError::StepFailed {
                machine: machine.name.clone(),
                step: step.kind,
                source,
            });
        }

        info!(
            machine = %machine,
            step = %step.kind,
            duration_ms = duration_ms,
            "Provisioning step completed"
        );

        Ok(StepReport {
            step: step.kind,
            privileged: step.privileged,
            duration_ms,
        })
    }
}
