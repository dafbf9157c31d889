// Provisioning Step Domain Model

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::error::{DomainError, Result};
use crate::domain::settings::ProvisionSettings;

/// Host directory (relative to the project dir) holding the step scripts
pub const SCRIPT_SUBDIR: &str = "script";

/// Interpreter the scripts are piped into on the guest
pub const DEFAULT_INTERPRETER: &str = "bash";

const REDACTED: &str = "******";

/// The three fixed provisioning steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Install,
    Config,
    Build,
}

impl StepKind {
    pub fn script_name(&self) -> &'static str {
        match self {
            StepKind::Install => "install.sh",
            StepKind::Config => "config.sh",
            StepKind::Build => "build.sh",
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepKind::Install => write!(f, "install"),
            StepKind::Config => write!(f, "config"),
            StepKind::Build => write!(f, "build"),
        }
    }
}

/// Positional script argument
#[derive(Clone, PartialEq, Eq)]
pub struct StepArg {
    value: String,
    secret: bool,
}

impl StepArg {
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            secret: false,
        }
    }

    pub fn secret(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            secret: true,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_secret(&self) -> bool {
        self.secret
    }

    /// Value safe to print
    pub fn display_value(&self) -> &str {
        if self.secret {
            REDACTED
        } else {
            &self.value
        }
    }
}

impl std::fmt::Debug for StepArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.display_value())
    }
}

impl std::fmt::Display for StepArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_value())
    }
}

/// One script invocation on the guest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionStep {
    pub kind: StepKind,
    /// Host-side path of the script
    pub script: PathBuf,
    pub args: Vec<StepArg>,
    pub privileged: bool,
}

impl ProvisionStep {
    /// Guest command the script is piped into: `<interpreter> -s -- <args>`
    pub fn command_line(&self, interpreter: &str) -> Result<String> {
        Self::join(interpreter, self.args.iter().map(StepArg::value))
    }

    /// Same as `command_line` with secret arguments masked
    pub fn redacted_command_line(&self, interpreter: &str) -> Result<String> {
        Self::join(interpreter, self.args.iter().map(StepArg::display_value))
    }

    fn join<'a>(interpreter: &'a str, args: impl Iterator<Item = &'a str>) -> Result<String> {
        let words = [interpreter, "-s", "--"].into_iter().chain(args);
        shlex::try_join(words).map_err(|e| DomainError::ValidationError(e.to_string()))
    }
}

/// Ordered provisioning steps for one machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionPlan {
    pub steps: Vec<ProvisionStep>,
    pub interpreter: String,
}

impl ProvisionPlan {
    /// install.sh, config.sh, build.sh from `<dir>/script`
    pub fn standard(dir: &Path, settings: &ProvisionSettings) -> Self {
        let script_dir = dir.join(SCRIPT_SUBDIR);

        let steps = vec![
            ProvisionStep {
                kind: StepKind::Install,
                script: script_dir.join(StepKind::Install.script_name()),
                args: Vec::new(),
                privileged: true,
            },
            ProvisionStep {
                kind: StepKind::Config,
                script: script_dir.join(StepKind::Config.script_name()),
                args: vec![
                    StepArg::plain(settings.conf_dir()),
                    StepArg::plain(&settings.sync_to),
                    StepArg::secret(&settings.db_password),
                    StepArg::plain(&settings.db_name),
                ],
                privileged: true,
            },
            ProvisionStep {
                kind: StepKind::Build,
                script: script_dir.join(StepKind::Build.script_name()),
                args: vec![StepArg::plain(&settings.sync_to)],
                privileged: false,
            },
        ];

        Self {
            steps,
            interpreter: DEFAULT_INTERPRETER.to_string(),
        }
    }

    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ProvisionSettings {
        ProvisionSettings {
            sync_to: "/vagrant".to_string(),
            db_password: "pa ss".to_string(),
            db_name: "macaddress".to_string(),
        }
    }

    #[test]
    fn test_standard_plan_order_and_privilege() {
        let plan = ProvisionPlan::standard(Path::new("/project"), &settings());

        let kinds: Vec<StepKind> = plan.steps.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![StepKind::Install, StepKind::Config, StepKind::Build]
        );

        let privileged: Vec<bool> = plan.steps.iter().map(|s| s.privileged).collect();
        assert_eq!(privileged, vec![true, true, false]);

        assert_eq!(
            plan.steps[0].script,
            PathBuf::from("/project/script/install.sh")
        );
        assert_eq!(plan.steps[2].script, PathBuf::from("/project/script/build.sh"));
        assert_eq!(plan.interpreter, DEFAULT_INTERPRETER);
    }

    #[test]
    fn test_standard_plan_arguments() {
        let plan = ProvisionPlan::standard(Path::new("/project"), &settings());

        assert!(plan.steps[0].args.is_empty());

        let config_args: Vec<&str> = plan.steps[1].args.iter().map(|a| a.value()).collect();
        assert_eq!(
            config_args,
            vec![
                "/vagrant/.vagrant/bootstrap/config",
                "/vagrant",
                "pa ss",
                "macaddress"
            ]
        );
        assert!(plan.steps[1].args[2].is_secret());

        let build_args: Vec<&str> = plan.steps[2].args.iter().map(|a| a.value()).collect();
        assert_eq!(build_args, vec!["/vagrant"]);
    }

    #[test]
    fn test_command_line_quotes_arguments() {
        let plan = ProvisionPlan::standard(Path::new("/project"), &settings());
        let line = plan.steps[1].command_line("bash").unwrap();

        assert_eq!(
            line,
            "bash -s -- /vagrant/.vagrant/bootstrap/config /vagrant 'pa ss' macaddress"
        );
    }

    #[test]
    fn test_redacted_command_line() {
        let plan = ProvisionPlan::standard(Path::new("/project"), &settings());
        let line = plan.steps[1].redacted_command_line("bash").unwrap();

        assert!(!line.contains("pa ss"));
        assert!(line.contains("'******'"));
        assert_eq!(format!("{:?}", plan.steps[1].args[2]), "\"******\"");
    }

    #[test]
    fn test_nul_byte_rejected() {
        let step = ProvisionStep {
            kind: StepKind::Build,
            script: PathBuf::from("build.sh"),
            args: vec![StepArg::plain("bad\0arg")],
            privileged: false,
        };
        assert!(step.command_line("sh").is_err());
    }
}
