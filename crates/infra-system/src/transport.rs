// Transport - how a guest command is turned into a host child process
use std::path::PathBuf;

use guestctl_core::domain::Machine;

/// OpenSSH client options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SshOptions {
    /// Login user (`-l`)
    pub user: Option<String>,
    /// Port (`-p`)
    pub port: Option<u16>,
    /// Private key (`-i`)
    pub identity_file: Option<PathBuf>,
    /// Extra `-o` options, e.g. `StrictHostKeyChecking=no`
    pub options: Vec<String>,
}

/// Transport used to reach a guest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Transport {
    /// `sh -c` on this host; the machine is only a label
    #[default]
    Local,
    /// `ssh <target> <command>`
    Ssh(SshOptions),
    /// `vagrant ssh <name> -c <command>`
    Vagrant { project_dir: Option<PathBuf> },
}

/// Host process to spawn for one guest command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launch {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
}

impl Transport {
    pub fn name(&self) -> &'static str {
        match self {
            Transport::Local => "local",
            Transport::Ssh(_) => "ssh",
            Transport::Vagrant { .. } => "vagrant",
        }
    }

    /// Whether exit status 255 means the client could not connect
    pub fn reserves_exit_255(&self) -> bool {
        matches!(self, Transport::Ssh(_))
    }

    /// Host process that runs `remote_command` on `machine`
    pub fn launch(&self, machine: &Machine, remote_command: &str) -> Launch {
        match self {
            Transport::Local => Launch {
                program: "sh".to_string(),
                args: vec!["-c".to_string(), remote_command.to_string()],
                current_dir: None,
            },
            Transport::Ssh(options) => {
                let mut args = vec!["-o".to_string(), "BatchMode=yes".to_string()];
                for option in &options.options {
                    args.push("-o".to_string());
                    args.push(option.clone());
                }
                if let Some(port) = options.port {
                    args.push("-p".to_string());
                    args.push(port.to_string());
                }
                if let Some(identity) = &options.identity_file {
                    args.push("-i".to_string());
                    args.push(identity.display().to_string());
                }
                if let Some(user) = &options.user {
                    args.push("-l".to_string());
                    args.push(user.clone());
                }
                args.push(machine.target().to_string());
                args.push(remote_command.to_string());

                Launch {
                    program: "ssh".to_string(),
                    args,
                    current_dir: None,
                }
            }
            Transport::Vagrant { project_dir } => Launch {
                program: "vagrant".to_string(),
                args: vec![
                    "ssh".to_string(),
                    machine.name.clone(),
                    "-c".to_string(),
                    remote_command.to_string(),
                ],
                current_dir: project_dir.clone(),
            },
        }
    }
}
