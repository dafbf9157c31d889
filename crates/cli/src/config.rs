//! Configuration loading
//!
//! Layers, lowest precedence first:
//! 1. config file (`--config`, or `<config dir>/guestctl/config.toml` if present)
//! 2. environment variables `GUESTCTL__<SECTION>__<KEY>`; list keys take
//!    comma-separated values (`GUESTCTL__TRANSPORT__SUDO=doas,-n`)
//!
//! # Example
//!
//! ```text
//! [settings]
//! sync_to = "/vagrant"
//! db_password = "secret"
//! db_name = "macaddress"
//!
//! [[machines]]
//! name = "web"
//! address = "192.168.50.10"
//!
//! [transport]
//! kind = "ssh"
//! user = "vagrant"
//! timeout_secs = 30
//!
//! [provision]
//! dir = "~/projects/app"
//! ```

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use guestctl_core::application::Inventory;
use guestctl_core::domain::{Machine, ProvisionSettings, DEFAULT_INTERPRETER};
use guestctl_core::port::TimeProvider;
use guestctl_infra_system::{SshOptions, SubprocessChannel, Transport};

const ENV_PREFIX: &str = "GUESTCTL";
const ENV_SEPARATOR: &str = "__";
const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Transport selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Local,
    Ssh,
    Vagrant,
}

/// Transport section: which transport, its options and channel tuning
///
/// Every key must stay overridable from the environment; a tagged or
/// flattened enum here would bypass the config crate's string coercion.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub kind: TransportKind,

    /// ssh: login user
    pub user: Option<String>,
    /// ssh: port
    pub port: Option<u16>,
    /// ssh: private key
    pub identity_file: Option<PathBuf>,
    /// ssh: extra `-o` options
    #[serde(deserialize_with = "string_list")]
    pub options: Vec<String>,

    /// vagrant: directory holding the Vagrantfile
    pub project_dir: Option<PathBuf>,

    /// Per-command deadline; none by default
    pub timeout_secs: Option<u64>,

    /// Privilege wrapper, e.g. `["sudo", "-n"]`; `[]` disables it
    #[serde(deserialize_with = "optional_string_list")]
    pub sudo: Option<Vec<String>>,

    /// Host environment variables forwarded to the transport process
    #[serde(deserialize_with = "optional_string_list")]
    pub env_allowlist: Option<Vec<String>>,
}

impl TransportConfig {
    pub fn transport(&self) -> Transport {
        match self.kind {
            TransportKind::Local => Transport::Local,
            TransportKind::Ssh => Transport::Ssh(SshOptions {
                user: self.user.clone(),
                port: self.port,
                identity_file: self.identity_file.clone(),
                options: self.options.clone(),
            }),
            TransportKind::Vagrant => Transport::Vagrant {
                project_dir: self.project_dir.clone(),
            },
        }
    }
}

/// A list from a file, or a comma-separated string from the environment
#[derive(Deserialize)]
#[serde(untagged)]
enum StringList {
    List(Vec<String>),
    Csv(String),
}

impl From<StringList> for Vec<String> {
    fn from(list: StringList) -> Self {
        match list {
            StringList::List(items) => items,
            StringList::Csv(text) => text
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

fn string_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<String>, D::Error> {
    Ok(StringList::deserialize(deserializer)?.into())
}

fn optional_string_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Vec<String>>, D::Error> {
    Ok(Option::<StringList>::deserialize(deserializer)?.map(Into::into))
}

/// Provision section
#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionConfig {
    /// Project directory; scripts are read from `<dir>/script`
    #[serde(default = "default_provision_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_interpreter")]
    pub interpreter: String,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            dir: default_provision_dir(),
            interpreter: default_interpreter(),
        }
    }
}

fn default_provision_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_interpreter() -> String {
    DEFAULT_INTERPRETER.to_string()
}

/// Whole configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GuestctlConfig {
    /// Settings mapping handed to the provisioning scripts
    #[serde(default)]
    pub settings: HashMap<String, String>,

    #[serde(default)]
    pub machines: Vec<Machine>,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub provision: ProvisionConfig,
}

/// `<config dir>/guestctl/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "guestctl")
        .map(|dirs| dirs.config_dir().join(DEFAULT_CONFIG_FILE))
}

/// Expand a leading `~` in a path
fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

impl GuestctlConfig {
    /// Load from `path` (required) or the default location (optional),
    /// then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// `load` with an explicit environment in place of the process one
    fn load_with_env(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = Config::builder();

        match path {
            Some(path) => {
                let path = expand_path(path);
                builder = builder.add_source(File::from(path).required(true));
            }
            None => {
                if let Some(path) = default_config_path() {
                    builder = builder.add_source(File::from(path).required(false));
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator(ENV_SEPARATOR)
                .source(env),
        );

        let config: GuestctlConfig = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        Ok(config.expanded())
    }

    /// Expand `~` in every configured path
    fn expanded(mut self) -> Self {
        self.provision.dir = expand_path(&self.provision.dir);
        self.transport.identity_file = self.transport.identity_file.as_deref().map(expand_path);
        self.transport.project_dir = self.transport.project_dir.as_deref().map(expand_path);
        self
    }

    pub fn inventory(&self) -> guestctl_core::Result<Inventory> {
        Inventory::new(self.machines.clone())
    }

    pub fn provision_settings(&self) -> guestctl_core::Result<ProvisionSettings> {
        Ok(ProvisionSettings::from_map(&self.settings)?)
    }

    /// Project directory, with a command-line override
    pub fn provision_dir(&self, dir_override: Option<&Path>) -> PathBuf {
        dir_override
            .map(expand_path)
            .unwrap_or_else(|| self.provision.dir.clone())
    }

    /// Command channel for the configured transport
    pub fn channel(&self, time_provider: Arc<dyn TimeProvider>) -> SubprocessChannel {
        let mut channel = SubprocessChannel::new(self.transport.transport(), time_provider)
            .with_timeout(self.transport.timeout_secs.map(Duration::from_secs));

        if let Some(sudo) = &self.transport.sudo {
            channel = channel.with_sudo(sudo.clone());
        }
        if let Some(allowlist) = &self.transport.env_allowlist {
            channel = channel.with_env_allowlist(allowlist.clone());
        }
        channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(extension: &str, body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(extension)
            .tempfile()
            .unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_toml() {
        let file = write_config(
            ".toml",
            r#"
[settings]
sync_to = "/vagrant"
db_password = "secret"
db_name = "macaddress"

[[machines]]
name = "web"
address = "192.168.50.10"

[[machines]]
name = "db"

[transport]
kind = "ssh"
user = "vagrant"
port = 2222
timeout_secs = 30
sudo = []

[provision]
dir = "/srv/project"
interpreter = "sh"
"#,
        );

        let config = GuestctlConfig::load(Some(file.path())).unwrap();

        let settings = config.provision_settings().unwrap();
        assert_eq!(settings.sync_to, "/vagrant");
        assert_eq!(settings.db_name, "macaddress");

        let inventory = config.inventory().unwrap();
        assert_eq!(inventory.machines().len(), 2);
        assert_eq!(inventory.get("web").unwrap().target(), "192.168.50.10");
        assert_eq!(inventory.get("db").unwrap().target(), "db");

        match &config.transport.transport() {
            Transport::Ssh(options) => {
                assert_eq!(options.user.as_deref(), Some("vagrant"));
                assert_eq!(options.port, Some(2222));
            }
            other => panic!("unexpected transport: {:?}", other),
        }
        assert_eq!(config.transport.timeout_secs, Some(30));
        assert_eq!(config.transport.sudo, Some(Vec::new()));

        assert_eq!(config.provision.dir, PathBuf::from("/srv/project"));
        assert_eq!(config.provision.interpreter, "sh");
    }

    #[test]
    fn test_load_yaml_with_defaults() {
        let file = write_config(
            ".yaml",
            "machines:\n  - name: web\ntransport:\n  kind: vagrant\n",
        );

        let config = GuestctlConfig::load(Some(file.path())).unwrap();

        assert_eq!(
            config.transport.transport(),
            Transport::Vagrant { project_dir: None }
        );
        assert_eq!(config.provision.dir, PathBuf::from("."));
        assert_eq!(config.provision.interpreter, "bash");
        assert!(config.provision_settings().is_err());
    }

    fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_env_overrides_numeric_ssh_option() {
        let file = write_config(".toml", "[transport]\nkind = \"ssh\"\n");

        let config = GuestctlConfig::load_with_env(
            Some(file.path()),
            env(&[
                ("GUESTCTL__TRANSPORT__PORT", "2222"),
                ("GUESTCTL__TRANSPORT__TIMEOUT_SECS", "45"),
            ]),
        )
        .unwrap();

        match config.transport.transport() {
            Transport::Ssh(options) => assert_eq!(options.port, Some(2222)),
            other => panic!("unexpected transport: {:?}", other),
        }
        assert_eq!(config.transport.timeout_secs, Some(45));
    }

    #[test]
    fn test_env_overrides_list_options() {
        let file = write_config(".toml", "[transport]\nkind = \"ssh\"\nsudo = [\"sudo\", \"-n\"]\n");

        let config = GuestctlConfig::load_with_env(
            Some(file.path()),
            env(&[
                ("GUESTCTL__TRANSPORT__SUDO", "doas,-n"),
                ("GUESTCTL__TRANSPORT__ENV_ALLOWLIST", "PATH, HOME"),
                ("GUESTCTL__TRANSPORT__OPTIONS", "StrictHostKeyChecking=no"),
            ]),
        )
        .unwrap();

        assert_eq!(
            config.transport.sudo,
            Some(vec!["doas".to_string(), "-n".to_string()])
        );
        assert_eq!(
            config.transport.env_allowlist,
            Some(vec!["PATH".to_string(), "HOME".to_string()])
        );
        assert_eq!(config.transport.options, vec!["StrictHostKeyChecking=no"]);
    }

    #[test]
    fn test_env_selects_transport_kind() {
        let file = write_config(".toml", "[[machines]]\nname = \"web\"\n");

        let config = GuestctlConfig::load_with_env(
            Some(file.path()),
            env(&[
                ("GUESTCTL__TRANSPORT__KIND", "vagrant"),
                ("GUESTCTL__TRANSPORT__PROJECT_DIR", "/srv/boxes"),
            ]),
        )
        .unwrap();

        assert_eq!(
            config.transport.transport(),
            Transport::Vagrant {
                project_dir: Some(PathBuf::from("/srv/boxes"))
            }
        );
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result = GuestctlConfig::load(Some(Path::new("/nonexistent/guestctl.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_provision_dir_override() {
        let config = GuestctlConfig::default();
        assert_eq!(config.provision_dir(None), PathBuf::from("."));
        assert_eq!(
            config.provision_dir(Some(Path::new("/other"))),
            PathBuf::from("/other")
        );
    }
}
