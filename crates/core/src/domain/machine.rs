// Machine Domain Model

use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, Result};

/// A guest machine known to the provisioning tool
///
/// `name` is the display identity used in progress messages, hosts entries and
/// `vagrant ssh <name>`. `address` is the transport target (ssh host); when
/// absent the name doubles as the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub name: String,

    #[serde(default)]
    pub address: Option<String>,
}

impl Machine {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::EmptyMachineName);
        }
        Ok(Self {
            name,
            address: None,
        })
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Host the transport should connect to
    pub fn target(&self) -> &str {
        self.address.as_deref().unwrap_or(&self.name)
    }
}

impl std::fmt::Display for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_name_rejected() {
        assert_eq!(Machine::new("  "), Err(DomainError::EmptyMachineName));
    }

    #[test]
    fn test_target_falls_back_to_name() {
        let machine = Machine::new("web").unwrap();
        assert_eq!(machine.target(), "web");

        let machine = machine.with_address("192.168.50.10");
        assert_eq!(machine.target(), "192.168.50.10");
        assert_eq!(machine.to_string(), "web");
    }

    #[test]
    fn test_deserialize_without_address() {
        let machine: Machine = serde_json::from_str(r#"{"name": "db"}"#).unwrap();
        assert_eq!(machine.address, None);
        assert_eq!(machine.target(), "db");
    }
}
