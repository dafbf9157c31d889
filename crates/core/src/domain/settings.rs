// Provisioning Settings

use std::collections::HashMap;

use crate::domain::error::{DomainError, Result};

/// Settings map key: guest path the project is synced to
pub const KEY_SYNC_TO: &str = "sync_to";
/// Settings map key: database password handed to config.sh
pub const KEY_DB_PASSWORD: &str = "db_password";
/// Settings map key: database name handed to config.sh
pub const KEY_DB_NAME: &str = "db_name";

/// Guest directory (relative to `sync_to`) holding bootstrap config files
pub const CONF_DIR_SUFFIX: &str = ".vagrant/bootstrap/config";

/// Typed view of the provisioning settings mapping
#[derive(Clone, PartialEq, Eq)]
pub struct ProvisionSettings {
    pub sync_to: String,
    pub db_password: String,
    pub db_name: String,
}

impl ProvisionSettings {
    /// Build from a string mapping, failing on the first missing key
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        let lookup = |key: &str| {
            map.get(key)
                .cloned()
                .ok_or_else(|| DomainError::MissingSetting(key.to_string()))
        };

        let sync_to = lookup(KEY_SYNC_TO)?;
        if sync_to.trim().is_empty() {
            return Err(DomainError::InvalidSetting {
                key: KEY_SYNC_TO.to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        Ok(Self {
            sync_to,
            db_password: lookup(KEY_DB_PASSWORD)?,
            db_name: lookup(KEY_DB_NAME)?,
        })
    }

    /// Guest-side config directory: `<sync_to>/.vagrant/bootstrap/config`
    pub fn conf_dir(&self) -> String {
        format!(
            "{}/{}",
            self.sync_to.trim_end_matches('/'),
            CONF_DIR_SUFFIX
        )
    }
}

// db_password must never reach a log line
impl std::fmt::Debug for ProvisionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionSettings")
            .field("sync_to", &self.sync_to)
            .field("db_password", &"******")
            .field("db_name", &self.db_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_from_map() {
        let settings = ProvisionSettings::from_map(&map(&[
            ("sync_to", "/vagrant"),
            ("db_password", "s3cret"),
            ("db_name", "macaddress"),
            ("unrelated", "ignored"),
        ]))
        .unwrap();

        assert_eq!(settings.sync_to, "/vagrant");
        assert_eq!(settings.db_name, "macaddress");
        assert_eq!(settings.conf_dir(), "/vagrant/.vagrant/bootstrap/config");
    }

    #[test]
    fn test_missing_key() {
        let result =
            ProvisionSettings::from_map(&map(&[("sync_to", "/vagrant"), ("db_name", "x")]));
        assert_eq!(
            result,
            Err(DomainError::MissingSetting("db_password".to_string()))
        );
    }

    #[test]
    fn test_empty_sync_to_rejected() {
        let result = ProvisionSettings::from_map(&map(&[
            ("sync_to", ""),
            ("db_password", "p"),
            ("db_name", "n"),
        ]));
        assert!(matches!(result, Err(DomainError::InvalidSetting { .. })));
    }

    #[test]
    fn test_conf_dir_trailing_slash() {
        let settings = ProvisionSettings {
            sync_to: "/srv/app/".to_string(),
            db_password: String::new(),
            db_name: String::new(),
        };
        assert_eq!(settings.conf_dir(), "/srv/app/.vagrant/bootstrap/config");
    }

    #[test]
    fn test_debug_redacts_password() {
        let settings = ProvisionSettings {
            sync_to: "/vagrant".to_string(),
            db_password: "hunter2".to_string(),
            db_name: "db".to_string(),
        };
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("******"));
    }
}
