//! Static group configuration: a table mapping group name to its
//! ordered roster, shared password, and where to find each participant's
//! persistent RSA public key. Deliberately a flat file rather than a
//! database — group and password management are out of scope here.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One configured group. The roster order is significant: it is the
/// canonical ordering used to size the collision pad (`N` = roster len - 1)
/// and is never reshuffled at runtime.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroupConfig {
    pub password: String,
    pub roster: Vec<String>,
}

/// The full configuration file: every group the coordinator knows about, plus
/// the directory holding each participant's public key (as
/// `<keys_dir>/<lowercase_name>_public.pem`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub keys_dir: PathBuf,
    #[serde(default)]
    pub group: BTreeMap<String, GroupConfig>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn group(&self, name: &str) -> Option<&GroupConfig> {
        self.group.get(name)
    }

    /// Path to a participant's persistent public key:
    /// `<lowercase_name>_public.pem` under the configured key directory.
    pub fn public_key_path(&self, participant: &str) -> PathBuf {
        self.keys_dir
            .join(format!("{}_public.pem", participant.to_lowercase()))
    }

    /// Path to a participant's private key file, only ever read by the
    /// owning client: `<lowercase_name>_private.pem`.
    pub fn private_key_path(&self, participant: &str) -> PathBuf {
        self.keys_dir
            .join(format!("{}_private.pem", participant.to_lowercase()))
    }
}

impl GroupConfig {
    pub fn contains(&self, participant: &str) -> bool {
        self.roster.iter().any(|p| p == participant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_a_minimal_config() {
        let dir = tempfile::tempdir().unwrap();
        let toml = format!(
            r#"
            keys_dir = "{}"

            [group.test]
            password = "password"
            roster = ["Alice", "Bob"]
            "#,
            dir.path().display()
        );
        let path = dir.path().join("config.toml");
        std::fs::write(&path, toml).unwrap();

        let config = Config::load(&path).unwrap();
        let group = config.group("test").unwrap();
        assert_eq!(group.roster, vec!["Alice", "Bob"]);
        assert!(group.contains("Alice"));
        assert!(!group.contains("Carol"));
    }
}
