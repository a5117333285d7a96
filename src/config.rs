//! Helper configuration file.
//!
//! ```toml
//! vault_addr = "https://vault.example.com:8200"
//! ssh_mount_point = "ssh"
//! namespace = "my_namespace"
//! ca_cert = "/etc/vault-ssh-helper.d/vault.crt"
//! tls_skip_verify = false
//! allowed_cidr_list = "10.0.0.0/8,192.168.0.0/16"
//! allowed_roles = "*"
//! ```

use crate::{helper::Policy, vault::ClientSettings};
use anyhow::{Context, Result, anyhow};
use secrecy::SecretString;
use serde::Deserialize;
use std::{fs, path::Path, path::PathBuf};
use tracing::warn;

pub const DEFAULT_MOUNT_POINT: &str = "ssh";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HelperConfig {
    #[serde(default)]
    pub vault_addr: String,
    #[serde(default)]
    pub ssh_mount_point: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,
    #[serde(default)]
    pub ca_path: Option<PathBuf>,
    #[serde(default)]
    pub tls_skip_verify: bool,
    #[serde(default)]
    pub allowed_cidr_list: Option<String>,
    #[serde(default)]
    pub allowed_roles: Option<String>,
}

impl HelperConfig {
    /// Read and validate a config file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, has unknown keys, or lacks `vault_addr`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse and validate config contents.
    ///
    /// # Errors
    /// Returns an error if the contents are not valid or `vault_addr` is missing.
    pub fn parse(contents: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(contents)?;

        config.vault_addr = config.vault_addr.trim().to_string();
        if config.vault_addr.is_empty() {
            return Err(anyhow!("missing config 'vault_addr'"));
        }

        config.ssh_mount_point = config.ssh_mount_point.trim().trim_matches('/').to_string();
        if config.ssh_mount_point.is_empty() {
            config.ssh_mount_point = DEFAULT_MOUNT_POINT.to_string();
        }

        Ok(config)
    }

    /// Enforce the scheme policy. Dev mode only talks plain `http` and ignores
    /// CA settings; otherwise `http` is refused.
    ///
    /// # Errors
    /// Returns an error if `vault_addr` uses a scheme the mode does not allow.
    pub fn apply_mode(&mut self, dev: bool) -> Result<()> {
        let addr = self.vault_addr.to_lowercase();

        if dev {
            warn!("Dev mode is enabled!");

            if addr.starts_with("https://") {
                return Err(anyhow!("unsupported scheme in 'dev' mode"));
            }

            self.ca_cert = None;
            self.ca_path = None;
        } else if addr.starts_with("http://") {
            return Err(anyhow!("unsupported scheme. use 'dev' mode"));
        }

        Ok(())
    }

    /// Entries of `allowed_cidr_list`. A blank list is empty; blank entries
    /// inside a non-blank list are kept so validation rejects them.
    #[must_use]
    pub fn allowed_cidrs(&self) -> Vec<String> {
        match self.allowed_cidr_list.as_deref().map(str::trim) {
            None | Some("") => Vec::new(),
            Some(list) => list.split(',').map(|cidr| cidr.trim().to_string()).collect(),
        }
    }

    #[must_use]
    pub fn policy(&self, expected_user: &str) -> Policy {
        Policy {
            expected_user: expected_user.to_string(),
            allowed_cidrs: self.allowed_cidrs(),
            allowed_roles: self.allowed_roles.clone(),
        }
    }

    #[must_use]
    pub fn client_settings(&self, token: Option<SecretString>) -> ClientSettings {
        ClientSettings {
            address: self.vault_addr.clone(),
            namespace: self.namespace.clone(),
            token,
            ca_cert: self.ca_cert.clone(),
            ca_path: self.ca_path.clone(),
            tls_skip_verify: self.tls_skip_verify,
        }
    }
}
