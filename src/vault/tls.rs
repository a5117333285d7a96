//! CA material for talking to Vault over HTTPS.
//!
//! `ca_cert` points at a PEM bundle, `ca_path` at a directory that is walked
//! recursively; every file in it must be a PEM bundle.

use super::VaultError;
use reqwest::Certificate;
use std::{fs, path::Path};
use tracing::debug;

/// Load every certificate of a PEM bundle.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn load_ca_cert(path: &Path) -> Result<Vec<Certificate>, VaultError> {
    let pem = fs::read(path)
        .map_err(|e| VaultError::Tls(format!("failed to read {}: {e}", path.display())))?;

    let certificates = Certificate::from_pem_bundle(&pem)
        .map_err(|e| VaultError::Tls(format!("failed to parse {}: {e}", path.display())))?;

    debug!(
        "loaded {} CA certificate(s) from {}",
        certificates.len(),
        path.display()
    );

    Ok(certificates)
}

/// Load the certificates of every file below `dir`.
///
/// # Errors
/// Returns an error if the directory cannot be walked or a file cannot be parsed.
pub fn load_ca_path(dir: &Path) -> Result<Vec<Certificate>, VaultError> {
    let mut certificates = Vec::new();

    let entries = fs::read_dir(dir)
        .map_err(|e| VaultError::Tls(format!("failed to read {}: {e}", dir.display())))?;

    for entry in entries {
        let path = entry
            .map_err(|e| VaultError::Tls(format!("failed to read {}: {e}", dir.display())))?
            .path();

        if path.is_dir() {
            certificates.extend(load_ca_path(&path)?);
        } else {
            certificates.extend(load_ca_cert(&path)?);
        }
    }

    Ok(certificates)
}
