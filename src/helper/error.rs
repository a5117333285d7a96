use crate::vault::VaultError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("vault request failed: {0}")]
    Transport(#[from] VaultError),
    #[error("invalid echo response: {message:?}")]
    EchoMismatch { message: String },
    #[error("username mismatch: expected {expected:?}, vault returned {actual:?}")]
    UsernameMismatch { expected: String, actual: String },
    #[error("failed to validate IP: {0}")]
    NetworkIdentity(#[from] IdentityError),
    #[error("failed to validate role name: {0}")]
    RoleAuthorization(#[from] RoleError),
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid IP address: {0:?}")]
    InvalidIp(String),
    #[error("invalid CIDR block {cidr:?}: {reason}")]
    InvalidCidr { cidr: String, reason: String },
    #[error(
        "IP {ip} did not match any of the network interface addresses; configure 'allowed_cidr_list' if this was expected"
    )]
    NoInterfaceMatch { ip: String },
    #[error("IP {ip} did not match any network interface or entry of 'allowed_cidr_list'")]
    NoMatch { ip: String },
    #[error("failed to read network interfaces: {0}")]
    Interfaces(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum RoleError {
    #[error("missing allowed_roles")]
    MissingPolicy,
    #[error("missing role name in the verification response")]
    MissingRoleName,
    #[error("role name {role:?} in the verification response does not match any of the allowed_roles")]
    NoRoleMatch { role: String },
}
