//! OTP verification against Vault and the local trust decision.
//!
//! Vault answers a verify request with either an echo message (connectivity
//! self-test) or the username, IP and role associated with the OTP. Only the
//! second kind goes through the username, network and role checks.

pub mod error;
pub mod network;
pub mod roles;

pub use self::error::{IdentityError, RoleError, VerifyError};
pub use self::network::{InterfaceAddrs, StaticInterfaces, SystemInterfaces, validate_ip};
pub use self::roles::validate_role_name;

use crate::vault::RemoteVerifier;
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, instrument, warn};

/// Sent instead of an OTP to test the helper configuration. Must stay in sync
/// with Vault's SSH secrets engine.
pub const VERIFY_ECHO_REQUEST: &str = "verify-echo-request";

/// Vault's answer to [`VERIFY_ECHO_REQUEST`].
pub const VERIFY_ECHO_RESPONSE: &str = "verify-echo-response";

#[derive(Debug)]
pub enum OtpCode {
    Echo,
    Otp(SecretString),
}

impl OtpCode {
    #[must_use]
    pub fn new(code: &str) -> Self {
        if code == VERIFY_ECHO_REQUEST {
            Self::Echo
        } else {
            Self::Otp(SecretString::from(code.to_string()))
        }
    }

    #[must_use]
    pub fn is_echo(&self) -> bool {
        matches!(self, Self::Echo)
    }

    /// Value sent to Vault.
    #[must_use]
    pub fn expose(&self) -> &str {
        match self {
            Self::Echo => VERIFY_ECHO_REQUEST,
            Self::Otp(otp) => otp.expose_secret(),
        }
    }
}

#[derive(Debug)]
pub struct VerifyRequest {
    pub code: OtpCode,
    pub mount_point: String,
}

impl VerifyRequest {
    #[must_use]
    pub fn new(code: OtpCode, mount_point: impl Into<String>) -> Self {
        Self {
            code,
            mount_point: mount_point.into(),
        }
    }
}

/// Local trust policy for a single attempt.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    pub expected_user: String,
    pub allowed_cidrs: Vec<String>,
    /// `None` disables the role check.
    pub allowed_roles: Option<String>,
}

/// Send the code to Vault and validate the response.
///
/// # Errors
/// Returns a [`VerifyError`] describing the first check that failed.
#[instrument(skip_all, fields(mount_point = %request.mount_point, echo = request.code.is_echo()))]
pub async fn verify_otp<V, I>(
    request: &VerifyRequest,
    policy: &Policy,
    verifier: &V,
    interfaces: &I,
) -> Result<(), VerifyError>
where
    V: RemoteVerifier + Sync,
    I: InterfaceAddrs + ?Sized,
{
    let response = verifier
        .send_verify(request.code.expose(), &request.mount_point)
        .await
        .inspect_err(|e| warn!("verify request failed: {}", e))?;

    if request.code.is_echo() {
        let message = response.message.unwrap_or_default();

        if message == VERIFY_ECHO_RESPONSE {
            info!("verification successful");
            return Ok(());
        }

        warn!("invalid echo response: {:?}", message);
        return Err(VerifyError::EchoMismatch { message });
    }

    let username = response.username.unwrap_or_default();
    if username != policy.expected_user {
        warn!(
            "username mismatch: expected {:?}, got {:?}",
            policy.expected_user, username
        );
        return Err(VerifyError::UsernameMismatch {
            expected: policy.expected_user.clone(),
            actual: username,
        });
    }

    let ip = response.ip.unwrap_or_default();
    if let Err(e) = validate_ip(&ip, &policy.allowed_cidrs, interfaces) {
        info!("failed to validate IP: {}", e);
        return Err(e.into());
    }

    if let Some(allowed_roles) = &policy.allowed_roles {
        let role_name = response.role_name.unwrap_or_default();
        if let Err(e) = validate_role_name(&role_name, allowed_roles) {
            info!("failed to validate role name: {}", e);
            return Err(e.into());
        }
    }

    info!("{}@{} authenticated", username, ip);

    Ok(())
}
