use crate::{
    APP_USER_AGENT,
    config::HelperConfig,
    helper::{self, OtpCode, SystemInterfaces, VerifyRequest},
    vault::VaultClient,
};
use anyhow::{Context, Result, anyhow};
use secrecy::SecretString;
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::info;
use uuid::Uuid;

#[derive(Debug)]
pub struct Args {
    pub config: PathBuf,
    pub verify_only: bool,
    pub dev: bool,
    pub pam_user: Option<String>,
    pub vault_token: Option<SecretString>,
}

/// Read the OTP written by `pam_exec expose_authtok`: the token followed by a
/// NUL byte. Anything that is not a hyphenated UUID is refused, which also keeps
/// the echo marker from being smuggled in through stdin.
///
/// # Errors
/// Returns an error if the input cannot be read or is not a UUID.
pub async fn read_otp<R>(mut reader: R) -> Result<OtpCode>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    reader
        .read_to_end(&mut buf)
        .await
        .context("Failed to read OTP from stdin")?;

    let input = String::from_utf8(buf).map_err(|_| anyhow!("OTP is not valid UTF-8"))?;
    let otp = input.strip_suffix('\0').unwrap_or(&input);

    if otp.len() != 36 {
        return Err(anyhow!("uuid string is wrong length"));
    }

    Uuid::try_parse(otp).map_err(|e| anyhow!("invalid OTP: {e}"))?;

    Ok(OtpCode::new(otp))
}

/// Execute the verify action.
/// # Errors
/// Returns an error if the configuration is invalid, the OTP cannot be read, or
/// verification fails.
pub async fn execute(args: Args) -> Result<()> {
    let mut config = HelperConfig::load(&args.config)?;
    config.apply_mode(args.dev)?;

    // The mount point and namespace vary per deployment; log them for debugging
    info!("using SSH mount point: {}", config.ssh_mount_point);
    info!(
        "using namespace: {}",
        config.namespace.as_deref().unwrap_or_default()
    );

    let code = if args.verify_only {
        OtpCode::Echo
    } else {
        read_otp(tokio::io::stdin()).await?
    };

    let expected_user = match (&code, args.pam_user) {
        (OtpCode::Echo, user) => user.unwrap_or_default(),
        (OtpCode::Otp(_), Some(user)) => user,
        (OtpCode::Otp(_), None) => return Err(anyhow!("PAM_USER is not set")),
    };

    let client = VaultClient::new(APP_USER_AGENT, config.client_settings(args.vault_token))?;
    let policy = config.policy(&expected_user);
    let request = VerifyRequest::new(code, config.ssh_mount_point.clone());

    helper::verify_otp(&request, &policy, &client, &SystemInterfaces).await?;

    Ok(())
}
