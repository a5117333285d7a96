use anyhow::Result;
use ssh_otp_helper::cli;

// Any error makes the process exit non-zero, which PAM treats as a failed login
#[tokio::main]
async fn main() -> Result<()> {
    let action = cli::start()?;

    action.execute().await?;

    Ok(())
}
