//! Map validated CLI arguments to the action to run.

use crate::cli::actions::{Action, verify::Args};
use crate::cli::commands::{ARG_CONFIG, ARG_DEV, ARG_PAM_USER, ARG_VAULT_TOKEN, ARG_VERIFY_ONLY};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::path::PathBuf;

/// Map validated CLI matches to a verify action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let config = matches
        .get_one::<String>(ARG_CONFIG)
        .map(PathBuf::from)
        .context("at least one config path must be specified with --config")?;

    Ok(Action::Verify(Args {
        config,
        verify_only: matches.get_flag(ARG_VERIFY_ONLY),
        dev: matches.get_flag(ARG_DEV),
        pam_user: matches.get_one::<String>(ARG_PAM_USER).cloned(),
        vault_token: matches
            .get_one::<String>(ARG_VAULT_TOKEN)
            .filter(|token| !token.trim().is_empty())
            .map(|token| SecretString::from(token.clone())),
    }))
}
