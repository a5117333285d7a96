//! # ssh-otp-helper
//!
//! Verifies SSH one-time passwords (OTPs) issued by Vault's SSH secrets engine.
//! The binary is meant to run as an external command from PAM
//! (`auth requisite pam_exec.so quiet expose_authtok /usr/local/bin/ssh-otp-helper --config ...`):
//! a zero exit status lets the login continue, anything else rejects it.
//!
//! ## Verification flow
//!
//! 1. The code is read from stdin (or, with `--verify-only`, replaced by the echo
//!    marker to test connectivity without burning a real OTP).
//! 2. The code is sent to `PUT /v1/<mount>/verify`.
//! 3. For a real code Vault answers with the username, IP and role the OTP was
//!    issued for. The username must equal `PAM_USER`, the IP must belong to one of
//!    this host's interface networks or to `allowed_cidr_list`, and the role must
//!    satisfy `allowed_roles` when that option is configured.
//!
//! The decision logic lives in [`helper`]; [`vault`] is the HTTP boundary and
//! [`cli`] wires configuration, logging and stdin together.

pub mod cli;
pub mod config;
pub mod helper;
pub mod vault;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_user_agent() {
        assert!(APP_USER_AGENT.starts_with("ssh-otp-helper/"));
    }
}
