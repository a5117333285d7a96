pub mod logging;

use clap::{
    Arg, ArgAction, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

pub const ARG_CONFIG: &str = "config";
pub const ARG_VERIFY_ONLY: &str = "verify-only";
pub const ARG_DEV: &str = "dev";
pub const ARG_PAM_USER: &str = "pam-user";
pub const ARG_VAULT_TOKEN: &str = "vault-token";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("ssh-otp-helper")
        .about("Validates SSH one-time passwords with Vault; meant to run from pam_exec")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_CONFIG)
                .short('c')
                .long(ARG_CONFIG)
                .help("Path to the helper configuration file")
                .env("SSH_OTP_HELPER_CONFIG")
                .required(true),
        )
        .arg(
            Arg::new(ARG_VERIFY_ONLY)
                .long(ARG_VERIFY_ONLY)
                .help("Verify the installation and communication with Vault without reading an OTP")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_DEV)
                .long(ARG_DEV)
                .help("Dev mode: allow plain http and ignore CA settings")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_PAM_USER)
                .long(ARG_PAM_USER)
                .help("Username being authenticated, set by PAM")
                .env("PAM_USER")
                .hide(true),
        )
        .arg(
            Arg::new(ARG_VAULT_TOKEN)
                .long(ARG_VAULT_TOKEN)
                .help("Vault token sent with verify requests")
                .env("VAULT_TOKEN")
                .hide_env_values(true)
                .hide(true),
        );

    logging::with_args(command)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "ssh-otp-helper");
        assert_eq!(
            command.get_version().unwrap().to_string(),
            env!("CARGO_PKG_VERSION")
        );
    }

    #[test]
    fn test_check_args() {
        temp_env::with_vars(
            [
                ("PAM_USER", None::<&str>),
                ("VAULT_TOKEN", None::<&str>),
                ("SSH_OTP_HELPER_LOG_LEVEL", None::<&str>),
            ],
            || {
                let matches = new().get_matches_from(vec![
                    "ssh-otp-helper",
                    "--config",
                    "/etc/ssh-otp-helper.d/config.toml",
                    "--verify-only",
                    "--dev",
                ]);

                assert_eq!(
                    matches.get_one::<String>(ARG_CONFIG).map(String::as_str),
                    Some("/etc/ssh-otp-helper.d/config.toml")
                );
                assert!(matches.get_flag(ARG_VERIFY_ONLY));
                assert!(matches.get_flag(ARG_DEV));
                assert!(matches.get_one::<String>(ARG_PAM_USER).is_none());
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_LOG_LEVEL).copied(),
                    Some(3)
                );
            },
        );
    }

    #[test]
    fn test_config_required() {
        temp_env::with_vars([("SSH_OTP_HELPER_CONFIG", None::<&str>)], || {
            let result = new().try_get_matches_from(vec!["ssh-otp-helper"]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("SSH_OTP_HELPER_CONFIG", Some("/tmp/helper.toml")),
                ("PAM_USER", Some("ubuntu")),
                ("VAULT_TOKEN", Some("s.token")),
                ("SSH_OTP_HELPER_LOG_LEVEL", Some("debug")),
            ],
            || {
                let matches = new().get_matches_from(vec!["ssh-otp-helper"]);
                assert_eq!(
                    matches.get_one::<String>(ARG_CONFIG).map(String::as_str),
                    Some("/tmp/helper.toml")
                );
                assert_eq!(
                    matches.get_one::<String>(ARG_PAM_USER).map(String::as_str),
                    Some("ubuntu")
                );
                assert_eq!(
                    matches.get_one::<String>(ARG_VAULT_TOKEN).map(String::as_str),
                    Some("s.token")
                );
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_LOG_LEVEL).copied(),
                    Some(4)
                );
                assert!(!matches.get_flag(ARG_VERIFY_ONLY));
            },
        );
    }

    #[test]
    fn test_check_log_levels() {
        // loop cover all possible value_parse
        let levels = vec!["off", "error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars([("SSH_OTP_HELPER_LOG_LEVEL", None::<&str>)], || {
                let matches = new().get_matches_from(vec![
                    "ssh-otp-helper",
                    "--config",
                    "/tmp/helper.toml",
                    "--log-level",
                    level,
                ]);
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_LOG_LEVEL).copied(),
                    Some(index as u8)
                );
            });
        }
    }

    #[test]
    fn test_invalid_log_level() {
        let result = new().try_get_matches_from(vec![
            "ssh-otp-helper",
            "--config",
            "/tmp/helper.toml",
            "--log-level",
            "loud",
        ]);
        assert!(result.is_err());
    }
}
