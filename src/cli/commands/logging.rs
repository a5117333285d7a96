use clap::{Arg, Command, builder::ValueParser};

pub const ARG_LOG_LEVEL: &str = "log-level";

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "off" => Ok(0),
            "error" => Ok(1),
            "warn" => Ok(2),
            "info" => Ok(3),
            "debug" => Ok(4),
            "trace" => Ok(5),
            _ => Err("invalid log level".to_string()),
        }
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_LOG_LEVEL)
            .long(ARG_LOG_LEVEL)
            .help("Level of logs to output: off, error, warn, info, debug, trace")
            .env("SSH_OTP_HELPER_LOG_LEVEL")
            .default_value("info")
            .value_parser(validator_log_level()),
    )
}
