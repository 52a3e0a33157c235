use clap::{builder::ValueParser, Arg, ArgAction, Command};

pub const ARG_VERBOSITY: &str = "verbosity";

/// Level names indexed by verbosity count; `-v` steps one entry down the list.
pub const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Map a level name, or an explicit count, to a verbosity count.
fn parse_level(level: &str) -> Option<u8> {
    let level = level.trim().to_lowercase();
    if let Ok(count) = level.parse::<u8>() {
        return (usize::from(count) < LEVELS.len()).then_some(count);
    }
    let level = if level == "warning" { "warn" } else { &level };
    LEVELS
        .iter()
        .position(|name| *name == level)
        .and_then(|index| u8::try_from(index).ok())
}

/// `AUTHPORTAL_LOG_LEVEL` takes a name from [`LEVELS`] or a count `0`-`4`.
#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> Result<u8, String> {
        parse_level(level).ok_or_else(|| {
            format!(
                "invalid log level '{level}', expected one of: {}",
                LEVELS.join(", ")
            )
        })
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Log verbosity: -v warn, -vv info, -vvv debug, -vvvv trace (default: error)")
            .env("AUTHPORTAL_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_level_names_and_counts() {
        for (index, name) in LEVELS.iter().enumerate() {
            assert_eq!(parse_level(name), u8::try_from(index).ok());
            assert_eq!(parse_level(&name.to_uppercase()), u8::try_from(index).ok());
        }
        assert_eq!(parse_level("warning"), Some(1));
        assert_eq!(parse_level(" 3 "), Some(3));
    }

    #[test]
    fn parse_level_rejects_unknown() {
        assert_eq!(parse_level("5"), None);
        assert_eq!(parse_level("verbose"), None);
        assert_eq!(parse_level(""), None);
    }
}
