use clap::{Arg, ArgAction, ArgMatches, Command};

pub const ARG_COOKIE_SECURE: &str = "cookie-secure";
pub const ARG_ACCESS_TOKEN_MAX_AGE: &str = "access-token-max-age";
pub const ARG_REFRESH_TOKEN_MAX_AGE: &str = "refresh-token-max-age";
pub const ARG_PROTECTED_PATH: &str = "protected-path";

#[derive(Debug)]
pub struct Options {
    pub cookie_secure: bool,
    pub access_token_max_age: u64,
    pub refresh_token_max_age: u64,
    pub protected_paths: Vec<String>,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            cookie_secure: matches.get_flag(ARG_COOKIE_SECURE),
            access_token_max_age: matches
                .get_one::<u64>(ARG_ACCESS_TOKEN_MAX_AGE)
                .copied()
                .unwrap_or(900),
            refresh_token_max_age: matches
                .get_one::<u64>(ARG_REFRESH_TOKEN_MAX_AGE)
                .copied()
                .unwrap_or(604_800),
            protected_paths: matches
                .get_many::<String>(ARG_PROTECTED_PATH)
                .map(|paths| paths.cloned().collect())
                .unwrap_or_default(),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark session cookies Secure (enable when served over HTTPS)")
                .env("AUTHPORTAL_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_MAX_AGE)
                .long(ARG_ACCESS_TOKEN_MAX_AGE)
                .help("Max-Age in seconds of the accessToken cookie")
                .env("AUTHPORTAL_ACCESS_TOKEN_MAX_AGE")
                .default_value("900")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_MAX_AGE)
                .long(ARG_REFRESH_TOKEN_MAX_AGE)
                .help("Max-Age in seconds of the refreshToken cookie")
                .env("AUTHPORTAL_REFRESH_TOKEN_MAX_AGE")
                .default_value("604800")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_PROTECTED_PATH)
                .long(ARG_PROTECTED_PATH)
                .help("Path prefix that requires a session; repeat or comma-separate for several")
                .env("AUTHPORTAL_PROTECTED_PATHS")
                .action(ArgAction::Append)
                .value_delimiter(',')
                .default_value("/dashboard"),
        )
}
