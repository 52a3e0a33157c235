use anyhow::Context;
use clap::{Arg, ArgMatches, Command};
use std::time::Duration;
use url::Url;

pub const ARG_BACKEND_URL: &str = "backend-url";
pub const ARG_REQUEST_TIMEOUT: &str = "request-timeout";
pub const ARG_REFRESH_TIMEOUT: &str = "refresh-timeout";

#[derive(Debug)]
pub struct Options {
    pub url: String,
    pub request_timeout: Duration,
    pub refresh_timeout: Duration,
}

impl Options {
    /// Parse backend arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the URL is missing or is not an absolute http(s) URL.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let url = matches
            .get_one::<String>(ARG_BACKEND_URL)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_BACKEND_URL}"))?;

        let parsed = Url::parse(&url).with_context(|| format!("invalid --{ARG_BACKEND_URL}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("--{ARG_BACKEND_URL} must use http or https, got {url}");
        }

        let seconds = |id: &str, default: u64| {
            Duration::from_secs(matches.get_one::<u64>(id).copied().unwrap_or(default))
        };

        Ok(Self {
            url,
            request_timeout: seconds(ARG_REQUEST_TIMEOUT, 10),
            refresh_timeout: seconds(ARG_REFRESH_TIMEOUT, 10),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_BACKEND_URL)
                .short('b')
                .long(ARG_BACKEND_URL)
                .help("Base URL of the backend auth service, e.g. http://localhost:8000")
                .env("AUTHPORTAL_BACKEND_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_REQUEST_TIMEOUT)
                .long(ARG_REQUEST_TIMEOUT)
                .help("Timeout in seconds for each backend request")
                .env("AUTHPORTAL_REQUEST_TIMEOUT")
                .default_value("10")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TIMEOUT)
                .long(ARG_REFRESH_TIMEOUT)
                .help("Timeout in seconds for a token refresh; queued requests give up after it")
                .env("AUTHPORTAL_REFRESH_TIMEOUT")
                .default_value("10")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
