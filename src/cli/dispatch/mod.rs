//! Map parsed CLI arguments to the action to run.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{backend, session, ARG_PORT};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);

    let backend_opts = backend::Options::parse(matches)?;
    let session_opts = session::Options::parse(matches);

    Ok(Action::Server(Args {
        port,
        backend_url: backend_opts.url,
        request_timeout: backend_opts.request_timeout,
        refresh_timeout: backend_opts.refresh_timeout,
        cookie_secure: session_opts.cookie_secure,
        access_token_max_age: session_opts.access_token_max_age,
        refresh_token_max_age: session_opts.refresh_token_max_age,
        protected_paths: session_opts.protected_paths,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cli::commands;

    #[test]
    fn server_action_from_args() {
        temp_env::with_vars(
            [
                ("AUTHPORTAL_BACKEND_URL", None::<&str>),
                ("AUTHPORTAL_PORT", None),
                ("AUTHPORTAL_PROTECTED_PATHS", None),
                ("AUTHPORTAL_COOKIE_SECURE", None),
            ],
            || {
                let matches = commands::new().get_matches_from([
                    "authportal",
                    "--backend-url",
                    "https://auth.example.com/",
                    "--port",
                    "9000",
                ]);
                let Action::Server(args) = handler(&matches).unwrap();
                assert_eq!(args.port, 9000);
                assert_eq!(args.backend_url, "https://auth.example.com/");
                assert!(!args.cookie_secure);
                assert_eq!(args.protected_paths, ["/dashboard"]);
            },
        );
    }

    #[test]
    fn blank_backend_url_is_rejected() {
        temp_env::with_vars([("AUTHPORTAL_BACKEND_URL", Some("  "))], || {
            let matches = commands::new().get_matches_from(["authportal"]);
            assert!(handler(&matches).is_err());
        });
    }
}
