use std::borrow::Cow;
use std::env;

use crate::ClientOptions;

/// Apply default client options.
///
/// Extends the given `ClientOptions` with default options such as release
/// and environment from the environment, and the server name from the
/// host's name.  Options that are already set are left alone.
///
/// The options are read as follows:
///
/// * `release`: `SENTRY_RELEASE`.
/// * `dist`: `SENTRY_DIST`.
/// * `environment`: `SENTRY_ENVIRONMENT`, falling back to `"debug"` or
///   `"release"` depending on the build profile.
/// * `server_name`: the hostname.
///
/// # Examples
///
/// ```
/// std::env::set_var("SENTRY_RELEASE", "release-from-env");
///
/// let options = sentry_pipeline::ClientOptions::default();
/// assert_eq!(options.release, None);
///
/// let options = sentry_pipeline::apply_defaults(options);
/// assert_eq!(options.release, Some("release-from-env".into()));
/// ```
pub fn apply_defaults(mut opts: ClientOptions) -> ClientOptions {
    if opts.release.is_none() {
        opts.release = env::var("SENTRY_RELEASE").ok().map(Cow::Owned);
    }
    if opts.dist.is_none() {
        opts.dist = env::var("SENTRY_DIST").ok().map(Cow::Owned);
    }
    if opts.environment.is_none() {
        opts.environment = env::var("SENTRY_ENVIRONMENT")
            .ok()
            .map(Cow::Owned)
            .or_else(|| {
                Some(Cow::Borrowed(if cfg!(debug_assertions) {
                    "debug"
                } else {
                    "release"
                }))
            });
    }
    if opts.server_name.is_none() {
        opts.server_name = server_name().map(Cow::Owned);
    }
    opts
}

/// Returns the server name (hostname) if available.
pub fn server_name() -> Option<String> {
    hostname::get().ok().and_then(|s| s.into_string().ok())
}
