/// Emits an internal diagnostic through the `log` crate.
///
/// Everything the pipeline decides (drops, admissions, drains) is reported on
/// the `sentry` target at debug level, so it stays silent unless the host
/// application opts in through its logger configuration.
#[macro_export]
#[doc(hidden)]
macro_rules! sentry_debug {
    ($($arg:tt)*) => {
        ::log::debug!(target: "sentry", $($arg)*)
    };
}

/// Panics in debug builds and logs through `sentry_debug!` in non-debug builds.
#[macro_export]
#[doc(hidden)]
macro_rules! debug_panic_or_log {
    ($($arg:tt)*) => {{
        #[cfg(debug_assertions)]
        panic!($($arg)*);

        #[cfg(not(debug_assertions))]
        $crate::sentry_debug!($($arg)*);
    }};
}

/// If the condition is false, panics in debug builds and logs in non-debug builds.
#[macro_export]
#[doc(hidden)]
macro_rules! debug_assert_or_log {
    ($cond:expr $(,)?) => {{
        let condition = $cond;
        if !condition {
            $crate::debug_panic_or_log!("assertion failed: {}", stringify!($cond));
        }
    }};
    ($cond:expr, $($arg:tt)+) => {{
        let condition = $cond;
        if !condition {
            $crate::debug_panic_or_log!($($arg)+);
        }
    }};
}

/// Returns the release name for the calling crate as `Option<Cow<'static, str>>`.
///
/// The release is built from the `CARGO_PKG_NAME` and `CARGO_PKG_VERSION`
/// of the crate the macro is expanded in.
///
/// # Examples
///
/// ```
/// let options = sentry_pipeline::ClientOptions {
///     release: sentry_pipeline::release_name!(),
///     ..Default::default()
/// };
/// assert!(options.release.is_some());
/// ```
#[macro_export]
macro_rules! release_name {
    () => {{
        match (
            ::std::option_env!("CARGO_PKG_NAME"),
            ::std::option_env!("CARGO_PKG_VERSION"),
        ) {
            (Some(name), Some(version)) => Some(::std::borrow::Cow::Owned(
                ::std::format!("{}@{}", name, version),
            )),
            _ => None,
        }
    }};
}
