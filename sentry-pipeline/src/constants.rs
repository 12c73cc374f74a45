use crate::protocol::{ClientSdkInfo, ClientSdkPackage};

/// The version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Hard ceiling for the number of breadcrumbs kept on a scope.
///
/// `ClientOptions::max_breadcrumbs` can lower this but never raise it.
pub const MAX_BREADCRUMBS: usize = 100;

/// Default maximum length of messages and exception values.
pub const DEFAULT_MAX_VALUE_LENGTH: usize = 250;

/// Default number of deliveries that may be in flight at the same time.
pub const DEFAULT_BUFFER_SIZE: usize = 30;

lazy_static::lazy_static! {
    pub static ref SDK_INFO: ClientSdkInfo = ClientSdkInfo {
        name: "sentry.rust.pipeline".into(),
        version: VERSION.into(),
        packages: vec![ClientSdkPackage {
            name: "cargo:sentry-pipeline".into(),
            version: VERSION.into(),
        }],
        integrations: vec![],
    };
}
