//! Log output for applications that do not install a subscriber themselves.

use std::sync::OnceLock;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the filter, e.g. `SPA_LOG=spa_sdk=trace`.
pub const LOG_ENV: &str = "SPA_LOG";

static INSTALLED: OnceLock<bool> = OnceLock::new();

/// Installs a stderr `fmt` subscriber at `debug` when `debug` is set, `error`
/// otherwise. Only the first call has an effect, and an already installed
/// global subscriber is left alone. Returns whether this crate's subscriber
/// is the active one.
pub fn init(debug: bool) -> bool {
    *INSTALLED.get_or_init(|| {
        let level = if debug {
            LevelFilter::DEBUG
        } else {
            LevelFilter::ERROR
        };
        let filter = EnvFilter::builder()
            .with_default_directive(level.into())
            .with_env_var(LOG_ENV)
            .from_env_lossy();

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .try_init()
            .is_ok()
    })
}
