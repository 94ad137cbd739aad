//! Log output for the `orghours` binary.
//!
//! Logs always go to stderr: `collect` and `aggregate` print the merged
//! report as JSON on stdout, which must stay parseable when piped.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the stderr subscriber; `--json` selects JSON lines and `level`
/// applies when `RUST_LOG` is unset. Only the first call in a process wins.
pub fn init_tracing(json: bool, level: Level) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let stderr = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if json {
        registry.with(stderr.json()).try_init()
    } else {
        registry.with(stderr).try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
