//! Logging setup for the bridge
//!
//! The bridge logs through the `log` facade. A host process has no console,
//! so the usual sink is a file named in the `[log]` section of
//! `hmbridge.toml`; without one, lines go to stderr.
//!
//! # Log Levels
//!
//! - `error!` - the host module could not be loaded
//! - `warn!` - required exports missing, handles that failed to free
//! - `info!` - binding summary
//! - `debug!` - individual exports, state checks, macro text sent
//! - `trace!` - exchange slot traffic
//!
//! # Environment Variable
//!
//! `HMBRIDGE_LOG` overrides the configured filter with the usual
//! `env_logger` syntax:
//!
//! ```bash
//! HMBRIDGE_LOG=debug
//! HMBRIDGE_LOG=hmbridge::symbols=debug,hmbridge::exchange=trace
//! ```

use std::fs::OpenOptions;
use std::io::Write;
use std::str::FromStr;
use std::sync::Once;

use env_logger::{Builder, Env, Target};
use log::LevelFilter;

use crate::config::LogConfig;

/// Environment variable that overrides the configured filter
pub const LOG_ENV: &str = "HMBRIDGE_LOG";

static INIT: Once = Once::new();

/// Initialize logging at Warn level. Later calls are no-ops.
pub fn init() {
    init_with_level(LevelFilter::Warn);
}

/// Initialize logging at `level`, writing to stderr.
pub fn init_with_level(level: LevelFilter) {
    INIT.call_once(|| {
        let _ = builder(level).try_init();
    });
}

/// Initialize logging from `HMBRIDGE_LOG`, defaulting to `warn`.
pub fn init_from_env() {
    INIT.call_once(|| {
        let _ = Builder::from_env(Env::new().filter_or(LOG_ENV, "warn")).try_init();
    });
}

/// Initialize logging from the `[log]` section.
///
/// An unknown level falls back to Warn. A log file that cannot be opened
/// falls back to stderr.
pub fn init_with_config(config: &LogConfig) {
    INIT.call_once(|| {
        let level = LevelFilter::from_str(&config.level).unwrap_or(LevelFilter::Warn);
        let mut builder = builder(level);
        builder.parse_env(Env::new().filter(LOG_ENV));

        let mut file_error = None;
        if let Some(path) = &config.file {
            match OpenOptions::new().create(true).append(true).open(path) {
                Ok(file) => {
                    builder.target(Target::Pipe(Box::new(file)));
                }
                Err(e) => file_error = Some((path.clone(), e)),
            }
        }

        let _ = builder.try_init();
        if let Some((path, e)) = file_error {
            log::warn!("could not open log file {}: {}", path.display(), e);
        }
    });
}

fn builder(level: LevelFilter) -> Builder {
    let mut builder = Builder::new();
    builder.filter_level(level).format(|buf, record| {
        writeln!(
            buf,
            "[{:5}] {}:{} - {}",
            record.level(),
            record.file().unwrap_or("unknown"),
            record.line().unwrap_or(0),
            record.args()
        )
    });
    builder
}

/// Initialize logging for tests.
///
/// Quiet unless `HMBRIDGE_LOG` is set; safe to call from every test.
pub fn init_test() {
    let _ = Builder::from_env(Env::new().filter_or(LOG_ENV, "warn"))
        .is_test(true)
        .try_init();
}

/// Whether one of the `init*` functions other than [`init_test`] has run.
pub fn is_initialized() -> bool {
    INIT.is_completed()
}
