//! Environment-derived runtime settings.
//!
//! All switches are read once by [`RuntimeSettings::from_env`] and carried by
//! value from then on. A malformed value never aborts startup: it falls back
//! to the documented default with a `warn` log.

use tracing::warn;

/// Process-level configuration switches.
///
/// | Variable | Meaning | Default |
/// |---|---|---|
/// | `OPTRACK_DEFAULT_DUMP_PROVIDERS` | register the built-in registry dump provider | `false` |
/// | `OPTRACK_DUMP_ON_SHUTDOWN` | run a dump pass from the shutdown hook | `false` |
/// | `OPTRACK_DUMP_ON_PANIC` | chain a dump pass into the panic hook | `false` |
/// | `OPTRACK_FLUSH_ON_SHUTDOWN` | flush all trackers from the shutdown hook | `false` |
/// | `OPTRACK_MAX_MSGS_PER_SEC` | default per-tracker message budget, 0 = unlimited | `0` |
/// | `OPTRACK_MAX_BYTES_PER_SEC` | default per-tracker byte budget, 0 = unlimited | `0` |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeSettings {
    /// Register the built-in registry dump provider at startup
    pub default_dump_providers: bool,
    /// Run a dump pass when the runtime shuts down
    pub dump_on_shutdown: bool,
    /// Chain the process panic hook to run a dump pass
    pub dump_on_panic: bool,
    /// Flush every tracker when the runtime shuts down
    pub flush_on_shutdown: bool,
    /// Default per-tracker message budget (0 = unlimited)
    pub max_msgs_per_sec: u64,
    /// Default per-tracker byte budget (0 = unlimited)
    pub max_bytes_per_sec: u64,
}

impl RuntimeSettings {
    /// Read every switch from the process environment.
    pub fn from_env() -> Self {
        Self {
            default_dump_providers: read_bool("OPTRACK_DEFAULT_DUMP_PROVIDERS", false),
            dump_on_shutdown: read_bool("OPTRACK_DUMP_ON_SHUTDOWN", false),
            dump_on_panic: read_bool("OPTRACK_DUMP_ON_PANIC", false),
            flush_on_shutdown: read_bool("OPTRACK_FLUSH_ON_SHUTDOWN", false),
            max_msgs_per_sec: read_u64("OPTRACK_MAX_MSGS_PER_SEC", 0),
            max_bytes_per_sec: read_u64("OPTRACK_MAX_BYTES_PER_SEC", 0),
        }
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            default_dump_providers: false,
            dump_on_shutdown: false,
            dump_on_panic: false,
            flush_on_shutdown: false,
            max_msgs_per_sec: 0,
            max_bytes_per_sec: 0,
        }
    }
}

fn read_bool(name: &str, default: bool) -> bool {
    parse_bool(name, std::env::var(name).ok(), default)
}

fn read_u64(name: &str, default: u64) -> u64 {
    parse_u64(name, std::env::var(name).ok(), default)
}

fn parse_bool(name: &str, raw: Option<String>, default: bool) -> bool {
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        other => {
            warn!(
                target: "optrack::settings",
                variable = name,
                value = other,
                default,
                "unrecognized boolean, using default"
            );
            default
        }
    }
}

fn parse_u64(name: &str, raw: Option<String>, default: u64) -> u64 {
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<u64>() {
        Ok(value) => value,
        Err(err) => {
            warn!(
                target: "optrack::settings",
                variable = name,
                value = raw.as_str(),
                error = %err,
                default,
                "unparseable number, using default"
            );
            default
        }
    }
}
