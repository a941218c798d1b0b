//! Tracing subscriber setup for hosts embedding `interline`.
//!
//! The library crates only emit [`tracing`] events. A host installs a subscriber once at
//! startup with [`init`]; tests use [`test`].
//!
//! ## Filtering
//!
//! 1. **`INTERLINE_LOG`** (highest priority). A bare level such as `debug` is expanded to every
//!    interline namespace; anything containing `=`, `:` or `,` is used verbatim.
//! 2. **`RUST_LOG`**, used as-is.
//! 3. **Default**: `warn` globally, `info` for interline crates.
//!
//! ## Log File
//!
//! Default: `<data_local_dir>/interline/logs/interline-<pid>.log`. A path with an extension
//! in [`LogConfig::log_file`] names the file directly; any other path is treated as the
//! directory.

use std::{
    env,
    path::{Path, PathBuf},
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Crate namespaces a bare `INTERLINE_LOG` level applies to.
const NAMESPACES: &[&str] = &["interline", "interline_log"];

/// Returned from [`init`]. Dropping it flushes and stops the background file writer.
pub struct LogGuard {
    _file_guard: WorkerGuard,
    pub log_file: PathBuf,
}

#[derive(Debug, Default, Clone)]
pub struct LogConfig {
    /// File or directory override for the log file.
    pub log_file: Option<PathBuf>,
    /// Force the stdout layer on even without an env var or debug build.
    pub stdout: bool,
}

/// Install the global subscriber: a non-blocking file layer plus an optional stdout layer.
///
/// Fails if a global subscriber is already installed.
pub fn init(config: LogConfig) -> Result<LogGuard, BoxError> {
    let (dir, filename) = resolve_log_path(config.log_file);
    std::fs::create_dir_all(&dir)?;

    let appender = tracing_appender::rolling::never(&dir, &filename);
    let (writer, file_guard) = tracing_appender::non_blocking(appender);
    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_filter(file_filter()?);

    let stdout_layer = if config.stdout || env_configured() || cfg!(debug_assertions) {
        Some(fmt::layer().with_filter(filter()?))
    } else {
        None
    };

    Registry::default()
        .with(file_layer)
        .with(stdout_layer)
        .try_init()?;

    Ok(LogGuard {
        _file_guard: file_guard,
        log_file: dir.join(filename),
    })
}

/// Stdout-only subscriber for tests. Safe to call from every test.
pub fn test() {
    if let Ok(filter) = filter() {
        let _ = fmt().with_env_filter(filter).with_test_writer().try_init();
    }
}

fn env_configured() -> bool {
    env::var("INTERLINE_LOG").is_ok() || env::var("RUST_LOG").is_ok()
}

fn resolve_log_path(override_path: Option<PathBuf>) -> (PathBuf, String) {
    let filename = format!("interline-{}.log", std::process::id());

    match override_path {
        Some(path) if path.extension().is_some() => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."))
                .to_path_buf();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or(filename);
            (dir, name)
        },
        Some(dir) => (dir, filename),
        None => {
            let dir = dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("interline")
                .join("logs");
            (dir, filename)
        },
    }
}

/// The file only gets chatty when the user asked for it.
fn file_filter() -> Result<EnvFilter, BoxError> {
    if env_configured() {
        return filter();
    }
    Ok(EnvFilter::new("warn"))
}

fn filter() -> Result<EnvFilter, BoxError> {
    if let Ok(level) = env::var("INTERLINE_LOG") {
        return Ok(EnvFilter::try_new(expand_directives(&level))?);
    }
    if let Ok(rust_log) = env::var("RUST_LOG") {
        return Ok(EnvFilter::try_new(rust_log)?);
    }
    Ok(EnvFilter::new(expand_directives("info")))
}

/// Expand a bare level to per-namespace directives; pass module syntax through untouched.
fn expand_directives(value: &str) -> String {
    if value.contains('=') || value.contains(':') || value.contains(',') {
        return value.to_owned();
    }

    let mut directives = String::from("warn");
    for namespace in NAMESPACES {
        directives.push_str(&format!(",{namespace}={value}"));
    }
    directives
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_level_expands_to_namespaces() {
        assert_eq!(
            expand_directives("debug"),
            "warn,interline=debug,interline_log=debug"
        );
    }

    #[test]
    fn module_syntax_passes_through() {
        assert_eq!(
            expand_directives("interline::manager=trace"),
            "interline::manager=trace"
        );
        assert_eq!(expand_directives("warn,interline=debug"), "warn,interline=debug");
    }

    #[test]
    fn file_override_with_extension_names_the_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("custom.log");

        let (dir, name) = resolve_log_path(Some(path));

        assert_eq!(dir, tmp.path());
        assert_eq!(name, "custom.log");
    }

    #[test]
    fn directory_override_keeps_default_name() {
        let tmp = tempfile::tempdir().unwrap();

        let (dir, name) = resolve_log_path(Some(tmp.path().to_path_buf()));

        assert_eq!(dir, tmp.path());
        assert!(name.starts_with("interline-"));
        assert!(name.ends_with(".log"));
    }

    #[test]
    fn bare_file_name_lands_in_current_dir() {
        let (dir, name) = resolve_log_path(Some(PathBuf::from("trace.log")));

        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(name, "trace.log");
    }

    #[test]
    fn test_init_is_repeatable() {
        test();
        test();
    }
}
