//! Tracing configuration and log routing.
//!
//! Each binary logs to stdout with a compact formatter and to its own file. `GUTENSEARCH_LOG_FILE`
//! pins the file path; otherwise a daily-rotated `logs/<binary>.log` is used. Set
//! `GUTENSEARCH_LOG_FILE=off` to keep stdout only.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_FILE_VAR: &str = "GUTENSEARCH_LOG_FILE";
const LOG_DIR: &str = "logs";

/// Where file logs for one process go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// Append to a fixed file.
    File(PathBuf),
    /// Rotate daily under `dir`, files prefixed with `prefix`.
    Daily {
        /// Directory holding the rotated files.
        dir: PathBuf,
        /// File name prefix, e.g. `gutensearch-load.log`.
        prefix: String,
    },
    /// Stdout only.
    Disabled,
}

impl LogTarget {
    /// Resolve the target for `app_name` from an optional `GUTENSEARCH_LOG_FILE` value.
    pub fn resolve(app_name: &str, override_path: Option<&str>) -> Self {
        match override_path.map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("off") => Self::Disabled,
            Some(value) if !value.is_empty() => Self::File(PathBuf::from(value)),
            _ => Self::Daily {
                dir: PathBuf::from(LOG_DIR),
                prefix: format!("{app_name}.log"),
            },
        }
    }
}

/// Configure tracing subscribers for stdout and file logging of the binary `app_name`.
///
/// Respects `RUST_LOG` for filtering and falls back to `info`.
pub fn init_tracing(app_name: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    let target = LogTarget::resolve(app_name, std::env::var(LOG_FILE_VAR).ok().as_deref());
    if let Some(writer) = file_writer(&target) {
        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact();

        registry.with(file_layer).init();
    } else {
        registry.init();
    }
}

/// Returns `None` when file logging is disabled or cannot be set up; stdout logging still works then.
fn file_writer(target: &LogTarget) -> Option<NonBlocking> {
    let (non_blocking, guard) = match target {
        LogTarget::Disabled => return None,
        LogTarget::File(path) => {
            ensure_parent(path)?;
            match std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
            {
                Ok(file) => tracing_appender::non_blocking(file),
                Err(err) => {
                    eprintln!("Failed to open log file {}: {err}", path.display());
                    return None;
                }
            }
        }
        LogTarget::Daily { dir, prefix } => {
            if let Err(err) = std::fs::create_dir_all(dir) {
                eprintln!("Failed to create log directory {}: {err}", dir.display());
                return None;
            }
            tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, prefix))
        }
    };
    let _ = LOG_GUARD.set(guard);
    Some(non_blocking)
}

fn ensure_parent(path: &Path) -> Option<()> {
    match path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        Some(parent) => match std::fs::create_dir_all(parent) {
            Ok(()) => Some(()),
            Err(err) => {
                eprintln!("Failed to create log directory {}: {err}", parent.display());
                None
            }
        },
        None => Some(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_daily_file_per_binary() {
        assert_eq!(
            LogTarget::resolve("gutensearch-load", None),
            LogTarget::Daily {
                dir: PathBuf::from("logs"),
                prefix: "gutensearch-load.log".into(),
            }
        );
        assert_eq!(
            LogTarget::resolve("gutensearch", Some("  ")),
            LogTarget::resolve("gutensearch", None)
        );
    }

    #[test]
    fn override_pins_file_or_disables() {
        assert_eq!(
            LogTarget::resolve("gutensearch", Some("/var/log/gs.log")),
            LogTarget::File(PathBuf::from("/var/log/gs.log"))
        );
        assert_eq!(LogTarget::resolve("gutensearch", Some("OFF")), LogTarget::Disabled);
    }

    #[test]
    fn pinned_file_creates_missing_parent() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("nested").join("app.log");

        assert!(file_writer(&LogTarget::File(path.clone())).is_some());
        assert!(path.exists());
    }
}
