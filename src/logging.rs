use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE: &str = "rich-presence-manager.log";
const DEFAULT_FILTER: &str = "info,hyper=warn,reqwest=warn";
const RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Console output plus a daily rolling file in the data directory. Keep the
/// returned guard alive or buffered file lines are lost on exit.
pub fn init_logging() -> WorkerGuard {
    let log_dir = get_log_directory();
    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, LOG_FILE));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_writer(file_writer),
        )
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Logging to {}",
        log_dir.display()
    );

    let removed = cleanup_old_logs(&log_dir, SystemTime::now() - RETENTION);
    if removed > 0 {
        tracing::info!("Removed {} expired log file(s)", removed);
    }

    guard
}

fn get_log_directory() -> PathBuf {
    let log_dir = crate::settings::data_dir().join("logs");
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: could not create log directory {}: {}", log_dir.display(), e);
    }
    log_dir
}

/// Rotated files are named `<LOG_FILE>.<date>`
fn is_rotated_log(filename: &str) -> bool {
    filename.starts_with(LOG_FILE) && filename != LOG_FILE
}

/// Remove rotated log files last modified before `cutoff`
fn cleanup_old_logs(log_dir: &Path, cutoff: SystemTime) -> usize {
    let entries = match std::fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Skipping log cleanup, cannot read {}: {}", log_dir.display(), e);
            return 0;
        }
    };

    entries
        .flatten()
        .filter(|entry| entry.file_name().to_str().is_some_and(is_rotated_log))
        .filter(|entry| {
            entry
                .metadata()
                .and_then(|m| m.modified())
                .is_ok_and(|modified| modified < cutoff)
        })
        .filter(|entry| match std::fs::remove_file(entry.path()) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Could not remove expired log {:?}: {}", entry.path(), e);
                false
            }
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_rotated_log() {
        assert!(is_rotated_log("rich-presence-manager.log.2026-10-01"));
        assert!(!is_rotated_log("rich-presence-manager.log"));
        assert!(!is_rotated_log("settings.json"));
    }

    #[test]
    fn test_cleanup_only_touches_rotated_logs() {
        let dir = TempDir::new().unwrap();
        for name in [
            "rich-presence-manager.log",
            "rich-presence-manager.log.2026-10-01",
            "notes.txt",
        ] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }

        // Everything was modified before a cutoff in the future
        let removed = cleanup_old_logs(dir.path(), SystemTime::now() + Duration::from_secs(60));

        assert_eq!(removed, 1);
        assert!(dir.path().join("rich-presence-manager.log").exists());
        assert!(dir.path().join("notes.txt").exists());
        assert!(!dir.path().join("rich-presence-manager.log.2026-10-01").exists());
    }

    #[test]
    fn test_cleanup_keeps_recent_logs() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("rich-presence-manager.log.2026-10-18"), "x").unwrap();

        let cutoff = SystemTime::now() - RETENTION;
        assert_eq!(cleanup_old_logs(dir.path(), cutoff), 0);
    }
}
