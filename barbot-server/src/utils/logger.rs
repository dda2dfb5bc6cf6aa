//! Logging Infrastructure
//!
//! - Console output, pretty or JSON
//! - Daily rotating application logs under `<log_dir>/app` (pruned after 14 days)
//! - Daily rotating audit logs under `<log_dir>/audit` (kept), fed by
//!   [`audit_log!`](crate::audit_log)

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Metadata;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

/// Target reserved for inventory audit records
pub const AUDIT_TARGET: &str = "audit";

/// Application logs older than this are deleted
const APP_LOG_RETENTION_DAYS: i64 = 14;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

fn is_audit(meta: &Metadata<'_>) -> bool {
    meta.target() == AUDIT_TARGET
}

fn is_app(meta: &Metadata<'_>) -> bool {
    !is_audit(meta)
}

fn console_layer(level: &str, json_format: bool) -> BoxedLayer {
    let layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true);
    if json_format {
        layer
            .json()
            .with_current_span(true)
            .with_filter(level_filter(level))
            .boxed()
    } else {
        layer.with_filter(level_filter(level)).boxed()
    }
}

fn file_layer(
    appender: RollingFileAppender,
    level: &str,
    json_format: bool,
    keep: fn(&Metadata<'_>) -> bool,
) -> BoxedLayer {
    let layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(appender));
    if json_format {
        layer
            .json()
            .with_current_span(true)
            .with_filter(filter_fn(keep))
            .with_filter(level_filter(level))
            .boxed()
    } else {
        layer
            .with_filter(filter_fn(keep))
            .with_filter(level_filter(level))
            .boxed()
    }
}

/// Initialize the global subscriber
///
/// # Arguments
/// * `level` - Log level (e.g., "info", "debug"); `RUST_LOG` wins when set
/// * `json_format` - JSON lines instead of the human readable format
/// * `log_dir` - Optional directory for file logging (e.g., `Some("./work_dir/logs")`)
///
/// ```no_run
/// use barbot_server::utils::logger::init_logger_with_file;
///
/// init_logger_with_file("debug", false, None)?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn init_logger_with_file(
    level: &str,
    json_format: bool,
    log_dir: Option<&str>,
) -> anyhow::Result<()> {
    let mut layers: Vec<BoxedLayer> = vec![console_layer(level, json_format)];

    if let Some(dir) = log_dir {
        let log_dir = Path::new(dir);
        let app_dir = log_dir.join("app");
        let audit_dir = log_dir.join("audit");
        fs::create_dir_all(&app_dir)?;
        fs::create_dir_all(&audit_dir)?;

        let app_log = RollingFileAppender::new(Rotation::DAILY, app_dir, "app");
        let audit_log = RollingFileAppender::new(Rotation::DAILY, audit_dir, "audit");
        layers.push(file_layer(app_log, level, json_format, is_app));
        layers.push(file_layer(audit_log, level, json_format, is_audit));
    }

    tracing_subscriber::registry().with(layers).try_init()?;
    Ok(())
}

/// Console-only logger
pub fn init_logger(level: &str) -> anyhow::Result<()> {
    init_logger_with_file(level, false, None)
}

/// Delete `app-YYYY-MM-DD.log` files older than the retention window.
/// Returns the number of deleted files.
pub fn cleanup_old_logs(log_dir: &Path) -> anyhow::Result<usize> {
    let cutoff = chrono::Local::now().date_naive() - chrono::Duration::days(APP_LOG_RETENTION_DAYS);
    let app_dir = log_dir.join("app");
    if !app_dir.exists() {
        return Ok(0);
    }

    let mut deleted = 0;
    for entry in fs::read_dir(&app_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(date) = name
            .strip_prefix("app.")
            .or_else(|| name.strip_prefix("app-"))
            .map(|d| d.trim_end_matches(".log"))
            .and_then(|d| chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        else {
            continue;
        };
        if date < cutoff {
            fs::remove_file(&path)?;
            deleted += 1;
            tracing::info!(file = %name, "Deleted old log file");
        }
    }
    Ok(deleted)
}

/// Run [`cleanup_old_logs`] once a day until shutdown
pub async fn periodic_cleanup(log_dir: PathBuf, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(Duration::from_secs(24 * 60 * 60));
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = cleanup_old_logs(&log_dir) {
                    tracing::warn!(error = %e, "Log cleanup failed");
                }
            }
        }
    }
}

/// Inventory audit record, written to the audit log file
///
/// ```ignore
/// audit_log!("consume", "inventory", order_id = 7, quantity = %qty, "Ingredient consumed");
/// ```
#[macro_export]
macro_rules! audit_log {
    ($action:expr, $resource:expr, $($fields:tt)*) => {
        tracing::info!(
            target: $crate::utils::logger::AUDIT_TARGET,
            action = $action,
            resource = $resource,
            $($fields)*
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_removes_only_expired_app_logs() {
        let dir = tempfile::tempdir().unwrap();
        let app_dir = dir.path().join("app");
        fs::create_dir_all(&app_dir).unwrap();

        let old = chrono::Local::now().date_naive() - chrono::Duration::days(30);
        let today = chrono::Local::now().date_naive();
        let old_file = app_dir.join(format!("app.{}", old.format("%Y-%m-%d")));
        let new_file = app_dir.join(format!("app.{}", today.format("%Y-%m-%d")));
        let other = app_dir.join("notes.txt");
        for path in [&old_file, &new_file, &other] {
            fs::write(path, b"x").unwrap();
        }

        assert_eq!(cleanup_old_logs(dir.path()).unwrap(), 1);
        assert!(!old_file.exists());
        assert!(new_file.exists());
        assert!(other.exists());
    }

    #[test]
    fn test_cleanup_without_app_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(cleanup_old_logs(dir.path()).unwrap(), 0);
    }
}
