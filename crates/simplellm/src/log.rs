//! Logging for simplellm.
use anyhow::Context;
use simplellm_core::get_data_dir;
use std::io::LineWriter;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::fmt::time::OffsetTime;

const LOG_FILE: &str = "simplellm.log";
const MAX_LOG_BYTES: u64 = 100 * 1024;

/// Initializes file logging under the data directory.
///
/// Logs go to `<data_dir>/simplellm.log`. A file larger than 100KB is moved to
/// `simplellm.log.old` first, replacing any previous backup.
pub fn setup_logging() -> anyhow::Result<()> {
    let data_dir = get_data_dir().context("Failed to get data directory")?;
    let log_path = data_dir.join(LOG_FILE);
    rotate_log(&log_path, &data_dir.join(format!("{LOG_FILE}.old")))?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    // Flush after every line
    let writer = Mutex::new(LineWriter::new(log_file));

    tracing_subscriber::fmt()
        .with_env_filter("simplellm=debug,simplellm_core=debug,rustyline=info")
        .with_writer(writer)
        .with_ansi(false)
        .with_timer(OffsetTime::local_rfc_3339()?)
        .init();
    Ok(())
}

fn rotate_log(log_path: &Path, backup_path: &Path) -> std::io::Result<()> {
    if !log_path.exists() {
        return Ok(());
    }
    if std::fs::metadata(log_path)?.len() > MAX_LOG_BYTES {
        if backup_path.exists() {
            std::fs::remove_file(backup_path)?;
        }
        std::fs::rename(log_path, backup_path)?;
    }
    Ok(())
}
