use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tenantdesk_application::ActivityLog;
use tenantdesk_core::{AppError, AppResult};
use tenantdesk_domain::ActivityEntry;
use tracing::warn;

/// Append-only activity log writing one JSON object per line.
///
/// Lines are buffered and reach the file when the buffer fills or the log is
/// dropped. Write failures are reported through tracing and never reach the
/// caller.
pub struct JsonLinesActivityLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesActivityLog {
    /// Opens `path` for appending, creating it when missing.
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to open activity log '{}': {error}",
                    path.display()
                ))
            })?;

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    fn append(&self, entry: &ActivityEntry) -> Result<(), String> {
        let mut line = serde_json::to_string(entry).map_err(|error| error.to_string())?;
        line.push('\n');

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| "activity log lock poisoned".to_owned())?;
        writer
            .write_all(line.as_bytes())
            .map_err(|error| error.to_string())
    }
}

impl Drop for JsonLinesActivityLog {
    fn drop(&mut self) {
        let flushed = match self.writer.get_mut() {
            Ok(writer) => writer.flush().map_err(|error| error.to_string()),
            Err(_) => Err("activity log lock poisoned".to_owned()),
        };

        if let Err(error) = flushed {
            warn!(
                path = %self.path.display(),
                error = %error,
                "failed to flush activity log"
            );
        }
    }
}

impl ActivityLog for JsonLinesActivityLog {
    fn record(&self, entry: ActivityEntry) {
        if let Err(error) = self.append(&entry) {
            warn!(
                path = %self.path.display(),
                error = %error,
                "failed to append activity entry"
            );
        }
    }
}
