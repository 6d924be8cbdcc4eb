use crate::payload::format_timestamp;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Append-only text log of inbound selections and delivery attempts.
///
/// Best-effort: write failures are reported through tracing and otherwise
/// ignored. The file is opened for every entry and each entry is a single
/// write made while holding the append lock.
#[derive(Clone, Debug)]
pub struct DiagnosticLog {
    path: Option<Arc<PathBuf>>,
    append_lock: Arc<Mutex<()>>,
}

impl DiagnosticLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path: path.map(Arc::new),
            append_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub async fn record<T: Serialize + ?Sized>(&self, message: &str, data: &T) {
        let Some(path) = self.path.clone() else {
            return;
        };

        let entry = format_entry(Utc::now(), message, data);
        let append_lock = self.append_lock.clone();

        let result =
            tokio::task::spawn_blocking(move || append(&path, &append_lock, entry.as_bytes()))
                .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "failed to write diagnostic log entry"),
            Err(e) => tracing::warn!(error = %e, "diagnostic log task failed"),
        }
    }
}

fn format_entry<T: Serialize + ?Sized>(now: DateTime<Utc>, message: &str, data: &T) -> String {
    let dump = serde_json::to_string_pretty(data)
        .unwrap_or_else(|e| format!("<could not serialize entry: {e}>"));

    format!(
        "{} - {message}\n{dump}\n{}\n",
        format_timestamp(now),
        "-".repeat(80)
    )
}

fn append(path: &Path, append_lock: &Mutex<()>, entry: &[u8]) -> std::io::Result<()> {
    let _guard = append_lock.lock().unwrap_or_else(PoisonError::into_inner);
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(entry)
}
