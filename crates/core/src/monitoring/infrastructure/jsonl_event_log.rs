use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::monitoring::domain::job_event_log::{JobEvent, JobEventLog};
use crate::monitoring::domain::job_id::JobId;
use crate::shared::timecode::format_timestamp;

/// Appends one JSON object per event to a file.
///
/// The file is opened lazily on first write and shared by all jobs; lines
/// from concurrent jobs never interleave.
pub struct JsonlEventLog {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl JsonlEventLog {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        let mut guard = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_none() {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            *guard = Some(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?,
            );
        }
        match guard.as_mut() {
            Some(file) => writeln!(file, "{line}"),
            None => Ok(()),
        }
    }
}

impl JobEventLog for JsonlEventLog {
    fn record(&self, job_id: JobId, event: JobEvent<'_>) {
        let line = event_line(job_id, event).to_string();
        if let Err(e) = self.append(&line) {
            log::warn!("Failed to write event log {}: {e}", self.path.display());
        }
    }
}

fn event_line(job_id: JobId, event: JobEvent<'_>) -> Value {
    let logged_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    match event {
        JobEvent::StateChanged { state, error } => json!({
            "job_id": job_id,
            "event": "state_changed",
            "logged_at": logged_at,
            "state": state,
            "error": error,
        }),
        JobEvent::Matched(result) => json!({
            "job_id": job_id,
            "event": "match",
            "logged_at": logged_at,
            "sequence_index": result.sequence_index,
            "timestamp": result.timestamp,
            "formatted_time": format_timestamp(result.timestamp),
            "match_count": result.match_count,
            "frame_index": result.frame_index,
            "best_distance": result.best_distance,
            "screenshot_path": result.screenshot_path,
        }),
    }
}
