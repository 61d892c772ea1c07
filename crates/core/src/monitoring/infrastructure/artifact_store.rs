use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use thiserror::Error;

use crate::monitoring::domain::job_id::JobId;
use crate::shared::constants::{
    EVENT_LOG_FILE, LOGS_DIR, SCREENSHOTS_DIR, TEMP_DIR, TEMP_RETENTION_DAYS, UPLOADS_DIR,
};
use crate::shared::frame::Frame;
use crate::video::domain::image_writer::ImageWriter;

/// Longest side of live preview images.
const PREVIEW_MAX_SIDE: u32 = 640;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write image {path}: {reason}")]
    WriteImage { path: PathBuf, reason: String },
}

/// Owns the on-disk output layout: screenshots, previews, the event log
/// and uploaded files, all under one output directory.
pub struct ArtifactStore {
    root: PathBuf,
    writer: Box<dyn ImageWriter>,
}

impl ArtifactStore {
    pub fn new(root: PathBuf, writer: Box<dyn ImageWriter>) -> Self {
        Self { root, writer }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn screenshots_dir(&self) -> PathBuf {
        self.root.join(SCREENSHOTS_DIR)
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.join(TEMP_DIR)
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join(UPLOADS_DIR)
    }

    pub fn event_log_path(&self) -> PathBuf {
        self.root.join(LOGS_DIR).join(EVENT_LOG_FILE)
    }

    /// Creates every output sub-directory.
    pub fn prepare(&self) -> Result<(), ArtifactError> {
        for dir in [
            self.screenshots_dir(),
            self.temp_dir(),
            self.uploads_dir(),
            self.root.join(LOGS_DIR),
        ] {
            fs::create_dir_all(&dir).map_err(|source| ArtifactError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Deterministic screenshot location for a job's `sequence_index`.
    pub fn screenshot_path(&self, job_id: JobId, sequence_index: u64) -> PathBuf {
        self.screenshots_dir()
            .join(format!("{job_id}_{sequence_index:05}.jpg"))
    }

    pub fn preview_path(&self, job_id: JobId) -> PathBuf {
        self.temp_dir().join(format!("preview_{job_id}.jpg"))
    }

    pub fn save_screenshot(
        &self,
        job_id: JobId,
        sequence_index: u64,
        frame: &Frame,
    ) -> Result<PathBuf, ArtifactError> {
        let path = self.screenshot_path(job_id, sequence_index);
        self.write_image(path, frame, None)
    }

    /// Overwrites the job's live preview image.
    pub fn save_preview(&self, job_id: JobId, frame: &Frame) -> Result<PathBuf, ArtifactError> {
        self.write_image(self.preview_path(job_id), frame, Some(PREVIEW_MAX_SIDE))
    }

    fn write_image(
        &self,
        path: PathBuf,
        frame: &Frame,
        max_side: Option<u32>,
    ) -> Result<PathBuf, ArtifactError> {
        match self.writer.write(&path, frame, max_side) {
            Ok(()) => Ok(path),
            Err(e) => Err(ArtifactError::WriteImage {
                path,
                reason: e.to_string(),
            }),
        }
    }

    /// Deletes a job's screenshots and preview. Returns the files removed.
    pub fn remove_job_artifacts(&self, job_id: JobId) -> usize {
        let prefix = format!("{job_id}_");
        let mut removed = remove_matching(&self.screenshots_dir(), |name| {
            name.starts_with(&prefix)
        });
        let preview = self.preview_path(job_id);
        if preview.exists() && remove_file(&preview) {
            removed += 1;
        }
        removed
    }

    /// Deletes screenshots and uploads older than `retention_days`, and
    /// previews older than a day. `0` disables the sweep.
    pub fn sweep_expired_files(&self, retention_days: u32) -> usize {
        self.sweep_expired_files_at(retention_days, SystemTime::now())
    }

    fn sweep_expired_files_at(&self, retention_days: u32, now: SystemTime) -> usize {
        if retention_days == 0 {
            return 0;
        }
        let retention = days(retention_days);
        let removed = sweep_dir(&self.screenshots_dir(), retention, now)
            + sweep_dir(&self.uploads_dir(), retention, now)
            + sweep_dir(&self.temp_dir(), days(TEMP_RETENTION_DAYS), now);
        if removed > 0 {
            log::info!("Removed {removed} expired files from {}", self.root.display());
        }
        removed
    }
}

fn days(n: u32) -> Duration {
    Duration::from_secs(n as u64 * SECS_PER_DAY)
}

fn sweep_dir(dir: &Path, max_age: Duration, now: SystemTime) -> usize {
    remove_matching_with(dir, |_, meta| {
        meta.modified()
            .ok()
            .and_then(|mtime| now.duration_since(mtime).ok())
            .is_some_and(|age| age > max_age)
    })
}

fn remove_matching(dir: &Path, name_matches: impl Fn(&str) -> bool) -> usize {
    remove_matching_with(dir, |name, _| name_matches(name))
}

/// Removes regular files in `dir` for which `should_remove` holds.
fn remove_matching_with(dir: &Path, should_remove: impl Fn(&str, &fs::Metadata) -> bool) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .filter(|entry| {
            let Ok(meta) = entry.metadata() else {
                return false;
            };
            let name = entry.file_name();
            meta.is_file() && should_remove(&name.to_string_lossy(), &meta)
        })
        .map(|entry| remove_file(&entry.path()))
        .filter(|removed| *removed)
        .count()
}

fn remove_file(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Failed to remove {}: {e}", path.display());
            false
        }
    }
}
