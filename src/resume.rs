//! Best-effort "resume" bookkeeping.
//!
//! Remembers the last active job and the page the user was looking at, so a
//! later `casefolio resume` can pick up where the previous run left off. The
//! file is convenience state, not a source of truth: read and write failures
//! are logged and otherwise ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::JobId;

const RESUME_FILE: &str = "resume.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeState {
    pub job_id: JobId,
    pub current_page: u32,
    pub timestamp: DateTime<Utc>,
}

impl ResumeState {
    pub fn new(job_id: JobId, current_page: u32) -> Self {
        Self {
            job_id,
            current_page: current_page.max(1),
            timestamp: Utc::now(),
        }
    }
}

/// Reads and writes [`ResumeState`] under a state directory.
#[derive(Debug, Clone)]
pub struct ResumeFile {
    path: PathBuf,
}

impl ResumeFile {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(RESUME_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Option<ResumeState> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "could not read resume state");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring corrupt resume state");
                None
            }
        }
    }

    pub fn save(&self, state: &ResumeState) {
        if let Err(e) = self.try_save(state) {
            tracing::warn!(path = %self.path.display(), error = %e, "could not save resume state");
        }
    }

    fn try_save(&self, state: &ResumeState) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(state)?)?;
        Ok(())
    }

    pub fn clear(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "could not clear resume state")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let file = ResumeFile::in_dir(&dir.path().join("state"));
        let state = ResumeState::new("job-1".into(), 3);
        file.save(&state);
        assert_eq!(file.load(), Some(state));
    }

    #[test]
    fn missing_and_corrupt_files_load_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let file = ResumeFile::in_dir(dir.path());
        assert_eq!(file.load(), None);
        std::fs::write(file.path(), "{not json").unwrap();
        assert_eq!(file.load(), None);
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let file = ResumeFile::in_dir(dir.path());
        file.save(&ResumeState::new("j".into(), 0));
        assert_eq!(file.load().unwrap().current_page, 1);
        file.clear();
        file.clear();
        assert_eq!(file.load(), None);
    }
}
