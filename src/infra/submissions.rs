//! Submission record stores.
//!
//! The file store keeps one pretty-printed JSON document per submission,
//! named `{user}_{test}_{unix_seconds}.json`. Resubmissions add files; nothing
//! is overwritten except a second submission within the same second.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::{
    application::repos::{RepoError, SubmissionsRepo},
    domain::quiz::{Submission, TestId, validate_user_id},
};

const RECORD_EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct FsSubmissionStore {
    directory: PathBuf,
}

impl FsSubmissionStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn record_path(&self, submission: &Submission) -> PathBuf {
        self.directory.join(format!(
            "{}_{}_{}.{RECORD_EXTENSION}",
            submission.user_id,
            submission.test_id,
            submission.date.unix_timestamp()
        ))
    }
}

/// Whether `file_name` is `{prefix}{digits}.json`.
fn matches_record_name(file_name: &str, prefix: &str) -> bool {
    file_name
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(".json"))
        .is_some_and(|stamp| {
            let digits = stamp.strip_prefix('-').unwrap_or(stamp);
            !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit())
        })
}

#[async_trait]
impl SubmissionsRepo for FsSubmissionStore {
    async fn save_submission(&self, submission: &Submission) -> Result<(), RepoError> {
        validate_user_id(&submission.user_id).map_err(|err| RepoError::InvalidInput {
            message: err.to_string(),
        })?;

        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(RepoError::from_persistence)?;

        let path = self.record_path(submission);
        let staging = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(submission).map_err(RepoError::from_persistence)?;

        tokio::fs::write(&staging, &body)
            .await
            .map_err(RepoError::from_persistence)?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(RepoError::from_persistence)?;

        debug!(
            target = "infra::submissions::FsSubmissionStore",
            path = %path.display(),
            "submission stored"
        );
        Ok(())
    }

    async fn list_submissions(
        &self,
        user_id: &str,
        test_id: TestId,
    ) -> Result<Vec<Submission>, RepoError> {
        let mut entries = match tokio::fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(RepoError::from_persistence(err)),
        };

        let prefix = format!("{user_id}_{test_id}_");
        let mut submissions = Vec::new();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(RepoError::from_persistence)?
        {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if !matches_record_name(file_name, &prefix) {
                continue;
            }

            let path = entry.path();
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(
                        target = "infra::submissions::FsSubmissionStore",
                        path = %path.display(),
                        error = %err,
                        "skipping unreadable submission record"
                    );
                    continue;
                }
            };
            match serde_json::from_slice::<Submission>(&bytes) {
                Ok(submission) if submission.belongs_to(user_id, test_id) => {
                    submissions.push(submission)
                }
                Ok(_) => {}
                Err(err) => warn!(
                    target = "infra::submissions::FsSubmissionStore",
                    error = %RepoError::corrupt(path.display().to_string(), err),
                    "skipping corrupt submission record"
                ),
            }
        }

        Ok(submissions)
    }
}

/// Process-local store, used when results need not survive restarts.
#[derive(Debug, Default)]
pub struct MemorySubmissionStore {
    records: DashMap<String, Vec<Submission>>,
}

impl MemorySubmissionStore {
    fn key(user_id: &str, test_id: TestId) -> String {
        format!("{user_id}_{test_id}")
    }
}

#[async_trait]
impl SubmissionsRepo for MemorySubmissionStore {
    async fn save_submission(&self, submission: &Submission) -> Result<(), RepoError> {
        self.records
            .entry(Self::key(&submission.user_id, submission.test_id))
            .or_default()
            .push(submission.clone());
        Ok(())
    }

    async fn list_submissions(
        &self,
        user_id: &str,
        test_id: TestId,
    ) -> Result<Vec<Submission>, RepoError> {
        Ok(self
            .records
            .get(&Self::key(user_id, test_id))
            .map(|records| records.value().clone())
            .unwrap_or_default())
    }
}
