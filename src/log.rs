//! Deployment Log: an optional, append-only JSON-lines record of completed deployments.
//!
//! spec.md §4.J: "No reads are performed by the core; the reader is external." This module only
//! ever appends. Locking follows the advisory-exclusive-lock-per-append policy from spec.md §5.

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, FogError};

/// The kind of operation a deployment record describes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentType {
    Create,
    Update,
    Delete,
}

/// A single completed-deployment record, written as one line of JSON.
///
/// The core only ever serializes this (spec.md §4.J); `Deserialize` exists for `fog history`,
/// the one reader outside the core.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DeploymentRecord {
    pub timestamp: DateTime<Utc>,
    pub stack_name: String,
    pub account: String,
    pub region: String,
    #[serde(rename = "type")]
    pub deployment_type: DeploymentType,
    pub duration_seconds: f64,
    pub success: bool,
    pub changeset_id: Option<String>,
}

/// An append-only, advisory-locked JSON-lines writer.
pub struct DeploymentLog {
    path: PathBuf,
}

impl DeploymentLog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append `record` as a single JSON line, taking an advisory exclusive lock on the file for
    /// the duration of the write so concurrent `fog` invocations never interleave partial lines.
    pub async fn append(&self, record: DeploymentRecord) -> Result<(), FogError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || append_blocking(&path, &record))
            .await
            .map_err(|error| FogError::new(ErrorCode::Internal, "deployment log append task panicked").with_cause(error))?
    }
}

fn append_blocking(path: &Path, record: &DeploymentRecord) -> Result<(), FogError> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|error| {
            FogError::new(ErrorCode::FilePermission, format!("couldn't open deployment log `{}`", path.display()))
                .with_cause(error)
        })?;

    file.lock_exclusive()
        .map_err(|error| FogError::new(ErrorCode::FileInvalid, "couldn't lock deployment log").with_cause(error))?;

    let result = (|| -> Result<(), FogError> {
        let mut line = serde_json::to_string(record)
            .map_err(|error| FogError::new(ErrorCode::Internal, "couldn't serialize deployment record").with_cause(error))?;
        line.push('\n');
        file.write_all(line.as_bytes())
            .map_err(|error| FogError::new(ErrorCode::FilePermission, "couldn't append to deployment log").with_cause(error))
    })();

    let _ = fs2::FileExt::unlock(&file);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> DeploymentRecord {
        DeploymentRecord {
            timestamp: DateTime::from_timestamp(0, 0).unwrap(),
            stack_name: "my-stack".to_string(),
            account: "123456789012".to_string(),
            region: "eu-west-1".to_string(),
            deployment_type: DeploymentType::Update,
            duration_seconds: 42.5,
            success: true,
            changeset_id: Some("arn:aws:cloudformation:...".to_string()),
        }
    }

    #[tokio::test]
    async fn append_writes_one_json_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deployments.jsonl");
        let log = DeploymentLog::new(&path);

        log.append(record()).await.unwrap();
        log.append(record()).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["stack_name"], "my-stack");
        assert_eq!(parsed["type"], "UPDATE");
    }
}
