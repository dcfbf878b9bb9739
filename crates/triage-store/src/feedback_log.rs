use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use triage_core::current_rfc3339;

use crate::jsonl_log::{JsonlFile, LogRotation};

pub const FEEDBACK_RATING_MIN: u8 = 1;
pub const FEEDBACK_RATING_MAX: u8 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedbackRecord {
    pub timestamp: String,
    pub user: String,
    pub query: String,
    pub rating: u8,
    #[serde(default)]
    pub comments: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
}

impl FeedbackRecord {
    pub fn new(
        user: impl Into<String>,
        query: impl Into<String>,
        rating: u8,
        comments: impl Into<String>,
        ticket_id: Option<String>,
    ) -> Self {
        Self {
            timestamp: current_rfc3339(),
            user: user.into(),
            query: query.into(),
            rating,
            comments: comments.into(),
            ticket_id,
        }
    }
}

/// Append-only JSONL log of operator feedback.
#[derive(Debug, Clone)]
pub struct FeedbackLog {
    file: JsonlFile,
}

impl FeedbackLog {
    pub fn new(path: impl Into<PathBuf>, rotation: LogRotation) -> Self {
        Self {
            file: JsonlFile::new(path.into(), rotation),
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn append(&self, record: &FeedbackRecord) -> Result<()> {
        if record.user.trim().is_empty() {
            bail!("feedback user cannot be empty");
        }
        if !(FEEDBACK_RATING_MIN..=FEEDBACK_RATING_MAX).contains(&record.rating) {
            bail!(
                "feedback rating {} is outside {}..={}",
                record.rating,
                FEEDBACK_RATING_MIN,
                FEEDBACK_RATING_MAX
            );
        }
        self.file.append(record)
    }

    pub fn read_all(&self) -> Result<Vec<FeedbackRecord>> {
        self.file.read_all()
    }
}
