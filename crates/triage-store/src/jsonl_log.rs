//! Size-capped JSON-lines files behind the feedback and command audit logs.
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_MAX_BACKUPS: usize = 4;

/// When a log rolls over into `<file>.1`, `<file>.2`, ... `<file>.<max_backups>`.
///
/// `max_bytes == 0` disables rollover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRotation {
    pub max_bytes: u64,
    pub max_backups: usize,
}

impl Default for LogRotation {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            max_backups: DEFAULT_MAX_BACKUPS,
        }
    }
}

impl LogRotation {
    /// Reads `TRIAGE_LOG_MAX_BYTES` and `TRIAGE_LOG_MAX_BACKUPS`, keeping defaults for unset or invalid values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_bytes: env_number("TRIAGE_LOG_MAX_BYTES").unwrap_or(defaults.max_bytes),
            max_backups: env_number("TRIAGE_LOG_MAX_BACKUPS").unwrap_or(defaults.max_backups),
        }
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}

#[derive(Debug, Clone)]
pub(crate) struct JsonlFile {
    path: PathBuf,
    rotation: LogRotation,
}

impl JsonlFile {
    pub(crate) fn new(path: PathBuf, rotation: LogRotation) -> Self {
        Self { path, rotation }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn append<T: Serialize>(&self, record: &T) -> Result<()> {
        let mut line = serde_json::to_string(record).context("failed to encode log record")?;
        line.push('\n');
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let current = fs::metadata(&self.path).map(|meta| meta.len()).unwrap_or(0);
        let incoming = u64::try_from(line.len()).unwrap_or(u64::MAX);
        if self.rotation.max_bytes > 0
            && current > 0
            && current.saturating_add(incoming) > self.rotation.max_bytes
        {
            self.roll_over()?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("failed to append {}", self.path.display()))
    }

    pub(crate) fn read_all<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        raw.lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(index, line)| {
                serde_json::from_str(line).with_context(|| {
                    format!("failed to parse line {} of {}", index + 1, self.path.display())
                })
            })
            .collect()
    }

    fn backup(&self, index: usize) -> PathBuf {
        let mut raw = self.path.as_os_str().to_owned();
        raw.push(format!(".{index}"));
        PathBuf::from(raw)
    }

    /// Shifts `<file>.N` to `<file>.N+1` (the oldest is overwritten) and moves the live file to `.1`.
    fn roll_over(&self) -> Result<()> {
        if self.rotation.max_backups == 0 {
            return fs::remove_file(&self.path)
                .with_context(|| format!("failed to truncate {}", self.path.display()));
        }
        for index in (1..self.rotation.max_backups).rev() {
            let older = self.backup(index);
            if older.exists() {
                fs::rename(&older, self.backup(index + 1))
                    .with_context(|| format!("failed to shift {}", older.display()))?;
            }
        }
        fs::rename(&self.path, self.backup(1))
            .with_context(|| format!("failed to roll over {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    #[test]
    fn unit_full_log_rolls_into_first_backup() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log = JsonlFile::new(
            temp.path().join("command-audit.jsonl"),
            LogRotation {
                max_bytes: 24,
                max_backups: 3,
            },
        );
        log.append(&json!({"seq": 1, "cmd": "uptime"})).expect("first");
        log.append(&json!({"seq": 2, "cmd": "df -h"})).expect("second");

        let rolled: Vec<Value> = JsonlFile::new(log.backup(1), LogRotation::default())
            .read_all()
            .expect("backup");
        assert_eq!(rolled, vec![json!({"seq": 1, "cmd": "uptime"})]);
        let live: Vec<Value> = log.read_all().expect("live");
        assert_eq!(live[0]["seq"], 2);
    }

    #[test]
    fn unit_backups_beyond_limit_are_overwritten() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log = JsonlFile::new(
            temp.path().join("feedback.jsonl"),
            LogRotation {
                max_bytes: 10,
                max_backups: 1,
            },
        );
        for seq in 1..=5 {
            log.append(&json!({"seq": seq})).expect("append");
        }
        assert!(log.backup(1).exists());
        assert!(!log.backup(2).exists());
        let live: Vec<Value> = log.read_all().expect("live");
        assert_eq!(live, vec![json!({"seq": 5})]);
    }
}
