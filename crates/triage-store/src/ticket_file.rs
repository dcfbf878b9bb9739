//! On-disk form of the ticket store: one JSON array in creation order.
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use triage_core::Ticket;

pub(crate) fn read_tickets(path: &Path) -> Result<Vec<Ticket>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str::<Vec<Ticket>>(&raw)
        .with_context(|| format!("failed to parse ticket file {}", path.display()))
}

pub(crate) fn encode_tickets(tickets: &[&Ticket]) -> Result<String> {
    let mut encoded = serde_json::to_string_pretty(tickets).context("failed to encode tickets")?;
    encoded.push('\n');
    Ok(encoded)
}

/// Replaces the tickets file off the async runtime.
pub(crate) async fn replace_tickets(path: &Path, encoded: String) -> Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || replace_via_staging(&path, &encoded))
        .await
        .context("ticket file writer task failed")?
}

/// Writes a synced sibling file and renames it over `path`, so readers see
/// either the old array or the new one.
fn replace_via_staging(path: &Path, encoded: &str) -> Result<()> {
    let staging = staging_path(path);
    let written = File::create(&staging)
        .and_then(|mut file| {
            file.write_all(encoded.as_bytes())?;
            file.sync_all()
        })
        .with_context(|| format!("failed to write {}", staging.display()));
    let renamed = written.and_then(|()| {
        fs::rename(&staging, path)
            .with_context(|| format!("failed to replace {}", path.display()))
    });
    if renamed.is_err() {
        let _ = fs::remove_file(&staging);
    }
    renamed
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| crate::TICKETS_FILE_NAME.to_string());
    path.with_file_name(format!(".{name}.{}.staging", uuid::Uuid::new_v4().simple()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unit_replace_leaves_no_staging_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("tickets.json");
        let first = Ticket::new("first");
        replace_tickets(&path, encode_tickets(&[&first]).expect("encode"))
            .await
            .expect("write");
        let second = Ticket::new("second");
        replace_tickets(&path, encode_tickets(&[&first, &second]).expect("encode"))
            .await
            .expect("rewrite");

        let tickets = read_tickets(&path).expect("read");
        assert_eq!(tickets.len(), 2);
        assert_eq!(tickets[1].issue, "second");
        let entries = fs::read_dir(temp.path()).expect("dir").count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn regression_failed_replace_keeps_previous_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("tickets");
        fs::create_dir(&path).expect("directory in the way");
        let ticket = Ticket::new("issue");
        let error = replace_tickets(&path, encode_tickets(&[&ticket]).expect("encode"))
            .await
            .expect_err("cannot replace a directory");
        assert!(format!("{error:#}").contains("failed to replace"));
        assert!(path.is_dir());
        assert_eq!(fs::read_dir(temp.path()).expect("dir").count(), 1);
    }
}
