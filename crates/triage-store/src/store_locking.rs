//! Per-ticket leases and the writer marker guarding the tickets file.
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard};
use std::time::{Duration, SystemTime};

use anyhow::{bail, Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;

pub(crate) const WRITER_LOCK_WAIT: Duration = Duration::from_secs(5);
pub(crate) const WRITER_LOCK_STALE_AFTER: Duration = Duration::from_secs(30);
const WRITER_LOCK_POLL: Duration = Duration::from_millis(25);

type LockTable = Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>;

fn table(locks: &LockTable) -> StdMutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
    match locks.lock() {
        Ok(table) => table,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// One async mutex per ticket id with a holder or waiter.
///
/// An entry lives only while some guard or pending `acquire` references it.
#[derive(Default)]
pub(crate) struct TicketLocks {
    locks: LockTable,
}

/// Exclusive hold on one ticket id. Releasing the last reference drops the entry.
pub(crate) struct TicketGuard {
    ticket_id: String,
    held: Option<OwnedMutexGuard<()>>,
    locks: LockTable,
}

impl TicketLocks {
    pub(crate) async fn acquire(&self, ticket_id: &str) -> TicketGuard {
        let lock = {
            let mut locks = table(&self.locks);
            // Entries left by cancelled waiters.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(ticket_id.to_string()).or_default())
        };
        let held = lock.lock_owned().await;
        TicketGuard {
            ticket_id: ticket_id.to_string(),
            held: Some(held),
            locks: Arc::clone(&self.locks),
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        table(&self.locks).len()
    }
}

impl Drop for TicketGuard {
    fn drop(&mut self) {
        drop(self.held.take());
        let mut locks = table(&self.locks);
        let idle = locks
            .get(&self.ticket_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            locks.remove(&self.ticket_id);
        }
    }
}

pub(crate) fn writer_lock_path(tickets_path: &Path) -> PathBuf {
    let mut raw = tickets_path.as_os_str().to_owned();
    raw.push(".lock");
    PathBuf::from(raw)
}

/// Marker file held while this process rewrites the tickets file, so a second
/// process (the CLI next to a running server) never interleaves a write.
pub(crate) struct WriterLock {
    path: PathBuf,
}

impl WriterLock {
    /// Waits for the marker without blocking the runtime, reclaiming it once stale.
    pub(crate) async fn acquire(
        tickets_path: &Path,
        wait: Duration,
        stale_after: Duration,
    ) -> Result<Self> {
        let path = writer_lock_path(tickets_path);
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let deadline = Instant::now() + wait;
        loop {
            let created = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            match created {
                Ok(mut marker) => {
                    let owner = format!("{}\n", std::process::id());
                    if let Err(error) = marker.write_all(owner.as_bytes()).await {
                        tracing::debug!(path = %path.display(), error = %error, "writer lock owner not recorded");
                    }
                    return Ok(Self { path });
                }
                Err(error) if error.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(&path, stale_after).await
                        && tokio::fs::remove_file(&path).await.is_ok()
                    {
                        tracing::warn!(path = %path.display(), "reclaimed stale ticket writer lock");
                        continue;
                    }
                    if Instant::now() >= deadline {
                        bail!("timed out waiting for ticket writer lock {}", path.display());
                    }
                    tokio::time::sleep(WRITER_LOCK_POLL).await;
                }
                Err(error) => {
                    return Err(error).with_context(|| {
                        format!("failed to create ticket writer lock {}", path.display())
                    });
                }
            }
        }
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

async fn is_stale(path: &Path, stale_after: Duration) -> bool {
    if stale_after.is_zero() {
        return false;
    }
    let Ok(modified) = tokio::fs::metadata(path)
        .await
        .and_then(|metadata| metadata.modified())
    else {
        return false;
    };
    SystemTime::now()
        .duration_since(modified)
        .is_ok_and(|age| age >= stale_after)
}
