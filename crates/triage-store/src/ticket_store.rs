use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use tokio::sync::Mutex;
use triage_core::{Ticket, TriageError};

use crate::store_locking::{
    TicketGuard, TicketLocks, WriterLock, WRITER_LOCK_STALE_AFTER, WRITER_LOCK_WAIT,
};
use crate::ticket_file::{encode_tickets, read_tickets, replace_tickets};

#[derive(Debug, Default)]
struct StoreState {
    tickets: HashMap<String, Ticket>,
    order: Vec<String>,
}

impl StoreState {
    fn snapshot(&self) -> Vec<&Ticket> {
        self.order
            .iter()
            .filter_map(|id| self.tickets.get(id))
            .collect()
    }

    /// The snapshot as it will look once `ticket` is stored.
    fn snapshot_with<'a>(&'a self, ticket: &'a Ticket) -> Vec<&'a Ticket> {
        let mut tickets: Vec<&Ticket> = self
            .order
            .iter()
            .filter_map(|id| {
                if *id == ticket.id {
                    Some(ticket)
                } else {
                    self.tickets.get(id)
                }
            })
            .collect();
        if !self.tickets.contains_key(&ticket.id) {
            tickets.push(ticket);
        }
        tickets
    }

    fn put(&mut self, ticket: Ticket) {
        if !self.tickets.contains_key(&ticket.id) {
            self.order.push(ticket.id.clone());
        }
        self.tickets.insert(ticket.id.clone(), ticket);
    }
}

/// Exclusive hold on one ticket for a read-modify-write cycle.
///
/// While a lease is alive no other `update` or `lease` on the same id proceeds.
pub struct TicketLease {
    ticket: Ticket,
    _guard: TicketGuard,
}

impl TicketLease {
    pub fn ticket(&self) -> &Ticket {
        &self.ticket
    }

    pub fn ticket_mut(&mut self) -> &mut Ticket {
        &mut self.ticket
    }
}

/// JSON-array ticket log loaded at startup and rewritten atomically on every mutation.
///
/// Readers only contend for the in-memory map. A mutation becomes visible to
/// them after the file write succeeds; a failed write leaves both unchanged.
pub struct TicketStore {
    path: PathBuf,
    state: Mutex<StoreState>,
    writer: Mutex<()>,
    locks: TicketLocks,
    writer_lock_wait: Duration,
}

impl TicketStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut state = StoreState::default();
        for ticket in read_tickets(&path)? {
            if state.tickets.contains_key(&ticket.id) {
                bail!(
                    "ticket file {} contains duplicate id '{}'",
                    path.display(),
                    ticket.id
                );
            }
            state.put(ticket);
        }
        tracing::debug!(
            path = %path.display(),
            tickets = state.order.len(),
            "opened ticket store"
        );
        Ok(Self {
            path,
            state: Mutex::new(state),
            writer: Mutex::new(()),
            locks: TicketLocks::default(),
            writer_lock_wait: WRITER_LOCK_WAIT,
        })
    }

    /// How long a write waits for another process to release the tickets file.
    pub fn with_writer_lock_wait(mut self, wait: Duration) -> Self {
        self.writer_lock_wait = wait;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the file with `ticket` in place, then publishes it to readers.
    async fn store(&self, ticket: &Ticket, is_new: bool) -> Result<(), TriageError> {
        let _writer = self.writer.lock().await;
        let encoded = {
            let state = self.state.lock().await;
            let exists = state.tickets.contains_key(&ticket.id);
            if is_new && exists {
                return Err(anyhow!("ticket '{}' already exists", ticket.id).into());
            }
            if !is_new && !exists {
                return Err(TriageError::TicketNotFound(ticket.id.clone()));
            }
            encode_tickets(&state.snapshot_with(ticket))?
        };
        let _file_lock =
            WriterLock::acquire(&self.path, self.writer_lock_wait, WRITER_LOCK_STALE_AFTER)
                .await?;
        replace_tickets(&self.path, encoded).await?;
        self.state.lock().await.put(ticket.clone());
        Ok(())
    }

    pub async fn create(&self, ticket: Ticket) -> Result<Ticket, TriageError> {
        self.store(&ticket, true).await?;
        tracing::debug!(ticket_id = %ticket.id, "created ticket");
        Ok(ticket)
    }

    pub async fn get(&self, id: &str) -> Option<Ticket> {
        self.state.lock().await.tickets.get(id).cloned()
    }

    /// All tickets in creation order.
    pub async fn list(&self) -> Vec<Ticket> {
        self.state
            .lock()
            .await
            .snapshot()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Applies `mutate` under the ticket's lease and persists the result.
    ///
    /// Nothing is written when `mutate` fails.
    pub async fn update<F>(&self, id: &str, mutate: F) -> Result<Ticket, TriageError>
    where
        F: FnOnce(&mut Ticket) -> Result<(), TriageError>,
    {
        let mut lease = self.lease(id).await?;
        mutate(lease.ticket_mut())?;
        self.commit(&lease).await
    }

    /// Takes the ticket's lock and returns a working copy held until the lease drops.
    ///
    /// Unknown ids fail before any lock is taken.
    pub async fn lease(&self, id: &str) -> Result<TicketLease, TriageError> {
        let not_found = || TriageError::TicketNotFound(id.to_string());
        if !self.state.lock().await.tickets.contains_key(id) {
            return Err(not_found());
        }
        let guard = self.locks.acquire(id).await;
        let ticket = self.get(id).await.ok_or_else(not_found)?;
        Ok(TicketLease {
            ticket,
            _guard: guard,
        })
    }

    /// Persists the lease's working copy. The lease stays held.
    pub async fn commit(&self, lease: &TicketLease) -> Result<Ticket, TriageError> {
        self.store(&lease.ticket, false).await?;
        Ok(lease.ticket.clone())
    }
}
