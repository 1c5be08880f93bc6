//! Detects ticket content changes that make a stored embedding stale.
//!
//! Only the summary and description feed the fingerprint. Label, assignee
//! or timestamp edits never trigger regeneration.

use std::collections::HashMap;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::ticket::Ticket;

type Fingerprint = [u8; 32];

/// Remembers the last observed content of each ticket.
#[derive(Debug, Default)]
pub struct ContentChangeDetector {
    fingerprints: HashMap<String, Fingerprint>,
}

impl ContentChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current content of `tickets` and return the ids whose
    /// summary or description differ from the previous observation.
    ///
    /// A ticket seen for the first time is recorded but not reported.
    pub fn observe(&mut self, tickets: &[Ticket]) -> Vec<String> {
        let mut changed = Vec::new();

        for ticket in tickets {
            let fingerprint = fingerprint(ticket);
            match self.fingerprints.insert(ticket.id.clone(), fingerprint) {
                Some(previous) if previous != fingerprint => {
                    debug!(ticket_id = %ticket.id, "Ticket content changed");
                    changed.push(ticket.id.clone());
                }
                _ => {}
            }
        }

        changed
    }

    /// Whether `id` has been observed.
    pub fn is_tracked(&self, id: &str) -> bool {
        self.fingerprints.contains_key(id)
    }

    /// Stop tracking `id`.
    pub fn forget(&mut self, id: &str) {
        self.fingerprints.remove(id);
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }
}

fn fingerprint(ticket: &Ticket) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(ticket.summary.as_bytes());
    // Separator so that moving text between the fields still changes the hash.
    hasher.update([0u8]);
    if let Some(description) = &ticket.description {
        hasher.update([1u8]);
        hasher.update(description.as_bytes());
    }
    hasher.finalize().into()
}
