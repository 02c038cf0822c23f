//! Thread index: membership, first/date invariant, and traversal order.
//!
//! Each thread tracks its `first` message (the member with the minimum
//! `(date, id)`) and a representative date equal to that message's date.
//! Attaching compares the newcomer against the current first in O(1); only
//! detaching the first message requires a scan of the remaining members.
//! The asymmetry is intentional: deletions are rare relative to inserts.
//!
//! Attach and detach on the same thread are serialized through a per-thread
//! mutex registry, so the `date < thread.date` comparison cannot race.
//! Operations on distinct threads proceed fully in parallel.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::db::Database;
use crate::error::{ArchiveError, Result};
use crate::models::Message;
use crate::reference::{parse_message_ids, parse_references};

/// Maintains per-thread membership state and derived ordering
pub struct ThreadIndex {
    db: Arc<Database>,
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ThreadIndex {
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn thread_lock(&self, thread_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(thread_id).or_default().clone()
    }

    /// Resolve the reply parent for a new message.
    ///
    /// Takes the first identifier from the In-Reply-To parse, then falls
    /// back to the References identifiers in order; each candidate is looked
    /// up preferring a match within the given list.
    pub fn resolve_parent(
        &self,
        in_reply_to_value: &str,
        references: &str,
        list_id: i64,
    ) -> Result<Option<Message>> {
        if let Some(msgid) = parse_message_ids(in_reply_to_value).first() {
            if let Some(parent) = self.db.get_message_by_msgid_prefer_list(msgid, list_id)? {
                return Ok(Some(parent));
            }
        }
        for msgid in parse_references(references) {
            if let Some(parent) = self.db.get_message_by_msgid_prefer_list(&msgid, list_id)? {
                return Ok(Some(parent));
            }
        }
        Ok(None)
    }

    /// Register a newly inserted message with its thread.
    ///
    /// An empty thread establishes the message as `first`; an established
    /// thread only changes `first` when the newcomer predates it. Traversal
    /// positions are then recomputed for the thread.
    pub fn attach(&self, message: &Message) -> Result<()> {
        let lock = self.thread_lock(message.thread_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let thread = self
            .db
            .get_thread(message.thread_id)?
            .ok_or_else(|| ArchiveError::Other(format!("thread {} not found", message.thread_id)))?;

        match thread.first_id {
            None => {
                self.db.set_thread_first(thread.id, message.id, message.date)?;
                debug!(thread_id = thread.id, message_id = message.id, "thread established");
            }
            Some(_) if message.date < thread.date => {
                self.db.set_thread_first(thread.id, message.id, message.date)?;
                debug!(thread_id = thread.id, message_id = message.id, "thread first updated");
            }
            Some(_) => {}
        }

        let members = self.db.thread_members(thread.id)?;
        self.renumber(&members)
    }

    /// Remove a message from its thread's derived state.
    ///
    /// Call before deleting the record. Detaching a non-first member leaves
    /// the invariant untouched; detaching the first (or finding the stored
    /// first stale) selects the minimum-`(date, id)` survivor. Detaching
    /// the sole member moves the thread to the empty state.
    pub fn detach(&self, message: &Message) -> Result<()> {
        let lock = self.thread_lock(message.thread_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let thread = self
            .db
            .get_thread(message.thread_id)?
            .ok_or_else(|| ArchiveError::Other(format!("thread {} not found", message.thread_id)))?;

        let remaining: Vec<Message> = self
            .db
            .thread_members(thread.id)?
            .into_iter()
            .filter(|m| m.id != message.id)
            .collect();

        if remaining.is_empty() {
            self.db.clear_thread_first(thread.id)?;
            debug!(thread_id = thread.id, "thread emptied");
            return Ok(());
        }

        // Re-scan whenever the stored first is the detached message or is
        // otherwise stale; a detected violation must never survive a detach
        let first_valid = thread
            .first_id
            .is_some_and(|f| f != message.id && remaining.iter().any(|m| m.id == f));
        if !first_valid {
            let new_first = &remaining[0];
            self.db
                .set_thread_first(thread.id, new_first.id, new_first.date)?;
            debug!(
                thread_id = thread.id,
                message_id = new_first.id,
                "thread first reassigned"
            );
        }

        self.renumber(&remaining)
    }

    /// Recompute `thread_depth` and `thread_order` for a thread's members.
    ///
    /// Members arrive sorted by `(date, id)`; roots and per-parent child
    /// lists inherit that order, and a preorder walk assigns positions so a
    /// reply lands after its parent and before later-dated sibling subtrees.
    fn renumber(&self, members: &[Message]) -> Result<()> {
        let in_thread: HashSet<i64> = members.iter().map(|m| m.id).collect();

        let mut children: HashMap<i64, Vec<&Message>> = HashMap::new();
        let mut roots: Vec<&Message> = Vec::new();
        for member in members {
            match member
                .in_reply_to_id
                .filter(|p| *p != member.id && in_thread.contains(p))
            {
                Some(parent_id) => children.entry(parent_id).or_default().push(member),
                None => roots.push(member),
            }
        }

        let mut order: i64 = 0;
        let mut visited: HashSet<i64> = HashSet::new();
        let mut stack: Vec<(&Message, i64)> = roots.into_iter().rev().map(|m| (m, 0)).collect();

        while let Some((member, depth)) = stack.pop() {
            // Malformed reply graphs must not loop
            if !visited.insert(member.id) {
                continue;
            }
            if member.thread_order != order || member.thread_depth != depth {
                self.db.update_thread_position(member.id, depth, order)?;
            }
            order += 1;
            if let Some(kids) = children.get(&member.id) {
                for &kid in kids.iter().rev() {
                    stack.push((kid, depth + 1));
                }
            }
        }

        Ok(())
    }
}
