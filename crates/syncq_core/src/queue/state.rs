//! In-memory queue state rebuilt from the journal.

use crate::operation::{Operation, OperationId, OperationStatus, Priority};
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};

/// Sort key of a pending operation.
///
/// Field order is the dispatch order: priority descending, then oldest
/// first, then journal insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct PendingKey {
    priority: Reverse<Priority>,
    created_at: DateTime<Utc>,
    sequence: u64,
    id: OperationId,
}

impl PendingKey {
    pub(crate) fn of<T>(op: &Operation<T>) -> Self {
        Self {
            priority: Reverse(op.priority),
            created_at: op.created_at,
            sequence: op.sequence,
            id: op.id,
        }
    }

    pub(crate) fn id(&self) -> &OperationId {
        &self.id
    }
}

/// Operations by ID plus an ordered index of the pending ones.
#[derive(Debug)]
pub(crate) struct QueueState<T> {
    operations: HashMap<OperationId, Operation<T>>,
    pending: BTreeSet<PendingKey>,
    next_sequence: u64,
}

impl<T> QueueState<T> {
    pub(crate) fn new() -> Self {
        Self {
            operations: HashMap::new(),
            pending: BTreeSet::new(),
            next_sequence: 0,
        }
    }

    pub(crate) fn get(&self, id: &OperationId) -> Option<&Operation<T>> {
        self.operations.get(id)
    }

    pub(crate) fn operations(&self) -> impl Iterator<Item = &Operation<T>> {
        self.operations.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.operations.len()
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Pending operations in dispatch order.
    pub(crate) fn pending(&self) -> impl Iterator<Item = &Operation<T>> {
        self.pending
            .iter()
            .filter_map(|key| self.operations.get(key.id()))
    }

    pub(crate) fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Inserts or replaces an operation, keeping the pending index in step.
    pub(crate) fn upsert(&mut self, op: Operation<T>) {
        if let Some(old) = self.operations.remove(&op.id) {
            self.pending.remove(&PendingKey::of(&old));
        }
        if op.status == OperationStatus::Pending {
            self.pending.insert(PendingKey::of(&op));
        }
        self.next_sequence = self.next_sequence.max(op.sequence.saturating_add(1));
        self.operations.insert(op.id, op);
    }

    pub(crate) fn remove(&mut self, id: &OperationId) -> Option<Operation<T>> {
        let op = self.operations.remove(id)?;
        self.pending.remove(&PendingKey::of(&op));
        Some(op)
    }

    pub(crate) fn clear(&mut self) {
        self.operations.clear();
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{Method, NewOperation};
    use chrono::Duration;

    fn op(priority: Priority, created_at: DateTime<Utc>, sequence: u64) -> Operation<u32> {
        let new = NewOperation::new("t", Method::Post, "/", 0).with_priority(priority);
        Operation::from_new(new, sequence, created_at)
    }

    #[test]
    fn pending_order_is_priority_then_age_then_sequence() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::milliseconds(1);
        let mut state = QueueState::new();

        let low = op(Priority::Low, t0, 0);
        let normal_late = op(Priority::Normal, t1, 1);
        let normal_early = op(Priority::Normal, t0, 2);
        let normal_tie = op(Priority::Normal, t0, 3);
        let critical = op(Priority::Critical, t1, 4);
        let expected = [critical.id, normal_early.id, normal_tie.id, normal_late.id, low.id];

        for o in [low, normal_late, normal_tie, critical, normal_early] {
            state.upsert(o);
        }

        let order: Vec<_> = state.pending().map(|o| o.id).collect();
        assert_eq!(order, expected);
        assert_eq!(state.next_sequence(), 5);
    }

    #[test]
    fn status_change_leaves_index() {
        let mut state = QueueState::new();
        let mut o = op(Priority::High, Utc::now(), 0);
        state.upsert(o.clone());
        assert_eq!(state.pending_len(), 1);

        o.status = OperationStatus::Syncing;
        state.upsert(o.clone());
        assert_eq!(state.pending_len(), 0);
        assert_eq!(state.len(), 1);

        o.status = OperationStatus::Pending;
        state.upsert(o.clone());
        assert_eq!(state.pending_len(), 1);

        state.remove(&o.id);
        assert_eq!(state.pending_len(), 0);
        assert!(state.get(&o.id).is_none());
    }

    #[test]
    fn clear_keeps_sequence_counter() {
        let mut state = QueueState::new();
        state.upsert(op(Priority::Normal, Utc::now(), 9));
        state.clear();
        assert_eq!(state.len(), 0);
        assert_eq!(state.next_sequence(), 10);
    }
}
