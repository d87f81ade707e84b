use std::collections::{BTreeSet, HashMap};

#[derive(Debug)]
struct PartitionOffsets {
    /// First offset seen; nothing below it is ours to commit.
    start: i64,
    pending: BTreeSet<i64>,
    highest_done: Option<i64>,
    committed: Option<i64>,
}

/// Tracks which offsets are still in flight per partition.
///
/// Messages are acknowledged out of order by the worker pool, but a commit
/// position may only move past offsets that are all settled; otherwise a
/// restart would skip a message that was never processed.
#[derive(Debug, Default)]
pub struct OffsetTracker {
    partitions: HashMap<i32, PartitionOffsets>,
}

impl OffsetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, partition: i32, offset: i64) {
        self.partitions
            .entry(partition)
            .or_insert_with(|| PartitionOffsets {
                start: offset,
                pending: BTreeSet::new(),
                highest_done: None,
                committed: None,
            })
            .pending
            .insert(offset);
    }

    /// Marks `offset` done. Returns the new commit position (the next offset
    /// to read) when it advanced.
    pub fn complete(&mut self, partition: i32, offset: i64) -> Option<i64> {
        let state = self.partitions.get_mut(&partition)?;
        if !state.pending.remove(&offset) {
            return None;
        }
        state.highest_done = Some(state.highest_done.map_or(offset, |h| h.max(offset)));

        let next = match state.pending.first() {
            Some(lowest) => *lowest,
            None => state.highest_done? + 1,
        };

        if next > state.committed.unwrap_or(state.start) {
            state.committed = Some(next);
            Some(next)
        } else {
            None
        }
    }

    pub fn pending(&self, partition: i32) -> usize {
        self.partitions
            .get(&partition)
            .map_or(0, |state| state.pending.len())
    }

    pub fn committed(&self, partition: i32) -> Option<i64> {
        self.partitions.get(&partition).and_then(|s| s.committed)
    }
}
