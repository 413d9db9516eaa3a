//! Bounded circular store for log records.
//!
//! A fixed-capacity ring of `Arc<LineRecord>` behind a single reader-writer
//! lock. The coordinator is the only writer; the view and navigation helpers
//! read concurrently. On overflow the oldest record is evicted and its slot
//! released so the raw text can be reclaimed.

use crate::record::LineRecord;
use std::sync::{Arc, RwLock};

pub struct CircularStore {
    inner: RwLock<Ring>,
}

struct Ring {
    data: Vec<Option<Arc<LineRecord>>>,
    head: usize,
    size: usize,
}

impl Ring {
    fn physical(&self, index: usize) -> usize {
        (self.head + index) % self.data.len()
    }
}

impl CircularStore {
    /// Create a store retaining at most `capacity` records (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut data = Vec::with_capacity(capacity);
        data.resize_with(capacity, || None);
        CircularStore {
            inner: RwLock::new(Ring {
                data,
                head: 0,
                size: 0,
            }),
        }
    }

    /// Append a record, evicting the oldest when full. Never fails.
    pub fn append(&self, record: Arc<LineRecord>) {
        let mut ring = self.inner.write().expect("store lock poisoned");
        let capacity = ring.data.len();
        if ring.size < capacity {
            let tail = ring.physical(ring.size);
            ring.data[tail] = Some(record);
            ring.size += 1;
        } else {
            // Full: overwrite the slot at head and advance. The evicted Arc
            // is dropped here, releasing the raw text.
            let head = ring.head;
            ring.data[head] = Some(record);
            ring.head = (head + 1) % capacity;
        }
    }

    /// The i-th oldest retained record, or `None` when out of range.
    pub fn get(&self, index: usize) -> Option<Arc<LineRecord>> {
        let ring = self.inner.read().expect("store lock poisoned");
        if index >= ring.size {
            return None;
        }
        ring.data[ring.physical(index)].clone()
    }

    /// Records in `[start, min(end, len))`, oldest to newest.
    pub fn range(&self, start: usize, end: usize) -> Vec<Arc<LineRecord>> {
        let ring = self.inner.read().expect("store lock poisoned");
        if start >= ring.size || end <= start {
            return Vec::new();
        }
        let end = end.min(ring.size);
        (start..end)
            .filter_map(|i| ring.data[ring.physical(i)].clone())
            .collect()
    }

    /// The newest `n` records, oldest to newest.
    #[allow(dead_code)] // Public API for external use and tests
    pub fn last(&self, n: usize) -> Vec<Arc<LineRecord>> {
        let len = self.len();
        self.range(len.saturating_sub(n), len)
    }

    /// Iterate oldest to newest while `f` returns true. The read guard is
    /// held for the whole iteration.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Arc<LineRecord>) -> bool,
    {
        let ring = self.inner.read().expect("store lock poisoned");
        for i in 0..ring.size {
            if let Some(record) = &ring.data[ring.physical(i)] {
                if !f(record) {
                    break;
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("store lock poisoned").size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[allow(dead_code)] // Public API for external use and tests
    pub fn capacity(&self) -> usize {
        self.inner.read().expect("store lock poisoned").data.len()
    }

    /// Drop all retained records.
    pub fn clear(&self) {
        let mut ring = self.inner.write().expect("store lock poisoned");
        ring.head = 0;
        ring.size = 0;
        for slot in ring.data.iter_mut() {
            *slot = None;
        }
    }
}
