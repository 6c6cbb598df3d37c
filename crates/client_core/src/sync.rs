//! Synchronized ordered view of a backend collection.
//!
//! One [`SyncedList`] combines a single bounded initial fetch with an
//! unbounded stream of "created" events. Order is derived, never stored: the
//! full collection is re-sorted through its comparator after every
//! insertion, which is acceptable because collections stay small.

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedPhase {
    Uninitialized,
    Loading,
    Live,
    TornDown,
}

type BoxedComparator<T> = Box<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

pub struct SyncedList<T> {
    items: Vec<T>,
    phase: FeedPhase,
    cmp: BoxedComparator<T>,
}

impl<T> SyncedList<T> {
    pub fn new(cmp: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static) -> Self {
        Self {
            items: Vec::new(),
            phase: FeedPhase::Uninitialized,
            cmp: Box::new(cmp),
        }
    }

    pub fn phase(&self) -> FeedPhase {
        self.phase
    }

    /// Current ordered snapshot.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn mark_loading(&mut self) {
        if self.phase == FeedPhase::Uninitialized {
            self.phase = FeedPhase::Loading;
        }
    }

    /// Applies the one-shot fetch result and enters `Live`. Returns false
    /// once torn down.
    pub fn apply_initial(&mut self, items: Vec<T>) -> bool {
        if self.phase == FeedPhase::TornDown {
            return false;
        }
        self.items.extend(items);
        self.resort();
        self.phase = FeedPhase::Live;
        true
    }

    /// Inserts one live "created" event. Events are accepted in any phase
    /// before teardown: the feed may deliver before, during, or after the
    /// initial fetch resolves, including after the fetch failed.
    pub fn apply_created(&mut self, item: T) -> bool {
        if self.phase == FeedPhase::TornDown {
            return false;
        }
        self.items.push(item);
        self.resort();
        true
    }

    /// Terminal and idempotent; later applies are ignored.
    pub fn tear_down(&mut self) {
        self.phase = FeedPhase::TornDown;
    }

    fn resort(&mut self) {
        let cmp = &self.cmp;
        self.items.sort_by(|a, b| cmp(a, b));
    }
}
