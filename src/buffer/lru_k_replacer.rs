use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::common::{FrameId, Timestamp};

/// Access history for one frame: up to k timestamps, oldest first.
struct FrameAccess {
    history: VecDeque<Timestamp>,
    evictable: bool,
}

impl FrameAccess {
    fn new(evictable: bool) -> Self {
        Self {
            history: VecDeque::new(),
            evictable,
        }
    }
}

/// Everything the replacer tracks, under one lock: a logical clock that
/// advances once per recorded access, the per-frame histories, and the
/// running count of evictable frames.
struct ReplacerState {
    clock: Timestamp,
    frames: HashMap<FrameId, FrameAccess>,
    evictable_count: usize,
}

/// LRU-K replacement policy.
///
/// The victim is the evictable frame with the largest backward k-distance,
/// the age of its k-th most recent access. A frame with fewer than k
/// recorded accesses is infinitely distant; among those, the one whose
/// first access is oldest goes first.
pub struct LruKReplacer {
    /// K value for the LRU-K algorithm
    k: usize,
    /// Maximum number of frames the replacer can track
    max_frames: usize,
    state: Mutex<ReplacerState>,
}

impl LruKReplacer {
    /// Creates a new LRU-K replacer with the given k value and maximum frame count.
    pub fn new(k: usize, max_frames: usize) -> Self {
        Self {
            k,
            max_frames,
            state: Mutex::new(ReplacerState {
                clock: 0,
                frames: HashMap::new(),
                evictable_count: 0,
            }),
        }
    }

    /// Evicts the frame with the largest backward k-distance.
    /// Returns None if there are no evictable frames.
    pub fn evict(&self) -> Option<FrameId> {
        let mut state = self.state.lock();
        if state.evictable_count == 0 {
            return None;
        }

        let now = state.clock;
        let k = self.k;

        // Rank candidates as (infinite?, distance). An infinite distance
        // outranks every finite one; within the infinite tier the oldest
        // first access wins, so its age stands in for the distance.
        let victim = state
            .frames
            .iter()
            .filter(|(_, access)| access.evictable)
            .max_by_key(|(_, access)| {
                if access.history.len() < k {
                    let first = access.history.front().copied().unwrap_or(0);
                    (true, Timestamp::MAX - first)
                } else {
                    (false, now - access.history[access.history.len() - k])
                }
            })
            .map(|(frame_id, _)| *frame_id)?;

        state.frames.remove(&victim);
        state.evictable_count -= 1;
        Some(victim)
    }

    /// Records that the given frame was accessed.
    pub fn record_access(&self, frame_id: FrameId) {
        if frame_id.as_usize() >= self.max_frames {
            return;
        }

        let mut state = self.state.lock();
        let timestamp = state.clock;
        state.clock += 1;

        let k = self.k;
        let access = state
            .frames
            .entry(frame_id)
            .or_insert_with(|| FrameAccess::new(false));
        access.history.push_back(timestamp);
        while access.history.len() > k {
            access.history.pop_front();
        }
    }

    /// Sets whether a frame is evictable.
    /// When a frame's pin count drops to 0, it should be marked as evictable.
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        if frame_id.as_usize() >= self.max_frames {
            return;
        }

        let mut state = self.state.lock();
        let mut changed = false;
        match state.frames.entry(frame_id) {
            Entry::Occupied(mut entry) => {
                let access = entry.get_mut();
                if access.evictable != evictable {
                    access.evictable = evictable;
                    changed = true;
                }
            }
            Entry::Vacant(entry) => {
                // Unseen frame marked evictable: start an empty history.
                if evictable {
                    entry.insert(FrameAccess::new(true));
                    changed = true;
                }
            }
        }

        if changed {
            if evictable {
                state.evictable_count += 1;
            } else {
                state.evictable_count -= 1;
            }
        }
    }

    /// Drops a frame from the replacer entirely.
    /// Called when a page is deleted from the BufferPoolManager.
    pub fn remove(&self, frame_id: FrameId) {
        let mut state = self.state.lock();
        if let Some(access) = state.frames.remove(&frame_id) {
            if access.evictable {
                state.evictable_count -= 1;
            }
        }
    }

    /// Returns the number of evictable frames.
    pub fn size(&self) -> usize {
        self.state.lock().evictable_count
    }

    /// Returns the k value of this replacer.
    pub fn k(&self) -> usize {
        self.k
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_k_replacer_new() {
        let replacer = LruKReplacer::new(2, 10);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.k(), 2);
    }

    #[test]
    fn test_lru_k_replacer_evict_empty() {
        let replacer = LruKReplacer::new(2, 10);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_lru_k_replacer_basic() {
        let replacer = LruKReplacer::new(2, 10);

        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(1));
        replacer.record_access(FrameId::new(2));

        replacer.set_evictable(FrameId::new(0), true);
        replacer.set_evictable(FrameId::new(1), true);
        replacer.set_evictable(FrameId::new(2), true);

        assert_eq!(replacer.size(), 3);

        // All have a single access (< k), so all are infinitely distant;
        // the earliest first access wins.
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
        assert_eq!(replacer.size(), 2);
    }

    #[test]
    fn test_lru_k_replacer_k_distance() {
        let replacer = LruKReplacer::new(2, 10);

        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(1));

        replacer.set_evictable(FrameId::new(0), true);
        replacer.set_evictable(FrameId::new(1), true);

        // Frame 1 has fewer than k accesses, so it outranks frame 0's
        // finite distance.
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    }

    #[test]
    fn test_lru_k_replacer_not_evictable() {
        let replacer = LruKReplacer::new(2, 10);

        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(1));

        replacer.set_evictable(FrameId::new(1), true);

        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_lru_k_replacer_toggle_evictable() {
        let replacer = LruKReplacer::new(2, 10);

        replacer.record_access(FrameId::new(0));
        replacer.set_evictable(FrameId::new(0), true);
        assert_eq!(replacer.size(), 1);

        replacer.set_evictable(FrameId::new(0), false);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);

        replacer.set_evictable(FrameId::new(0), true);
        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_lru_k_replacer_remove() {
        let replacer = LruKReplacer::new(2, 10);

        replacer.record_access(FrameId::new(0));
        replacer.set_evictable(FrameId::new(0), true);

        assert_eq!(replacer.size(), 1);

        replacer.remove(FrameId::new(0));

        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_lru_k_replacer_largest_k_distance() {
        let replacer = LruKReplacer::new(2, 10);

        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(1));
        replacer.record_access(FrameId::new(1));
        replacer.record_access(FrameId::new(2));
        replacer.record_access(FrameId::new(2));

        replacer.set_evictable(FrameId::new(0), true);
        replacer.set_evictable(FrameId::new(1), true);
        replacer.set_evictable(FrameId::new(2), true);

        // Frame 0's k-th most recent access is the oldest, so it has the
        // largest backward k-distance.
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    }
}
