use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::{BriarError, PageId, RecordId, Result, SlotId};

use super::leaf_page::LeafPageRef;

/// Forward cursor over the leaf chain.
///
/// The cursor holds a `(page, slot, high bound)` triple and pins lazily:
/// each call to `next` pins the current leaf, reads one entry, and unpins
/// before returning. No frame stays pinned between calls.
pub struct BTreeScan {
    bpm: Arc<BufferPoolManager>,
    page: Option<PageId>,
    slot: u16,
    high: Option<Vec<u8>>,
}

impl BTreeScan {
    /// Builds a cursor starting at `start` and advances it to the first
    /// entry with key `>= low` (crossing leaves if the start page holds
    /// only smaller keys).
    pub(crate) fn new(
        bpm: Arc<BufferPoolManager>,
        start: Option<PageId>,
        low: Option<&[u8]>,
        high: Option<&[u8]>,
    ) -> Result<Self> {
        let mut scan = Self {
            bpm,
            page: start,
            slot: 0,
            high: high.map(|h| h.to_vec()),
        };
        if let Some(low) = low {
            scan.position_at(low)?;
        }
        Ok(scan)
    }

    fn position_at(&mut self, low: &[u8]) -> Result<()> {
        loop {
            let pid = match self.page {
                Some(pid) => pid,
                None => return Ok(()),
            };

            let next = {
                let guard = self
                    .bpm
                    .checked_read_page(pid)?
                    .ok_or(BriarError::PageNotFound(pid))?;
                let leaf = LeafPageRef::new(guard.data());

                let mut found = false;
                while let Some((_, key, _)) = leaf.get_current(SlotId::new(self.slot)) {
                    if key >= low {
                        found = true;
                        break;
                    }
                    self.slot += 1;
                }
                if found {
                    return Ok(());
                }
                leaf.next_page()
            };

            self.page = next;
            self.slot = 0;
        }
    }

    /// Emits the current entry and advances. Returns None once the chain
    /// ends or the next key exceeds the high bound.
    pub fn next(&mut self) -> Result<Option<(Vec<u8>, RecordId)>> {
        loop {
            let pid = match self.page {
                Some(pid) => pid,
                None => return Ok(None),
            };

            let next = {
                let guard = self
                    .bpm
                    .checked_read_page(pid)?
                    .ok_or(BriarError::PageNotFound(pid))?;
                let leaf = LeafPageRef::new(guard.data());

                if let Some((_, key, rid)) = leaf.get_current(SlotId::new(self.slot)) {
                    if let Some(high) = &self.high {
                        if key > high.as_slice() {
                            self.page = None;
                            return Ok(None);
                        }
                    }
                    let key = key.to_vec();
                    self.slot += 1;
                    return Ok(Some((key, rid)));
                }
                leaf.next_page()
            };

            self.page = next;
            self.slot = 0;
        }
    }

    /// Detaches the cursor. Subsequent `next` calls return None.
    pub fn close(&mut self) {
        self.page = None;
    }
}

impl Iterator for BTreeScan {
    type Item = Result<(Vec<u8>, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        match BTreeScan::next(self) {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
