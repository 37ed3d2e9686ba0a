use crate::common::{BriarError, PageId, Result, SlotId};
use crate::storage::page::{PageType, SlottedPage, SlottedPageRef};

use super::entry::{decode_index_entry, encode_index_entry};

/// An index node: a leftmost child pointer (kept in the substrate's
/// prev_page field) plus `(separator, child)` entries in strictly
/// ascending key order. Entry `i` is the lower bound of the subtree at
/// `child_i`; keys below every separator belong to the leftmost child.
pub struct IndexPage<'a> {
    page: SlottedPage<'a>,
}

impl<'a> IndexPage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Self {
            page: SlottedPage::new(data),
        }
    }

    pub fn init(&mut self, page_id: PageId) {
        self.page.init(page_id, PageType::Index);
    }

    pub fn page_id(&self) -> PageId {
        self.page.page_id()
    }

    pub fn num_records(&self) -> u16 {
        self.page.num_records()
    }

    pub fn available_space(&self) -> usize {
        self.page.available_space()
    }

    pub fn leftmost_child(&self) -> Result<PageId> {
        self.page.prev_page().ok_or_else(|| {
            BriarError::TreeCorrupted(format!(
                "index node {} has no leftmost child",
                self.page.page_id()
            ))
        })
    }

    pub fn set_leftmost_child(&mut self, page_id: PageId) {
        self.page.set_prev_page(Some(page_id));
    }

    /// Inserts `(key, child)` at its ordered position.
    pub fn insert(&mut self, key: &[u8], child: PageId) -> Result<SlotId> {
        let record = encode_index_entry(key, child)?;
        let slot = self.upper_bound(key);
        self.page.insert_record_at(slot, &record)?;
        Ok(slot)
    }

    /// Removes the entry at `slot`.
    pub fn delete_at(&mut self, slot: SlotId) -> Result<()> {
        self.page.delete_record(slot)
    }

    pub fn get_first(&self) -> Option<(SlotId, &[u8], PageId)> {
        self.get_current(SlotId::new(0))
    }

    pub fn get_last(&self) -> Option<(SlotId, &[u8], PageId)> {
        let n = self.page.num_records();
        if n == 0 {
            return None;
        }
        self.get_current(SlotId::new(n - 1))
    }

    pub fn get_current(&self, slot: SlotId) -> Option<(SlotId, &[u8], PageId)> {
        if slot.as_u16() >= self.page.num_records() {
            return None;
        }
        let record = self.page.get_record(slot).ok()?;
        let (key, child) = decode_index_entry(record);
        Some((slot, key, child))
    }

    pub fn get_next(&self, slot: SlotId) -> Option<(SlotId, &[u8], PageId)> {
        self.get_current(SlotId::new(slot.as_u16() + 1))
    }

    /// Removes and returns the first entry.
    pub fn pop_first(&mut self) -> Result<Option<(Vec<u8>, PageId)>> {
        let (slot, key, child) = match self.get_first() {
            Some((slot, key, child)) => (slot, key.to_vec(), child),
            None => return Ok(None),
        };
        self.page.delete_record(slot)?;
        Ok(Some((key, child)))
    }

    /// Removes and returns the last entry.
    pub fn pop_last(&mut self) -> Result<Option<(Vec<u8>, PageId)>> {
        let (slot, key, child) = match self.get_last() {
            Some((slot, key, child)) => (slot, key.to_vec(), child),
            None => return Ok(None),
        };
        self.page.delete_record(slot)?;
        Ok(Some((key, child)))
    }

    /// Returns the child whose subtree must contain `key`: the highest
    /// separator `≤ key`, or the leftmost child when `key` orders below
    /// every separator. The flag reports the leftmost case.
    pub fn find_page(&self, key: &[u8]) -> Result<(PageId, bool)> {
        for slot_num in (0..self.page.num_records()).rev() {
            let record = self.page.get_record(SlotId::new(slot_num))?;
            let (entry_key, child) = decode_index_entry(record);
            if entry_key <= key {
                return Ok((child, false));
            }
        }
        Ok((self.leftmost_child()?, true))
    }

    /// Like `find_page`, but a key equal to a separator resolves to the
    /// child on the separator's left. Range positioning starts here so a
    /// scan also visits duplicates that sit left of the separator.
    pub fn find_page_for_scan(&self, key: &[u8]) -> Result<(PageId, bool)> {
        for slot_num in (0..self.page.num_records()).rev() {
            let record = self.page.get_record(SlotId::new(slot_num))?;
            let (entry_key, child) = decode_index_entry(record);
            if entry_key < key {
                return Ok((child, false));
            }
        }
        Ok((self.leftmost_child()?, true))
    }

    /// Picks the sibling to rebalance `target` against: the right sibling
    /// when `target` is the leftmost child, the left sibling otherwise.
    pub fn find_sibling_for_child(&self, target: PageId) -> Result<(PageId, bool)> {
        if self.leftmost_child()? == target {
            let (_, _, sibling) = self.get_first().ok_or_else(|| {
                BriarError::TreeCorrupted(format!(
                    "index node {} has a leftmost child but no entries",
                    self.page.page_id()
                ))
            })?;
            return Ok((sibling, true));
        }

        for slot_num in 0..self.page.num_records() {
            let record = self.page.get_record(SlotId::new(slot_num))?;
            let (_, child) = decode_index_entry(record);
            if child == target {
                let sibling = if slot_num == 0 {
                    self.leftmost_child()?
                } else {
                    let prev = self.page.get_record(SlotId::new(slot_num - 1))?;
                    decode_index_entry(prev).1
                };
                return Ok((sibling, false));
            }
        }

        Err(BriarError::TreeCorrupted(format!(
            "page {} is not a child of index node {}",
            target,
            self.page.page_id()
        )))
    }

    /// Drops the pointer to a merged-away child.
    ///
    /// If `target` is the leftmost child, the slot-0 child is promoted to
    /// leftmost; its separator disappears, widening the leftmost range as
    /// the merge requires. Otherwise the slot addressing `target` is
    /// removed and, when the merge consumed a left sibling, the following
    /// separator inherits the removed key so the surviving child keeps a
    /// correct lower bound.
    pub fn delete_page(&mut self, target: PageId, target_is_right_sibling: bool) -> Result<()> {
        if self.leftmost_child()? == target {
            let (slot, _, child) = self.get_first().ok_or_else(|| {
                BriarError::TreeCorrupted(format!(
                    "index node {} has a leftmost child but no entries",
                    self.page.page_id()
                ))
            })?;
            self.page.delete_record(slot)?;
            self.set_leftmost_child(child);
            return Ok(());
        }

        for slot_num in 0..self.page.num_records() {
            let slot = SlotId::new(slot_num);
            let record = self.page.get_record(slot)?;
            let (entry_key, child) = decode_index_entry(record);
            if child != target {
                continue;
            }

            let removed_key = entry_key.to_vec();
            self.page.delete_record(slot)?;

            if !target_is_right_sibling {
                // The entry that followed the target now sits at its slot.
                if let Some((next_slot, _, next_child)) = self.get_current(slot) {
                    self.page.delete_record(next_slot)?;
                    self.insert(&removed_key, next_child)?;
                }
            }
            return Ok(());
        }

        Err(BriarError::TreeCorrupted(format!(
            "page {} is not a child of index node {}",
            target,
            self.page.page_id()
        )))
    }

    /// Overwrites the separator currently holding `old_key` with
    /// `new_key`, keeping its child. Returns false when no separator
    /// orders at or below `old_key` (the child became leftmost); the
    /// caller skips the adjustment in that case.
    pub fn adjust_key(&mut self, new_key: &[u8], old_key: &[u8]) -> Result<bool> {
        for slot_num in (0..self.page.num_records()).rev() {
            let slot = SlotId::new(slot_num);
            let record = self.page.get_record(slot)?;
            let (entry_key, child) = decode_index_entry(record);
            if entry_key <= old_key {
                self.page.delete_record(slot)?;
                self.insert(new_key, child)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// The inverse of `find_page`: the separator key addressing `target`,
    /// or None when `target` is the leftmost child.
    pub fn find_key_with_page(&self, target: PageId) -> Result<Option<Vec<u8>>> {
        if self.leftmost_child()? == target {
            return Ok(None);
        }

        for slot_num in (0..self.page.num_records()).rev() {
            let record = self.page.get_record(SlotId::new(slot_num))?;
            let (entry_key, child) = decode_index_entry(record);
            if child == target {
                return Ok(Some(entry_key.to_vec()));
            }
        }

        Err(BriarError::TreeCorrupted(format!(
            "page {} is not a child of index node {}",
            target,
            self.page.page_id()
        )))
    }

    /// First slot whose key orders strictly after `key`.
    fn upper_bound(&self, key: &[u8]) -> SlotId {
        let n = self.page.num_records();
        for slot_num in 0..n {
            let record = self.page.get_record(SlotId::new(slot_num)).unwrap();
            let (entry_key, _) = decode_index_entry(record);
            if entry_key > key {
                return SlotId::new(slot_num);
            }
        }
        SlotId::new(n)
    }
}

/// Read-only view of an index node.
pub struct IndexPageRef<'a> {
    page: SlottedPageRef<'a>,
}

impl<'a> IndexPageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            page: SlottedPageRef::new(data),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page.page_id()
    }

    pub fn num_records(&self) -> u16 {
        self.page.num_records()
    }

    pub fn available_space(&self) -> usize {
        self.page.available_space()
    }

    pub fn leftmost_child(&self) -> Result<PageId> {
        self.page.prev_page().ok_or_else(|| {
            BriarError::TreeCorrupted(format!(
                "index node {} has no leftmost child",
                self.page.page_id()
            ))
        })
    }

    pub fn get_first(&self) -> Option<(SlotId, &[u8], PageId)> {
        self.get_current(SlotId::new(0))
    }

    pub fn get_last(&self) -> Option<(SlotId, &[u8], PageId)> {
        let n = self.page.num_records();
        if n == 0 {
            return None;
        }
        self.get_current(SlotId::new(n - 1))
    }

    pub fn get_current(&self, slot: SlotId) -> Option<(SlotId, &[u8], PageId)> {
        if slot.as_u16() >= self.page.num_records() {
            return None;
        }
        let record = self.page.get_record(slot).ok()?;
        let (key, child) = decode_index_entry(record);
        Some((slot, key, child))
    }

    pub fn get_next(&self, slot: SlotId) -> Option<(SlotId, &[u8], PageId)> {
        self.get_current(SlotId::new(slot.as_u16() + 1))
    }

    /// See [`IndexPage::find_page`].
    pub fn find_page(&self, key: &[u8]) -> Result<(PageId, bool)> {
        for slot_num in (0..self.page.num_records()).rev() {
            let record = self.page.get_record(SlotId::new(slot_num))?;
            let (entry_key, child) = decode_index_entry(record);
            if entry_key <= key {
                return Ok((child, false));
            }
        }
        Ok((self.leftmost_child()?, true))
    }

    /// See [`IndexPage::find_page_for_scan`].
    pub fn find_page_for_scan(&self, key: &[u8]) -> Result<(PageId, bool)> {
        for slot_num in (0..self.page.num_records()).rev() {
            let record = self.page.get_record(SlotId::new(slot_num))?;
            let (entry_key, child) = decode_index_entry(record);
            if entry_key < key {
                return Ok((child, false));
            }
        }
        Ok((self.leftmost_child()?, true))
    }

    /// See [`IndexPage::find_sibling_for_child`].
    pub fn find_sibling_for_child(&self, target: PageId) -> Result<(PageId, bool)> {
        if self.leftmost_child()? == target {
            let (_, _, sibling) = self.get_first().ok_or_else(|| {
                BriarError::TreeCorrupted(format!(
                    "index node {} has a leftmost child but no entries",
                    self.page.page_id()
                ))
            })?;
            return Ok((sibling, true));
        }

        for slot_num in 0..self.page.num_records() {
            let record = self.page.get_record(SlotId::new(slot_num))?;
            let (_, child) = decode_index_entry(record);
            if child == target {
                let sibling = if slot_num == 0 {
                    self.leftmost_child()?
                } else {
                    let prev = self.page.get_record(SlotId::new(slot_num - 1))?;
                    decode_index_entry(prev).1
                };
                return Ok((sibling, false));
            }
        }

        Err(BriarError::TreeCorrupted(format!(
            "page {} is not a child of index node {}",
            target,
            self.page.page_id()
        )))
    }
}
