use crate::common::{BriarError, PageId, RecordId, Result, SlotId};
use crate::storage::page::{PageType, SlottedPage, SlottedPageRef};

use super::entry::{decode_leaf_entry, encode_leaf_entry};

/// A leaf node: `(key, rid)` entries in weakly ascending key order, chained
/// to its siblings through the page's prev/next links.
pub struct LeafPage<'a> {
    page: SlottedPage<'a>,
}

impl<'a> LeafPage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Self {
            page: SlottedPage::new(data),
        }
    }

    pub fn init(&mut self, page_id: PageId) {
        self.page.init(page_id, PageType::Leaf);
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

    pub fn prev_page(&self) -> Option<PageId> {
        self.page.prev_page()
    }

    pub fn set_prev_page(&mut self, page_id: Option<PageId>) {
        self.page.set_prev_page(page_id);
    }

    pub fn next_page(&self) -> Option<PageId> {
        self.page.next_page()
    }

    pub fn set_next_page(&mut self, page_id: Option<PageId>) {
        self.page.set_next_page(page_id);
    }

    /// Inserts `(key, rid)` at its ordered position. Duplicate keys land
    /// after their equals, so duplicates stay adjacent in insertion order.
    pub fn insert(&mut self, key: &[u8], rid: RecordId) -> Result<SlotId> {
        let record = encode_leaf_entry(key, rid)?;
        let slot = self.upper_bound(key);
        self.page.insert_record_at(slot, &record)?;
        Ok(slot)
    }

    /// Removes the first slot matching `(key, rid)` exactly.
    pub fn delete(&mut self, key: &[u8], rid: RecordId) -> Result<()> {
        for slot_num in 0..self.page.num_records() {
            let slot = SlotId::new(slot_num);
            let (entry_key, entry_rid) = decode_leaf_entry(self.page.get_record(slot)?);
            if entry_key > key {
                break;
            }
            if entry_key == key && entry_rid == rid {
                return self.page.delete_record(slot);
            }
        }
        Err(BriarError::KeyNotFound)
    }

    pub fn get_first(&self) -> Option<(SlotId, &[u8], RecordId)> {
        self.get_current(SlotId::new(0))
    }

    pub fn get_last(&self) -> Option<(SlotId, &[u8], RecordId)> {
        let n = self.page.num_records();
        if n == 0 {
            return None;
        }
        self.get_current(SlotId::new(n - 1))
    }

    pub fn get_current(&self, slot: SlotId) -> Option<(SlotId, &[u8], RecordId)> {
        if slot.as_u16() >= self.page.num_records() {
            return None;
        }
        let record = self.page.get_record(slot).ok()?;
        let (key, rid) = decode_leaf_entry(record);
        Some((slot, key, rid))
    }

    pub fn get_next(&self, slot: SlotId) -> Option<(SlotId, &[u8], RecordId)> {
        self.get_current(SlotId::new(slot.as_u16() + 1))
    }

    /// Removes and returns the first entry.
    pub fn pop_first(&mut self) -> Result<Option<(Vec<u8>, RecordId)>> {
        let (slot, key, rid) = match self.get_first() {
            Some((slot, key, rid)) => (slot, key.to_vec(), rid),
            None => return Ok(None),
        };
        self.page.delete_record(slot)?;
        Ok(Some((key, rid)))
    }

    /// Removes and returns the last entry.
    pub fn pop_last(&mut self) -> Result<Option<(Vec<u8>, RecordId)>> {
        let (slot, key, rid) = match self.get_last() {
            Some((slot, key, rid)) => (slot, key.to_vec(), rid),
            None => return Ok(None),
        };
        self.page.delete_record(slot)?;
        Ok(Some((key, rid)))
    }

    /// First slot whose key orders strictly after `key`.
    fn upper_bound(&self, key: &[u8]) -> SlotId {
        let n = self.page.num_records();
        for slot_num in 0..n {
            let record = self.page.get_record(SlotId::new(slot_num)).unwrap();
            let (entry_key, _) = decode_leaf_entry(record);
            if entry_key > key {
                return SlotId::new(slot_num);
            }
        }
        SlotId::new(n)
    }
}

/// Read-only view of a leaf node.
pub struct LeafPageRef<'a> {
    page: SlottedPageRef<'a>,
}

impl<'a> LeafPageRef<'a> {
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

    pub fn prev_page(&self) -> Option<PageId> {
        self.page.prev_page()
    }

    pub fn next_page(&self) -> Option<PageId> {
        self.page.next_page()
    }

    pub fn get_first(&self) -> Option<(SlotId, &[u8], RecordId)> {
        self.get_current(SlotId::new(0))
    }

    pub fn get_last(&self) -> Option<(SlotId, &[u8], RecordId)> {
        let n = self.page.num_records();
        if n == 0 {
            return None;
        }
        self.get_current(SlotId::new(n - 1))
    }

    pub fn get_current(&self, slot: SlotId) -> Option<(SlotId, &[u8], RecordId)> {
        if slot.as_u16() >= self.page.num_records() {
            return None;
        }
        let record = self.page.get_record(slot).ok()?;
        let (key, rid) = decode_leaf_entry(record);
        Some((slot, key, rid))
    }

    pub fn get_next(&self, slot: SlotId) -> Option<(SlotId, &[u8], RecordId)> {
        self.get_current(SlotId::new(slot.as_u16() + 1))
    }
}
