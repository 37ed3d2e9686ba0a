use crate::common::{BriarError, PageId, Result, SlotId, INVALID_PAGE_ID, PAGE_SIZE};

/// Slotted page layout:
///
/// +------------------+
/// | Page Header      |  (HEADER_SIZE bytes)
/// +------------------+
/// | Slot Array       |  (grows downward)
/// | [slot 0]         |
/// | [slot 1]         |
/// | ...              |
/// +------------------+
/// |                  |
/// | Free Space       |
/// |                  |
/// +------------------+
/// | Record Data      |  (grows upward from bottom)
/// | [record n]       |
/// | [record n-1]     |
/// | ...              |
/// +------------------+
///
/// Slot order is logical order: slot 0 holds the first record, slot 1 the
/// second, and so on. Inserting at a slot shifts the directory; deleting a
/// slot compacts both the directory and the data heap, so free space
/// accounting stays exact.
///
/// Each slot entry contains:
///   - offset: u16 (offset from start of page to record data)
///   - length: u16 (length of the record)
const HEADER_SIZE: usize = 20;

/// Size of each slot entry in bytes
const SLOT_SIZE: usize = 4;

/// Offset of page_id field in header
const PAGE_ID_OFFSET: usize = 0;

/// Offset of prev_page field in header
const PREV_PAGE_OFFSET: usize = 4;

/// Offset of next_page field in header
const NEXT_PAGE_OFFSET: usize = 8;

/// Offset of page_type tag in header
const PAGE_TYPE_OFFSET: usize = 12;

/// Offset of num_slots field in header
const NUM_SLOTS_OFFSET: usize = 14;

/// Offset of free_space_start field in header
const FREE_SPACE_START_OFFSET: usize = 16;

/// Offset of free_space_end field in header
const FREE_SPACE_END_OFFSET: usize = 18;

/// Bytes of a page usable for slots and record data
pub const PAGE_DATA_SIZE: usize = PAGE_SIZE - HEADER_SIZE;

/// Kind of node stored on a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    Leaf,
    Index,
}

impl PageType {
    fn as_u8(self) -> u8 {
        match self {
            PageType::Leaf => 1,
            PageType::Index => 2,
        }
    }

    fn from_u8(value: u8) -> Result<Self> {
        match value {
            1 => Ok(PageType::Leaf),
            2 => Ok(PageType::Index),
            other => Err(BriarError::TreeCorrupted(format!(
                "unknown page type tag {}",
                other
            ))),
        }
    }
}

/// Represents a slot entry in the slot array
#[derive(Debug, Clone, Copy)]
pub struct SlotEntry {
    /// Offset from start of page to record data
    pub offset: u16,
    /// Length of the record
    pub length: u16,
}

impl SlotEntry {
    pub fn new(offset: u16, length: u16) -> Self {
        Self { offset, length }
    }
}

/// SlottedPage provides methods to interpret and manipulate a page
/// as an ordered slotted page with variable-length records.
pub struct SlottedPage<'a> {
    pub(crate) data: &'a mut [u8],
}

impl<'a> SlottedPage<'a> {
    /// Creates a new SlottedPage view over the given data buffer.
    /// The buffer must be exactly PAGE_SIZE bytes.
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    /// Initializes a fresh slotted page with the given page ID and type.
    pub fn init(&mut self, page_id: PageId, page_type: PageType) {
        self.data.fill(0);
        self.set_page_id(page_id);
        self.set_prev_page(None);
        self.set_next_page(None);
        self.set_page_type(page_type);
        self.set_num_slots(0);
        self.set_free_space_start(HEADER_SIZE as u16);
        self.set_free_space_end(PAGE_SIZE as u16);
    }

    /// Returns the page ID.
    pub fn page_id(&self) -> PageId {
        let bytes: [u8; 4] = self.data[PAGE_ID_OFFSET..PAGE_ID_OFFSET + 4]
            .try_into()
            .unwrap();
        PageId::new(u32::from_le_bytes(bytes))
    }

    /// Sets the page ID.
    pub fn set_page_id(&mut self, page_id: PageId) {
        let bytes = page_id.as_u32().to_le_bytes();
        self.data[PAGE_ID_OFFSET..PAGE_ID_OFFSET + 4].copy_from_slice(&bytes);
    }

    /// Returns the previous-page pointer.
    pub fn prev_page(&self) -> Option<PageId> {
        read_page_link(self.data, PREV_PAGE_OFFSET)
    }

    /// Sets the previous-page pointer.
    pub fn set_prev_page(&mut self, page_id: Option<PageId>) {
        write_page_link(self.data, PREV_PAGE_OFFSET, page_id);
    }

    /// Returns the next-page pointer.
    pub fn next_page(&self) -> Option<PageId> {
        read_page_link(self.data, NEXT_PAGE_OFFSET)
    }

    /// Sets the next-page pointer.
    pub fn set_next_page(&mut self, page_id: Option<PageId>) {
        write_page_link(self.data, NEXT_PAGE_OFFSET, page_id);
    }

    /// Returns the page type tag.
    pub fn page_type(&self) -> Result<PageType> {
        PageType::from_u8(self.data[PAGE_TYPE_OFFSET])
    }

    /// Sets the page type tag.
    pub fn set_page_type(&mut self, page_type: PageType) {
        self.data[PAGE_TYPE_OFFSET] = page_type.as_u8();
    }

    /// Returns the number of slots.
    pub fn num_slots(&self) -> u16 {
        let bytes: [u8; 2] = self.data[NUM_SLOTS_OFFSET..NUM_SLOTS_OFFSET + 2]
            .try_into()
            .unwrap();
        u16::from_le_bytes(bytes)
    }

    fn set_num_slots(&mut self, num_slots: u16) {
        let bytes = num_slots.to_le_bytes();
        self.data[NUM_SLOTS_OFFSET..NUM_SLOTS_OFFSET + 2].copy_from_slice(&bytes);
    }

    /// Returns the start of free space (end of slot array).
    pub fn free_space_start(&self) -> u16 {
        let bytes: [u8; 2] = self.data[FREE_SPACE_START_OFFSET..FREE_SPACE_START_OFFSET + 2]
            .try_into()
            .unwrap();
        u16::from_le_bytes(bytes)
    }

    fn set_free_space_start(&mut self, offset: u16) {
        let bytes = offset.to_le_bytes();
        self.data[FREE_SPACE_START_OFFSET..FREE_SPACE_START_OFFSET + 2].copy_from_slice(&bytes);
    }

    /// Returns the end of free space (start of record data area).
    pub fn free_space_end(&self) -> u16 {
        let bytes: [u8; 2] = self.data[FREE_SPACE_END_OFFSET..FREE_SPACE_END_OFFSET + 2]
            .try_into()
            .unwrap();
        u16::from_le_bytes(bytes)
    }

    fn set_free_space_end(&mut self, offset: u16) {
        let bytes = offset.to_le_bytes();
        self.data[FREE_SPACE_END_OFFSET..FREE_SPACE_END_OFFSET + 2].copy_from_slice(&bytes);
    }

    /// Returns the raw gap between the slot array and the record data.
    pub fn free_space(&self) -> usize {
        let start = self.free_space_start() as usize;
        let end = self.free_space_end() as usize;
        end.saturating_sub(start)
    }

    /// Returns the space available for one more record, reserving room for
    /// its slot entry.
    pub fn available_space(&self) -> usize {
        self.free_space().saturating_sub(SLOT_SIZE)
    }

    /// Returns whether a record of the given size fits.
    pub fn can_insert(&self, record_size: usize) -> bool {
        self.free_space() >= record_size + SLOT_SIZE
    }

    fn slot_offset(slot_num: u16) -> usize {
        HEADER_SIZE + (slot_num as usize) * SLOT_SIZE
    }

    /// Gets a slot entry by slot ID.
    pub fn get_slot(&self, slot_id: SlotId) -> Option<SlotEntry> {
        read_slot(self.data, self.num_slots(), slot_id)
    }

    fn set_slot(&mut self, slot_id: SlotId, entry: SlotEntry) {
        let slot_offset = Self::slot_offset(slot_id.as_u16());
        self.data[slot_offset..slot_offset + 2].copy_from_slice(&entry.offset.to_le_bytes());
        self.data[slot_offset + 2..slot_offset + 4].copy_from_slice(&entry.length.to_le_bytes());
    }

    /// Inserts a record at the given slot position, shifting later slots
    /// right. Passing `num_slots()` appends.
    pub fn insert_record_at(&mut self, slot_id: SlotId, record: &[u8]) -> Result<()> {
        let num_slots = self.num_slots();
        let slot_num = slot_id.as_u16();

        if slot_num > num_slots {
            return Err(BriarError::InvalidSlotId(slot_num));
        }

        let record_size = record.len();
        if !self.can_insert(record_size) {
            return Err(BriarError::PageOverflow {
                entry_size: record_size,
                available: self.available_space(),
            });
        }

        // Shift slot entries [slot_num..num_slots) right by one.
        let src_start = Self::slot_offset(slot_num);
        let src_end = Self::slot_offset(num_slots);
        self.data.copy_within(src_start..src_end, src_start + SLOT_SIZE);

        // Write the record at the top of the data heap.
        let record_offset = self.free_space_end() as usize - record_size;
        self.data[record_offset..record_offset + record_size].copy_from_slice(record);

        self.set_slot(slot_id, SlotEntry::new(record_offset as u16, record_size as u16));
        self.set_num_slots(num_slots + 1);
        self.set_free_space_start(self.free_space_start() + SLOT_SIZE as u16);
        self.set_free_space_end(record_offset as u16);

        Ok(())
    }

    /// Gets record data by slot ID.
    pub fn get_record(&self, slot_id: SlotId) -> Result<&[u8]> {
        let entry = self
            .get_slot(slot_id)
            .ok_or(BriarError::InvalidSlotId(slot_id.as_u16()))?;

        let start = entry.offset as usize;
        let end = start + entry.length as usize;
        Ok(&self.data[start..end])
    }

    /// Deletes a record by slot ID, compacting both the slot directory and
    /// the data heap so the freed bytes are reusable immediately.
    pub fn delete_record(&mut self, slot_id: SlotId) -> Result<()> {
        let num_slots = self.num_slots();
        let entry = self
            .get_slot(slot_id)
            .ok_or(BriarError::InvalidSlotId(slot_id.as_u16()))?;

        let removed_offset = entry.offset as usize;
        let removed_len = entry.length as usize;
        let free_end = self.free_space_end() as usize;

        // Slide every record stored below the removed one up by its length.
        self.data
            .copy_within(free_end..removed_offset, free_end + removed_len);

        // Fix offsets of the records that moved.
        for i in 0..num_slots {
            if i == slot_id.as_u16() {
                continue;
            }
            let other = self.get_slot(SlotId::new(i)).unwrap();
            if (other.offset as usize) < removed_offset {
                self.set_slot(
                    SlotId::new(i),
                    SlotEntry::new(other.offset + removed_len as u16, other.length),
                );
            }
        }

        // Shift slot entries [slot_num+1..num_slots) left by one.
        let src_start = Self::slot_offset(slot_id.as_u16() + 1);
        let src_end = Self::slot_offset(num_slots);
        self.data.copy_within(src_start..src_end, src_start - SLOT_SIZE);

        self.set_num_slots(num_slots - 1);
        self.set_free_space_start(self.free_space_start() - SLOT_SIZE as u16);
        self.set_free_space_end((free_end + removed_len) as u16);

        Ok(())
    }

    /// Returns the number of records.
    pub fn num_records(&self) -> u16 {
        self.num_slots()
    }
}

/// Read-only view of a slotted page.
pub struct SlottedPageRef<'a> {
    pub(crate) data: &'a [u8],
}

impl<'a> SlottedPageRef<'a> {
    /// Creates a new read-only SlottedPage view.
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    /// Returns the page ID.
    pub fn page_id(&self) -> PageId {
        let bytes: [u8; 4] = self.data[PAGE_ID_OFFSET..PAGE_ID_OFFSET + 4]
            .try_into()
            .unwrap();
        PageId::new(u32::from_le_bytes(bytes))
    }

    /// Returns the previous-page pointer.
    pub fn prev_page(&self) -> Option<PageId> {
        read_page_link(self.data, PREV_PAGE_OFFSET)
    }

    /// Returns the next-page pointer.
    pub fn next_page(&self) -> Option<PageId> {
        read_page_link(self.data, NEXT_PAGE_OFFSET)
    }

    /// Returns the page type tag.
    pub fn page_type(&self) -> Result<PageType> {
        PageType::from_u8(self.data[PAGE_TYPE_OFFSET])
    }

    /// Returns the number of slots.
    pub fn num_slots(&self) -> u16 {
        let bytes: [u8; 2] = self.data[NUM_SLOTS_OFFSET..NUM_SLOTS_OFFSET + 2]
            .try_into()
            .unwrap();
        u16::from_le_bytes(bytes)
    }

    /// Returns the number of records.
    pub fn num_records(&self) -> u16 {
        self.num_slots()
    }

    /// Returns the raw gap between the slot array and the record data.
    pub fn free_space(&self) -> usize {
        let start = {
            let bytes: [u8; 2] = self.data[FREE_SPACE_START_OFFSET..FREE_SPACE_START_OFFSET + 2]
                .try_into()
                .unwrap();
            u16::from_le_bytes(bytes) as usize
        };
        let end = {
            let bytes: [u8; 2] = self.data[FREE_SPACE_END_OFFSET..FREE_SPACE_END_OFFSET + 2]
                .try_into()
                .unwrap();
            u16::from_le_bytes(bytes) as usize
        };
        end.saturating_sub(start)
    }

    /// Returns the space available for one more record.
    pub fn available_space(&self) -> usize {
        self.free_space().saturating_sub(SLOT_SIZE)
    }

    /// Gets a slot entry by slot ID.
    pub fn get_slot(&self, slot_id: SlotId) -> Option<SlotEntry> {
        read_slot(self.data, self.num_slots(), slot_id)
    }

    /// Gets record data by slot ID.
    pub fn get_record(&self, slot_id: SlotId) -> Result<&[u8]> {
        let entry = self
            .get_slot(slot_id)
            .ok_or(BriarError::InvalidSlotId(slot_id.as_u16()))?;

        let start = entry.offset as usize;
        let end = start + entry.length as usize;
        Ok(&self.data[start..end])
    }
}

fn read_page_link(data: &[u8], offset: usize) -> Option<PageId> {
    let bytes: [u8; 4] = data[offset..offset + 4].try_into().unwrap();
    let value = u32::from_le_bytes(bytes);
    if value == INVALID_PAGE_ID.as_u32() {
        None
    } else {
        Some(PageId::new(value))
    }
}

fn write_page_link(data: &mut [u8], offset: usize, page_id: Option<PageId>) {
    let value = page_id.map(|p| p.as_u32()).unwrap_or(INVALID_PAGE_ID.as_u32());
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn read_slot(data: &[u8], num_slots: u16, slot_id: SlotId) -> Option<SlotEntry> {
    let slot_num = slot_id.as_u16();
    if slot_num >= num_slots {
        return None;
    }

    let slot_offset = HEADER_SIZE + (slot_num as usize) * SLOT_SIZE;
    let offset_bytes: [u8; 2] = data[slot_offset..slot_offset + 2].try_into().unwrap();
    let length_bytes: [u8; 2] = data[slot_offset + 2..slot_offset + 4].try_into().unwrap();

    Some(SlotEntry::new(
        u16::from_le_bytes(offset_bytes),
        u16::from_le_bytes(length_bytes),
    ))
}
