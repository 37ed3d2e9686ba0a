use parking_lot::{Mutex, RwLock};

use crate::common::{FrameId, PageId, INVALID_PAGE_ID, PAGE_SIZE};

/// Frame bookkeeping: which page the frame holds, how many guards have it
/// pinned, and whether the cached copy differs from disk. These fields
/// always change together along the fetch/release/reset paths, so they
/// live in one record under one lock.
struct FrameMeta {
    page_id: PageId,
    pin_count: u32,
    is_dirty: bool,
}

/// A buffer frame: one page's worth of cached bytes plus its metadata.
///
/// The data sits behind its own RwLock so page guards can hold a borrow
/// of the bytes without blocking metadata updates on other frames.
pub struct Frame {
    /// The frame ID (index in the buffer pool)
    frame_id: FrameId,
    meta: Mutex<FrameMeta>,
    /// The cached page data (pub(crate) for page guard access)
    pub(crate) data: RwLock<Box<[u8; PAGE_SIZE]>>,
}

impl Frame {
    /// Creates an empty frame for the given pool slot.
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            meta: Mutex::new(FrameMeta {
                page_id: INVALID_PAGE_ID,
                pin_count: 0,
                is_dirty: false,
            }),
            data: RwLock::new(Box::new([0u8; PAGE_SIZE])),
        }
    }

    /// Returns the frame ID.
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Returns the page ID stored in this frame.
    pub fn page_id(&self) -> PageId {
        self.meta.lock().page_id
    }

    /// Sets the page ID stored in this frame.
    pub fn set_page_id(&self, page_id: PageId) {
        self.meta.lock().page_id = page_id;
    }

    /// Returns the current pin count.
    pub fn pin_count(&self) -> u32 {
        self.meta.lock().pin_count
    }

    /// Takes a pin on the frame and returns the new count.
    pub fn pin(&self) -> u32 {
        let mut meta = self.meta.lock();
        meta.pin_count += 1;
        meta.pin_count
    }

    /// Returns a pin, recording the releasing guard's dirty flag in the
    /// same step. Returns the remaining pin count, or None if the frame
    /// was not pinned.
    pub fn release(&self, dirty: bool) -> Option<u32> {
        let mut meta = self.meta.lock();
        if meta.pin_count == 0 {
            return None;
        }
        meta.pin_count -= 1;
        if dirty {
            meta.is_dirty = true;
        }
        Some(meta.pin_count)
    }

    /// Returns whether the cached copy differs from disk.
    pub fn is_dirty(&self) -> bool {
        self.meta.lock().is_dirty
    }

    /// Sets the dirty flag; the pool clears it after a write-back.
    pub fn set_dirty(&self, dirty: bool) {
        self.meta.lock().is_dirty = dirty;
    }

    /// Copies page bytes from the given slice into the frame.
    pub fn copy_from(&self, data: &[u8]) {
        assert_eq!(data.len(), PAGE_SIZE);
        self.data.write().copy_from_slice(data);
    }

    /// Copies the frame's page bytes into the given slice.
    pub fn copy_to(&self, data: &mut [u8]) {
        assert_eq!(data.len(), PAGE_SIZE);
        data.copy_from_slice(&**self.data.read());
    }

    /// Returns the frame to its empty state.
    pub fn reset(&self) {
        let mut meta = self.meta.lock();
        meta.page_id = INVALID_PAGE_ID;
        meta.pin_count = 0;
        meta.is_dirty = false;
        drop(meta);
        self.data.write().fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_new() {
        let frame = Frame::new(FrameId::new(0));
        assert_eq!(frame.frame_id(), FrameId::new(0));
        assert_eq!(frame.page_id(), INVALID_PAGE_ID);
        assert_eq!(frame.pin_count(), 0);
        assert!(!frame.is_dirty());
    }

    #[test]
    fn test_frame_pin_release() {
        let frame = Frame::new(FrameId::new(0));

        assert_eq!(frame.pin(), 1);
        assert_eq!(frame.pin(), 2);
        assert_eq!(frame.pin_count(), 2);

        assert_eq!(frame.release(false), Some(1));
        assert_eq!(frame.release(false), Some(0));
        assert_eq!(frame.release(false), None);
    }

    #[test]
    fn test_frame_release_carries_dirty_flag() {
        let frame = Frame::new(FrameId::new(0));

        frame.pin();
        frame.pin();

        // A clean release leaves the flag alone.
        frame.release(false);
        assert!(!frame.is_dirty());

        // A dirty release sets it, and it sticks until cleared.
        frame.release(true);
        assert!(frame.is_dirty());

        frame.set_dirty(false);
        assert!(!frame.is_dirty());
    }

    #[test]
    fn test_frame_data_roundtrip() {
        let frame = Frame::new(FrameId::new(0));

        let mut data = [0u8; PAGE_SIZE];
        data[0] = 42;
        data[100] = 255;
        frame.copy_from(&data);

        let mut read_data = [0u8; PAGE_SIZE];
        frame.copy_to(&mut read_data);

        assert_eq!(read_data[0], 42);
        assert_eq!(read_data[100], 255);
    }

    #[test]
    fn test_frame_reset() {
        let frame = Frame::new(FrameId::new(0));

        frame.set_page_id(PageId::new(5));
        frame.pin();
        let mut data = [1u8; PAGE_SIZE];
        frame.copy_from(&data);
        frame.release(true);

        frame.reset();

        assert_eq!(frame.page_id(), INVALID_PAGE_ID);
        assert_eq!(frame.pin_count(), 0);
        assert!(!frame.is_dirty());

        frame.copy_to(&mut data);
        assert_eq!(data[0], 0);
    }
}
