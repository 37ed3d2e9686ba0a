use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::common::{BriarError, PageId, Result, PAGE_SIZE};
use crate::storage::page::{CatalogPage, CatalogPageRef};

/// The catalog page always lives at page 0.
pub const CATALOG_PAGE_ID: PageId = PageId::new(0);

/// DiskManager is responsible for reading and writing pages to/from a
/// single database file. Freed pages are recycled before the file grows.
pub struct DiskManager {
    file: Mutex<File>,
    db_path: PathBuf,
    /// Total number of pages ever allocated in the file
    num_pages: AtomicU32,
    /// Deallocated pages available for reuse
    free_pages: Mutex<Vec<PageId>>,
    /// Number of disk reads performed
    num_reads: AtomicU32,
    /// Number of disk writes performed
    num_writes: AtomicU32,
}

impl DiskManager {
    /// Opens the database file at the given path, creating it (and its
    /// catalog page) if it does not exist.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&db_path)?;

        let file_size = file.metadata()?.len();
        let num_pages = (file_size / PAGE_SIZE as u64) as u32;

        let dm = Self {
            file: Mutex::new(file),
            db_path,
            num_pages: AtomicU32::new(num_pages),
            free_pages: Mutex::new(Vec::new()),
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
        };

        if num_pages == 0 {
            dm.init_catalog_page()?;
        } else {
            dm.validate_catalog_page()?;
        }

        Ok(dm)
    }

    fn init_catalog_page(&self) -> Result<()> {
        let mut data = [0u8; PAGE_SIZE];
        {
            let mut catalog = CatalogPage::new(&mut data);
            catalog.init();
        }

        self.num_pages.store(1, Ordering::SeqCst);
        self.write_page(CATALOG_PAGE_ID, &data)
    }

    fn validate_catalog_page(&self) -> Result<()> {
        let mut data = [0u8; PAGE_SIZE];
        self.read_page(CATALOG_PAGE_ID, &mut data)?;

        let catalog = CatalogPageRef::new(&data);
        if !catalog.is_valid() {
            return Err(BriarError::InvalidDatabaseFile);
        }
        Ok(())
    }

    /// Reads a page from disk into the provided buffer.
    /// Reads past the end of the file yield zeroed bytes.
    pub fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");

        let byte_offset = (page_id.as_u32() as u64) * (PAGE_SIZE as u64);

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(byte_offset))?;

        let bytes_read = file.read(data)?;
        if bytes_read < PAGE_SIZE {
            data[bytes_read..].fill(0);
        }

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Writes a page to disk from the provided buffer.
    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");

        let byte_offset = (page_id.as_u32() as u64) * (PAGE_SIZE as u64);

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(byte_offset))?;
        file.write_all(data)?;
        file.flush()?;

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Allocates a page, reusing a freed one when possible.
    /// The page contents are zeroed.
    pub fn allocate_page(&self) -> Result<PageId> {
        let page_id = {
            let mut free_pages = self.free_pages.lock();
            match free_pages.pop() {
                Some(pid) => pid,
                None => PageId::new(self.num_pages.fetch_add(1, Ordering::SeqCst)),
            }
        };

        let zeros = [0u8; PAGE_SIZE];
        self.write_page(page_id, &zeros)?;

        Ok(page_id)
    }

    /// Returns a page to the free list for reuse.
    pub fn deallocate_page(&self, page_id: PageId) -> Result<()> {
        if page_id == CATALOG_PAGE_ID {
            return Err(BriarError::InvalidPageId(page_id));
        }
        self.free_pages.lock().push(page_id);
        Ok(())
    }

    /// Returns whether the given page is currently on the free list.
    pub fn is_free(&self, page_id: PageId) -> bool {
        self.free_pages.lock().contains(&page_id)
    }

    pub fn get_num_pages(&self) -> u32 {
        self.num_pages.load(Ordering::Relaxed)
    }

    pub fn get_num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    pub fn get_num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn sync(&self) -> Result<()> {
        let file = self.file.lock();
        file.sync_all()?;
        Ok(())
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        let file = self.file.get_mut();
        let _ = file.sync_all();
    }
}
