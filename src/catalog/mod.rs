//! The database directory: maps index file names to header pages.

use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::{BriarError, PageId, Result};
use crate::storage::disk::CATALOG_PAGE_ID;
use crate::storage::page::{CatalogPage, CatalogPageRef};

/// Catalog wraps the catalog page (page 0) with name-based lookups.
pub struct Catalog {
    bpm: Arc<BufferPoolManager>,
}

impl Catalog {
    pub fn new(bpm: Arc<BufferPoolManager>) -> Self {
        Self { bpm }
    }

    /// Looks up the header page bound to `name`.
    pub fn get_file_entry(&self, name: &str) -> Result<Option<PageId>> {
        let guard = self
            .bpm
            .checked_read_page(CATALOG_PAGE_ID)?
            .ok_or(BriarError::PageNotFound(CATALOG_PAGE_ID))?;
        let catalog = CatalogPageRef::new(guard.data());

        if !catalog.is_valid() {
            return Err(BriarError::InvalidDatabaseFile);
        }

        Ok(catalog.find_file(name))
    }

    /// Binds `name` to a header page.
    pub fn add_file_entry(&self, name: &str, header_page_id: PageId) -> Result<()> {
        let mut guard = self
            .bpm
            .checked_write_page(CATALOG_PAGE_ID)?
            .ok_or(BriarError::PageNotFound(CATALOG_PAGE_ID))?;
        let mut catalog = CatalogPage::new(guard.data_mut());

        catalog.add_file(name, header_page_id)
    }

    /// Removes the binding for `name`, returning its header page.
    pub fn delete_file_entry(&self, name: &str) -> Result<PageId> {
        let mut guard = self
            .bpm
            .checked_write_page(CATALOG_PAGE_ID)?
            .ok_or(BriarError::PageNotFound(CATALOG_PAGE_ID))?;
        let mut catalog = CatalogPage::new(guard.data_mut());

        catalog.remove_file(name)
    }
}
