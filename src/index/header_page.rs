use crate::common::{PageId, INVALID_PAGE_ID, PAGE_SIZE};

/// The header page of an index file. Its first four bytes hold the root
/// page id; `INVALID_PAGE_ID` means the tree is empty.
const ROOT_PAGE_ID_OFFSET: usize = 0;

pub struct HeaderPage<'a> {
    data: &'a mut [u8],
}

impl<'a> HeaderPage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn init(&mut self) {
        self.data.fill(0);
        self.set_root_page_id(INVALID_PAGE_ID);
    }

    pub fn root_page_id(&self) -> PageId {
        let bytes: [u8; 4] = self.data[ROOT_PAGE_ID_OFFSET..ROOT_PAGE_ID_OFFSET + 4]
            .try_into()
            .unwrap();
        PageId::new(u32::from_le_bytes(bytes))
    }

    pub fn set_root_page_id(&mut self, page_id: PageId) {
        self.data[ROOT_PAGE_ID_OFFSET..ROOT_PAGE_ID_OFFSET + 4]
            .copy_from_slice(&page_id.as_u32().to_le_bytes());
    }
}

/// Read-only view of a header page.
pub struct HeaderPageRef<'a> {
    data: &'a [u8],
}

impl<'a> HeaderPageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn root_page_id(&self) -> PageId {
        let bytes: [u8; 4] = self.data[ROOT_PAGE_ID_OFFSET..ROOT_PAGE_ID_OFFSET + 4]
            .try_into()
            .unwrap();
        PageId::new(u32::from_le_bytes(bytes))
    }
}
