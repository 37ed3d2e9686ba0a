//! Integration tests for the buffer pool manager

use std::sync::Arc;
use std::thread;

use briar::buffer::BufferPoolManager;
use briar::common::{BriarError, PageId};
use briar::storage::disk::DiskManager;
use briar::storage::page::{PageType, SlottedPage, SlottedPageRef};
use briar::SlotId;
use tempfile::NamedTempFile;

fn create_bpm(pool_size: usize) -> (BufferPoolManager, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
    let bpm = BufferPoolManager::new(pool_size, 2, dm);
    (bpm, temp_file)
}

#[test]
fn test_buffer_pool_basic_operations() {
    let (bpm, _temp) = create_bpm(10);

    // Page 0 is the catalog, so the first data page is 1
    let page_id = bpm.new_page().unwrap();
    assert_eq!(page_id, PageId::new(1));

    {
        let mut guard = bpm.checked_write_page(page_id).unwrap().unwrap();
        guard.data_mut()[0] = 0xDE;
        guard.data_mut()[1] = 0xAD;
        guard.data_mut()[2] = 0xBE;
        guard.data_mut()[3] = 0xEF;
    }

    {
        let guard = bpm.checked_read_page(page_id).unwrap().unwrap();
        assert_eq!(guard.data()[0], 0xDE);
        assert_eq!(guard.data()[1], 0xAD);
        assert_eq!(guard.data()[2], 0xBE);
        assert_eq!(guard.data()[3], 0xEF);
    }
}

#[test]
fn test_buffer_pool_persistence() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    let page_id;
    let test_data = b"Persistence test data";

    {
        let dm = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = BufferPoolManager::new(10, 2, dm);

        page_id = bpm.new_page().unwrap();

        {
            let mut guard = bpm.checked_write_page(page_id).unwrap().unwrap();
            guard.data_mut()[..test_data.len()].copy_from_slice(test_data);
        }

        bpm.flush_page(page_id).unwrap();
    }

    {
        let dm = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = BufferPoolManager::new(10, 2, dm);

        let guard = bpm.checked_read_page(page_id).unwrap().unwrap();
        assert_eq!(&guard.data()[..test_data.len()], test_data);
    }
}

#[test]
fn test_buffer_pool_eviction() {
    let (bpm, _temp) = create_bpm(3);

    let mut page_ids = Vec::new();
    for i in 0..3 {
        let pid = bpm.new_page().unwrap();
        {
            let mut guard = bpm.checked_write_page(pid).unwrap().unwrap();
            guard.data_mut()[0] = i as u8;
        }
        page_ids.push(pid);
    }

    for &pid in &page_ids {
        assert_eq!(bpm.get_pin_count(pid), Some(0));
    }

    // Creating a new page evicts one of the unpinned frames
    let new_pid = bpm.new_page().unwrap();
    assert_eq!(new_pid, PageId::new(4)); // pages 1,2,3 exist, new is 4

    // The evicted page's data comes back from disk
    for (i, &pid) in page_ids.iter().enumerate() {
        let guard = bpm.checked_read_page(pid).unwrap().unwrap();
        assert_eq!(guard.data()[0], i as u8);
    }
}

#[test]
fn test_buffer_pool_pin_prevents_eviction() {
    let (bpm, _temp) = create_bpm(2);

    let pid1 = bpm.new_page().unwrap();
    let pid2 = bpm.new_page().unwrap();

    let _guard1 = bpm.checked_read_page(pid1).unwrap().unwrap();
    let _guard2 = bpm.checked_read_page(pid2).unwrap().unwrap();

    let result = bpm.new_page();
    assert!(matches!(result, Err(BriarError::BufferPoolFull)));
}

#[test]
fn test_buffer_pool_delete_page() {
    let (bpm, _temp) = create_bpm(10);

    let pid = bpm.new_page().unwrap();

    {
        let mut guard = bpm.checked_write_page(pid).unwrap().unwrap();
        guard.data_mut()[0] = 42;
    }

    assert!(bpm.delete_page(pid).unwrap());

    assert_eq!(bpm.get_pin_count(pid), None);
    assert!(bpm.disk_manager().is_free(pid));
}

#[test]
fn test_buffer_pool_cannot_delete_pinned_page() {
    let (bpm, _temp) = create_bpm(10);

    let pid = bpm.new_page().unwrap();
    let _guard = bpm.checked_read_page(pid).unwrap().unwrap();

    let result = bpm.delete_page(pid);
    assert!(matches!(result, Err(BriarError::PageStillPinned(_))));
}

#[test]
fn test_buffer_pool_flush_all() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    let page_ids;

    {
        let dm = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = BufferPoolManager::new(10, 2, dm);

        page_ids = (0..5)
            .map(|i| {
                let pid = bpm.new_page().unwrap();
                {
                    let mut guard = bpm.checked_write_page(pid).unwrap().unwrap();
                    guard.data_mut()[0] = i as u8;
                }
                pid
            })
            .collect::<Vec<_>>();

        bpm.flush_all_pages().unwrap();
    }

    {
        let dm = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = BufferPoolManager::new(10, 2, dm);

        for (i, &pid) in page_ids.iter().enumerate() {
            let guard = bpm.checked_read_page(pid).unwrap().unwrap();
            assert_eq!(guard.data()[0], i as u8);
        }
    }
}

#[test]
fn test_buffer_pool_concurrent_access() {
    let (bpm, _temp) = create_bpm(10);
    let bpm = Arc::new(bpm);

    let page_id = bpm.new_page().unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let bpm = Arc::clone(&bpm);
            thread::spawn(move || {
                for _ in 0..100 {
                    let guard = bpm.checked_read_page(page_id).unwrap().unwrap();
                    let _ = guard.data()[0];
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_buffer_pool_with_slotted_pages() {
    let (bpm, _temp) = create_bpm(10);

    let page_id = bpm.new_page().unwrap();

    {
        let mut guard = bpm.checked_write_page(page_id).unwrap().unwrap();
        let mut page = SlottedPage::new(guard.data_mut());
        page.init(page_id, PageType::Leaf);

        page.insert_record_at(SlotId::new(0), b"first record").unwrap();
        page.insert_record_at(SlotId::new(1), b"second record").unwrap();
        page.insert_record_at(SlotId::new(2), b"third record").unwrap();

        assert_eq!(page.num_records(), 3);
    }

    {
        let guard = bpm.checked_read_page(page_id).unwrap().unwrap();
        let page = SlottedPageRef::new(guard.data());

        assert_eq!(page.num_records(), 3);
        assert_eq!(page.get_record(SlotId::new(0)).unwrap(), b"first record");
        assert_eq!(page.get_record(SlotId::new(1)).unwrap(), b"second record");
        assert_eq!(page.get_record(SlotId::new(2)).unwrap(), b"third record");
    }
}

#[test]
fn test_buffer_pool_large_workload() {
    let (bpm, _temp) = create_bpm(5); // small pool to force evictions

    let page_ids: Vec<_> = (0..20).map(|_| bpm.new_page().unwrap()).collect();

    for &pid in &page_ids {
        let mut guard = bpm.checked_write_page(pid).unwrap().unwrap();
        let id_bytes = pid.as_u32().to_le_bytes();
        guard.data_mut()[..4].copy_from_slice(&id_bytes);
    }

    for &pid in &page_ids {
        let guard = bpm.checked_read_page(pid).unwrap().unwrap();
        let id_bytes: [u8; 4] = guard.data()[..4].try_into().unwrap();
        assert_eq!(u32::from_le_bytes(id_bytes), pid.as_u32());
    }
}
