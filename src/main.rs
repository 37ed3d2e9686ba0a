use std::sync::Arc;

use briar::buffer::BufferPoolManager;
use briar::common::{DEFAULT_BUFFER_POOL_SIZE, DEFAULT_LRUK_K};
use briar::index::BTreeFile;
use briar::storage::disk::DiskManager;
use briar::{PageId, RecordId, SlotId};

fn main() {
    tracing_subscriber::fmt::init();

    println!("Briar - a disk-resident B+-tree index");
    println!("=====================================\n");

    let db_path = "demo.db";

    let disk_manager = Arc::new(DiskManager::new(db_path).expect("Failed to create disk manager"));
    println!("Opened database file: {}", db_path);

    let bpm = Arc::new(BufferPoolManager::new(
        DEFAULT_BUFFER_POOL_SIZE,
        DEFAULT_LRUK_K,
        disk_manager,
    ));
    println!(
        "Created buffer pool with {} frames\n",
        DEFAULT_BUFFER_POOL_SIZE
    );

    let mut index = BTreeFile::open("demo_index", bpm).expect("Failed to open index");

    // Index a few customer names, each pointing at an external tuple.
    let customers = [
        ("acme", 3, 0),
        ("globex", 3, 1),
        ("initech", 4, 0),
        ("umbrella", 4, 1),
        ("wayne", 5, 0),
    ];

    for (name, page, slot) in customers {
        let rid = RecordId::new(PageId::new(page), SlotId::new(slot));
        index
            .insert(name.as_bytes(), rid)
            .expect("Failed to insert");
        println!("Indexed {:10} -> {}", name, rid);
    }

    println!("\nScanning [\"g\", \"v\"]:");
    let mut scan = index
        .open_scan(Some(b"g"), Some(b"v"))
        .expect("Failed to open scan");
    while let Some((key, rid)) = scan.next().expect("Scan failed") {
        println!("  {:10} -> {}", String::from_utf8_lossy(&key), rid);
    }

    println!();
    index.print_whole().expect("Failed to print tree");

    println!();
    index.dump_statistics().expect("Failed to dump statistics");

    index.destroy().expect("Failed to destroy index");
    std::fs::remove_file(db_path).ok();
    println!("\nDemo completed successfully!");
}
