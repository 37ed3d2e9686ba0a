pub mod btree_file;
pub mod btree_scan;
pub mod entry;
pub mod header_page;
pub mod index_page;
pub mod leaf_page;

pub use btree_file::{BTreeFile, PrintOption, TreeStatistics};
pub use btree_scan::BTreeScan;
pub use header_page::{HeaderPage, HeaderPageRef};
pub use index_page::{IndexPage, IndexPageRef};
pub use leaf_page::{LeafPage, LeafPageRef};
