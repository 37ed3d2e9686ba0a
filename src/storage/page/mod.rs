mod catalog_page;
mod slotted_page;

pub use catalog_page::*;
pub use slotted_page::*;
