pub mod file_filter;
pub mod work_items;

pub use file_filter::{dotted_extension, ExtensionFilter};
pub use work_items::{ItemKind, Scan, WorkItem, WorkScanner};
