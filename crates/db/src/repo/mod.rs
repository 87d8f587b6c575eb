pub mod media_items;
pub mod pending_files;
pub mod processed_files;
