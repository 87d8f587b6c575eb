pub mod config;
pub mod types;

pub use config::Settings;
pub use types::{ContentFingerprint, ItemKind, PendingStatus, ProcessingStatus};
