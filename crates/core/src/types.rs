use serde::{Deserialize, Serialize};

/// Catalog entry kind stored in the `media_item.kind` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Movie,
    Series,
    Episode,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Series => "series",
            Self::Episode => "episode",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "movie" => Some(Self::Movie),
            "series" => Some(Self::Series),
            "episode" => Some(Self::Episode),
            _ => None,
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal status of one pipeline run, stored in `processed_file.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Success,
    Error,
    SkippedDuplicate,
}

impl ProcessingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::SkippedDuplicate => "skipped_duplicate",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            "skipped_duplicate" => Some(Self::SkippedDuplicate),
            _ => None,
        }
    }

    /// Whether a record with this status marks its source path as done.
    pub fn is_completed(self) -> bool {
        matches!(self, Self::Success | Self::SkippedDuplicate)
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review state of a file waiting for a human to identify it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingStatus {
    Pending,
    Matched,
    Rejected,
}

impl PendingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Matched => "matched",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "matched" => Some(Self::Matched),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for PendingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// MD5 digest of a file's bytes plus its length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentFingerprint {
    pub digest: [u8; 16],
    pub size_bytes: i64,
}

impl ContentFingerprint {
    pub fn new(digest: [u8; 16], size_bytes: i64) -> Self {
        Self { digest, size_bytes }
    }

    /// Lowercase hex form used as the dedup key in the database.
    pub fn hash_hex(&self) -> String {
        hex::encode(self.digest)
    }

    pub fn from_hex(hash: &str, size_bytes: i64) -> Option<Self> {
        let bytes = hex::decode(hash).ok()?;
        let digest: [u8; 16] = bytes.try_into().ok()?;
        Some(Self { digest, size_bytes })
    }
}

impl std::fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} bytes)", self.hash_hex(), self.size_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_column_text() {
        for status in [
            ProcessingStatus::Success,
            ProcessingStatus::Error,
            ProcessingStatus::SkippedDuplicate,
        ] {
            assert_eq!(ProcessingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ProcessingStatus::parse("Skipped - Duplicate"), None);
    }

    #[test]
    fn only_success_and_duplicate_are_completed() {
        assert!(ProcessingStatus::Success.is_completed());
        assert!(ProcessingStatus::SkippedDuplicate.is_completed());
        assert!(!ProcessingStatus::Error.is_completed());
    }

    #[test]
    fn fingerprint_hex_is_32_chars() {
        let fp = ContentFingerprint::new([0xab; 16], 42);
        assert_eq!(fp.hash_hex().len(), 32);
        assert_eq!(ContentFingerprint::from_hex(&fp.hash_hex(), 42), Some(fp));
        assert_eq!(ContentFingerprint::from_hex("abcd", 42), None);
    }
}
