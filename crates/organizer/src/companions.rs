//! Companion file discovery.
//!
//! A companion sits in the same directory as a video and its stem equals the
//! video's stem or starts with it (case-insensitive):
//! - `Movie.srt`       → `{base}.srt`
//! - `Movie.en.srt`    → `{base}.en.srt`
//! - `Movie-poster.jpg`→ `{base}-poster.jpg`

use std::path::{Path, PathBuf};

use mediasort_core::config::{ExtensionSettings, dotted_extension};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompanionKind {
    Subtitle,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Companion {
    pub path: PathBuf,
    pub kind: CompanionKind,
    /// Stem text after the video's stem, kept so that several languages of
    /// one subtitle do not collide.
    pub suffix: String,
    /// Lowercased, with the leading dot.
    pub extension: String,
}

impl Companion {
    pub fn destination_name(&self, base: &str) -> String {
        format!("{base}{}{}", self.suffix, self.extension)
    }
}

pub fn discover_companions(video: &Path, exts: &ExtensionSettings) -> Vec<Companion> {
    let Some(parent) = video.parent() else {
        return Vec::new();
    };
    let Some(video_stem) = video.file_stem().and_then(|s| s.to_str()) else {
        return Vec::new();
    };
    let video_stem_lower = video_stem.to_lowercase();

    let entries = match std::fs::read_dir(parent) {
        Ok(e) => e,
        Err(_) => return Vec::new(),
    };

    let mut results = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path == video || !path.is_file() {
            continue;
        }

        let extension = dotted_extension(&path);
        let kind = if exts.is_subtitle(&extension) {
            CompanionKind::Subtitle
        } else if exts.is_image(&extension) {
            CompanionKind::Image
        } else {
            continue;
        };

        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if !stem.to_lowercase().starts_with(&video_stem_lower) {
            continue;
        }

        let suffix = stem
            .get(video_stem.len()..)
            .unwrap_or_default()
            .to_string();
        results.push(Companion {
            path,
            kind,
            suffix,
            extension,
        });
    }

    results.sort_by(|a, b| a.path.cmp(&b.path));
    results
}
