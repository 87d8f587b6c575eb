use std::path::Path;

use mediasort_core::Settings;
use mediasort_core::config::dotted_extension;

/// Pre-pipeline classification of a candidate path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    Video,
    /// Only ever moved as a companion of a video.
    Subtitle,
    /// Only ever moved as a companion of a video.
    Image,
    Ignored,
    Unsupported,
    Incomplete,
}

impl FileClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Subtitle => "subtitle",
            Self::Image => "image",
            Self::Ignored => "ignored",
            Self::Unsupported => "unsupported",
            Self::Incomplete => "incomplete",
        }
    }
}

pub fn classify(settings: &Settings, path: &Path) -> FileClass {
    if settings.is_incomplete(path) {
        return FileClass::Incomplete;
    }

    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'));
    if hidden {
        return FileClass::Ignored;
    }

    let ext = dotted_extension(path);
    let exts = &settings.extensions;
    if exts.is_ignored(&ext) {
        FileClass::Ignored
    } else if exts.is_video(&ext) {
        FileClass::Video
    } else if exts.is_subtitle(&ext) {
        FileClass::Subtitle
    } else if exts.is_image(&ext) {
        FileClass::Image
    } else {
        FileClass::Unsupported
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings {
            source_dir: "/dl".into(),
            incomplete_dir: "/dl/incomplete".into(),
            ..Default::default()
        }
    }

    #[test]
    fn classifies_by_extension() {
        let s = settings();
        assert_eq!(classify(&s, Path::new("/dl/Movie.2020.MKV")), FileClass::Video);
        assert_eq!(classify(&s, Path::new("/dl/Movie.2020.en.srt")), FileClass::Subtitle);
        assert_eq!(classify(&s, Path::new("/dl/cover.JPG")), FileClass::Image);
        assert_eq!(classify(&s, Path::new("/dl/Movie.2020.nfo")), FileClass::Ignored);
        assert_eq!(classify(&s, Path::new("/dl/archive.zip")), FileClass::Unsupported);
        assert_eq!(classify(&s, Path::new("/dl/noext")), FileClass::Unsupported);
    }

    #[test]
    fn incomplete_directory_wins() {
        let s = settings();
        assert_eq!(
            classify(&s, Path::new("/dl/incomplete/Movie.2020.mkv")),
            FileClass::Incomplete
        );
    }

    #[test]
    fn hidden_files_are_ignored() {
        let s = settings();
        assert_eq!(classify(&s, Path::new("/dl/.Movie.2020.mkv")), FileClass::Ignored);
    }
}
