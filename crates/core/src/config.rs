//! Service configuration.
//!
//! Settings are read from a TOML file and then selectively overridden from
//! `MEDIASORT_*` environment variables. Every field has a default, so an
//! absent file yields a usable (if unconfigured) service.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub source_dir: PathBuf,
    pub incomplete_dir: PathBuf,
    pub movies_dir: PathBuf,
    pub tv_dir: PathBuf,
    pub tmdb_api_key: Option<String>,
    pub tvdb_api_key: Option<String>,
    pub image: ImageSettings,
    pub extensions: ExtensionSettings,
    pub notifications: NotificationSettings,
    pub scheduler: SchedulerSettings,
    pub database: DatabaseSettings,
    pub watch: WatchSettings,
    pub server: ServerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("/downloads"),
            incomplete_dir: PathBuf::from("/downloads/incomplete"),
            movies_dir: PathBuf::from("/media/Movies"),
            tv_dir: PathBuf::from("/media/TV Shows"),
            tmdb_api_key: None,
            tvdb_api_key: None,
            image: ImageSettings::default(),
            extensions: ExtensionSettings::default(),
            notifications: NotificationSettings::default(),
            scheduler: SchedulerSettings::default(),
            database: DatabaseSettings::default(),
            watch: WatchSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            max_width: 1000,
            max_height: 1500,
        }
    }
}

/// Extension allow/ignore lists. Entries are matched case-insensitively and
/// may be written with or without the leading dot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionSettings {
    pub video: Vec<String>,
    pub image: Vec<String>,
    pub subtitle: Vec<String>,
    pub ignored: Vec<String>,
}

impl Default for ExtensionSettings {
    fn default() -> Self {
        fn list(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }
        Self {
            video: list(&[".mp4", ".mkv", ".avi", ".mov", ".wmv", ".m4v"]),
            image: list(&[".jpg", ".jpeg", ".png"]),
            subtitle: list(&[".srt", ".sub", ".idx", ".ass"]),
            ignored: list(&[".nfo", ".txt", ".db", ".ini", ".log", ".part", ".!ut"]),
        }
    }
}

impl ExtensionSettings {
    pub fn is_video(&self, ext: &str) -> bool {
        contains_ext(&self.video, ext)
    }

    pub fn is_image(&self, ext: &str) -> bool {
        contains_ext(&self.image, ext)
    }

    pub fn is_subtitle(&self, ext: &str) -> bool {
        contains_ext(&self.subtitle, ext)
    }

    pub fn is_ignored(&self, ext: &str) -> bool {
        contains_ext(&self.ignored, ext)
    }
}

fn contains_ext(list: &[String], ext: &str) -> bool {
    let wanted = ext.trim_start_matches('.');
    !wanted.is_empty()
        && list
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(wanted))
}

/// Lowercased extension of `path` including the leading dot, or an empty
/// string when there is none.
pub fn dotted_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub notify_on_success: bool,
    pub notify_on_error: bool,
    pub notify_on_completion: bool,
    pub max_per_hour: u32,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            notify_on_success: false,
            notify_on_error: true,
            notify_on_completion: true,
            max_per_hour: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub enabled: bool,
    /// Recurring full scan of the source directory. Daily at midnight by default.
    pub scan_cron: String,
    pub duplicate_sweep_cron: String,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            scan_cron: "0 0 * * *".to_string(),
            duplicate_sweep_cron: "0 * * * *".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: String,
    pub check_for_duplicates: bool,
    pub skip_processed_files: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "mediasort.db".to_string(),
            check_for_duplicates: true,
            skip_processed_files: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    pub enabled: bool,
    /// A changed file is only handed to the pipeline once it has been quiet
    /// for this long.
    pub settle_secs: u64,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            settle_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Apply `MEDIASORT_*` overrides. `lookup` is `std::env::var` in the binary.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get("MEDIASORT_DB") {
            self.database.path = v;
        }
        if let Some(v) = get("MEDIASORT_BIND") {
            self.server.bind = v;
        }
        if let Some(v) = get("MEDIASORT_TMDB_KEY") {
            self.tmdb_api_key = Some(v);
        }
        if let Some(v) = get("MEDIASORT_TVDB_KEY") {
            self.tvdb_api_key = Some(v);
        }
        if let Some(v) = get("MEDIASORT_SOURCE_DIR") {
            self.source_dir = v.into();
        }
        if let Some(v) = get("MEDIASORT_MOVIES_DIR") {
            self.movies_dir = v.into();
        }
        if let Some(v) = get("MEDIASORT_TV_DIR") {
            self.tv_dir = v.into();
        }
    }

    /// Whether `path` is the incomplete-downloads directory or lies under
    /// it. Compared case-insensitively, whole components only.
    pub fn is_incomplete(&self, path: &Path) -> bool {
        let incomplete = self.incomplete_dir.to_string_lossy().to_lowercase();
        if incomplete.is_empty() {
            return false;
        }
        let path = path.to_string_lossy().to_lowercase();
        Path::new(&path).starts_with(Path::new(&incomplete))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let s = Settings::from_toml(
            r#"
            movies_dir = "/srv/movies"

            [image]
            max_width = 600

            [scheduler]
            enabled = true
            "#,
        )
        .unwrap();
        assert_eq!(s.movies_dir, PathBuf::from("/srv/movies"));
        assert_eq!(s.image.max_width, 600);
        assert_eq!(s.image.max_height, 1500);
        assert!(s.scheduler.enabled);
        assert_eq!(s.scheduler.scan_cron, "0 0 * * *");
        assert!(s.extensions.is_video(".mkv"));
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(s.notifications.max_per_hour, 10);
    }

    #[test]
    fn invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "movies_dir = [").unwrap();
        assert!(matches!(Settings::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn env_overrides_apply_and_ignore_blank() {
        let mut s = Settings::default();
        s.apply_overrides(|key| match key {
            "MEDIASORT_DB" => Some("/var/lib/ms.db".into()),
            "MEDIASORT_TMDB_KEY" => Some("  ".into()),
            _ => None,
        });
        assert_eq!(s.database.path, "/var/lib/ms.db");
        assert_eq!(s.tmdb_api_key, None);
    }

    #[test]
    fn extension_matching_ignores_case_and_dot() {
        let ext = ExtensionSettings {
            video: vec!["MKV".into()],
            ..Default::default()
        };
        assert!(ext.is_video(".mkv"));
        assert!(ext.is_video("mkv"));
        assert!(!ext.is_video(""));
        assert!(ExtensionSettings::default().is_ignored(".!ut"));
    }

    #[test]
    fn dotted_extension_lowercases() {
        assert_eq!(dotted_extension(Path::new("/a/Movie.MKV")), ".mkv");
        assert_eq!(dotted_extension(Path::new("/a/README")), "");
    }

    #[test]
    fn incomplete_prefix_is_case_insensitive() {
        let s = Settings {
            incomplete_dir: "/Downloads/Incomplete".into(),
            ..Default::default()
        };
        assert!(s.is_incomplete(Path::new("/downloads/incomplete/x.mkv")));
        assert!(!s.is_incomplete(Path::new("/downloads/done/x.mkv")));
    }

    #[test]
    fn incomplete_match_is_by_component() {
        let s = Settings {
            incomplete_dir: PathBuf::from("/dl/incomplete"),
            ..Default::default()
        };
        assert!(s.is_incomplete(Path::new("/DL/Incomplete/a.mkv")));
        assert!(s.is_incomplete(Path::new("/dl/incomplete")));
        assert!(!s.is_incomplete(Path::new("/dl/incomplete-movies/a.mkv")));
        assert!(!s.is_incomplete(Path::new("/dl/incompletely.mkv")));
    }
}
