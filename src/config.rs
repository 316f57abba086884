//! Runtime configuration: the on-disk data layout and the user settings file (`config.json`).

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::storage::{StorageResult, write_json_atomic},
    dto::validation::validate_window_size,
    state::karaoke::{DEFAULT_KARAOKE_PORT, DEFAULT_REMOTE_PORT, IdleMode, ViewMode, WindowSize},
};

/// Environment variable overriding the data directory.
const DATA_DIR_ENV: &str = "KARAOKE_HOST_DATA_DIR";
/// Environment variable overriding the settings file location.
const CONFIG_PATH_ENV: &str = "KARAOKE_HOST_CONFIG_PATH";
/// Environment variable overriding the local API port.
const API_PORT_ENV: &str = "KARAOKE_HOST_API_PORT";
/// Port of the local REST API used by the remote control page.
pub const DEFAULT_API_PORT: u16 = 5151;
const APP_DIR_NAME: &str = "karaoke-host";

/// Where the host keeps its files.
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
    config_file: PathBuf,
}

impl DataPaths {
    /// Resolve the layout from the environment, defaulting to the platform data directory.
    pub fn resolve() -> Self {
        let root = env::var_os(DATA_DIR_ENV)
            .map(PathBuf::from)
            .filter(|path| !path.as_os_str().is_empty())
            .or_else(|| dirs::data_dir().map(|dir| dir.join(APP_DIR_NAME)))
            .unwrap_or_else(|| PathBuf::from("data"));

        let config_file = env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .filter(|path| !path.as_os_str().is_empty())
            .unwrap_or_else(|| root.join("config.json"));

        Self { root, config_file }
    }

    /// Layout rooted at `root` with the settings file inside it.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let config_file = root.join("config.json");
        Self { root, config_file }
    }

    /// Data directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Settings file, `config.json` unless overridden.
    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Snapshot of the karaoke session.
    pub fn state_file(&self) -> PathBuf {
        self.root.join("app_state").join("karaoke-state.json")
    }

    /// Single-instance lock file.
    pub fn lock_file(&self) -> PathBuf {
        self.root.join("app_state").join("karaoke.lock")
    }

    /// Cached song index.
    pub fn song_index(&self) -> PathBuf {
        self.root.join("db.json")
    }

    /// Folder scanned in addition to the configured search path.
    pub fn additional_songs(&self) -> PathBuf {
        self.root.join("additional_songs")
    }
}

/// Port of the local REST API.
pub fn api_port() -> u16 {
    env::var(API_PORT_ENV)
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(DEFAULT_API_PORT)
}

/// User settings as stored in `config.json`. Missing keys take their default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Image shown on the idle screen.
    pub background_path: String,
    /// Whether the idle screen shows the image or loops videos.
    pub idle_mode: IdleMode,
    /// Videos looped on the idle screen in video mode.
    pub idle_video_files: Vec<String>,
    /// Play background music while idle.
    pub looping_music: bool,
    /// Tracks played while idle.
    pub music_files: Vec<String>,
    /// Font file used by the display, empty for the default.
    pub custom_font: String,
    /// Window style of the display.
    pub view_mode: ViewMode,
    /// Window size in windowed mode.
    #[validate(custom(function = "validate_window_size"))]
    pub window_size: WindowSize,
    /// Port of the karaoke display server.
    #[validate(range(min = 1))]
    pub lan_port: u16,
    /// Port of the remote control server.
    #[validate(range(min = 1))]
    pub remote_port: u16,
    /// Folder scanned for songs.
    pub search_path: String,
    /// Let the display announce typed digits.
    pub announce_keys: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            background_path: String::new(),
            idle_mode: IdleMode::default(),
            idle_video_files: Vec::new(),
            looping_music: false,
            music_files: Vec::new(),
            custom_font: String::new(),
            view_mode: ViewMode::default(),
            window_size: WindowSize::default(),
            lan_port: DEFAULT_KARAOKE_PORT,
            remote_port: DEFAULT_REMOTE_PORT,
            search_path: String::new(),
            announce_keys: true,
        }
    }
}

impl Settings {
    /// Load settings from `path`, falling back to defaults when the file is missing or invalid.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Settings>(&contents) {
                Ok(settings) => {
                    info!(path = %path.display(), "loaded settings");
                    settings
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse settings; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "settings file not found; using defaults");
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read settings; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Write the settings back to `path`.
    pub async fn save(&self, path: &Path) -> StorageResult<()> {
        write_json_atomic(path, self).await?;
        info!(path = %path.display(), "settings saved");
        Ok(())
    }

    /// Folders the song library scans: the configured search path and the additional songs folder.
    pub fn song_roots(&self, paths: &DataPaths) -> Vec<PathBuf> {
        let mut roots = Vec::with_capacity(2);
        if self.search_path.is_empty() {
            warn!("no search path configured; only the additional songs folder is scanned");
        } else {
            roots.push(PathBuf::from(&self.search_path));
        }
        roots.push(paths.additional_songs());
        roots
    }
}

/// Partial settings update; absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub background_path: Option<String>,
    pub idle_mode: Option<IdleMode>,
    pub idle_video_files: Option<Vec<String>>,
    pub looping_music: Option<bool>,
    pub music_files: Option<Vec<String>>,
    pub custom_font: Option<String>,
    pub view_mode: Option<ViewMode>,
    pub window_size: Option<WindowSize>,
    pub lan_port: Option<u16>,
    pub remote_port: Option<u16>,
    pub search_path: Option<String>,
    pub announce_keys: Option<bool>,
}

impl SettingsUpdate {
    /// Overlay the provided fields on `current`.
    pub fn merge_into(self, current: &Settings) -> Settings {
        Settings {
            background_path: self
                .background_path
                .unwrap_or_else(|| current.background_path.clone()),
            idle_mode: self.idle_mode.unwrap_or(current.idle_mode),
            idle_video_files: self
                .idle_video_files
                .unwrap_or_else(|| current.idle_video_files.clone()),
            looping_music: self.looping_music.unwrap_or(current.looping_music),
            music_files: self
                .music_files
                .unwrap_or_else(|| current.music_files.clone()),
            custom_font: self.custom_font.unwrap_or_else(|| current.custom_font.clone()),
            view_mode: self.view_mode.unwrap_or(current.view_mode),
            window_size: self.window_size.unwrap_or(current.window_size),
            lan_port: self.lan_port.unwrap_or(current.lan_port),
            remote_port: self.remote_port.unwrap_or(current.remote_port),
            search_path: self.search_path.unwrap_or_else(|| current.search_path.clone()),
            announce_keys: self.announce_keys.unwrap_or(current.announce_keys),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("config.json"));
        assert_eq!(settings, Settings::default());
        assert!(settings.announce_keys);
        assert_eq!(settings.lan_port, 4545);
    }

    #[test]
    fn partial_file_is_merged_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"searchPath":"/music","viewMode":"windowed","windowSize":{"width":1280,"height":720}}"#,
        )
        .unwrap();

        let settings = Settings::load(&path);
        assert_eq!(settings.search_path, "/music");
        assert_eq!(settings.view_mode, ViewMode::Windowed);
        assert_eq!(settings.window_size.width, 1280);
        assert_eq!(settings.remote_port, 4646);
        assert_eq!(settings.idle_mode, IdleMode::Image);
    }

    #[test]
    fn garbage_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let settings = Settings {
            looping_music: true,
            music_files: vec!["/music/loop.mp3".into()],
            ..Settings::default()
        };
        settings.save(&path).await.unwrap();
        assert_eq!(Settings::load(&path), settings);
    }

    #[test]
    fn update_overlays_only_provided_fields() {
        let current = Settings {
            search_path: "/music".into(),
            ..Settings::default()
        };
        let update = SettingsUpdate {
            remote_port: Some(5000),
            announce_keys: Some(false),
            ..SettingsUpdate::default()
        };
        let merged = update.merge_into(&current);
        assert_eq!(merged.remote_port, 5000);
        assert!(!merged.announce_keys);
        assert_eq!(merged.search_path, "/music");
        assert_eq!(merged.lan_port, 4545);
    }

    #[test]
    fn invalid_ports_and_window_sizes_are_rejected() {
        let settings = Settings {
            lan_port: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            window_size: WindowSize {
                width: 10,
                height: 10,
            },
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn song_roots_include_additional_folder() {
        let paths = DataPaths::new("/data");
        let settings = Settings {
            search_path: "/music".into(),
            ..Settings::default()
        };
        assert_eq!(
            settings.song_roots(&paths),
            vec![PathBuf::from("/music"), PathBuf::from("/data/additional_songs")]
        );
        assert_eq!(Settings::default().song_roots(&paths).len(), 1);
    }
}
