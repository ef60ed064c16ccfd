use crate::error::{PlayerError, Result};
use crate::model::Settings;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const HOME_OVERRIDE_VAR: &str = "SHUFFLEBOX_HOME";
const SETTINGS_FILE: &str = "shufflebox_settings.json";
const DOCUMENTS_DIR: &str = "Documents";
const PLAYLIST_FILE: &str = "playlist.json";
const DROPPED_PLAYLIST_FILE: &str = "dropped_playlist.json";
const LOG_FILE: &str = "shufflebox.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub home: PathBuf,
    pub settings: PathBuf,
    pub playlist: PathBuf,
    pub dropped_playlist: PathBuf,
    pub log: PathBuf,
}

impl StorePaths {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self::rooted_at(home_dir()?))
    }

    pub fn rooted_at(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let documents = home.join(DOCUMENTS_DIR);
        Self {
            settings: home.join(SETTINGS_FILE),
            playlist: documents.join(PLAYLIST_FILE),
            dropped_playlist: documents.join(DROPPED_PLAYLIST_FILE),
            log: home.join(LOG_FILE),
            home,
        }
    }

    pub fn default_music_dir(&self) -> PathBuf {
        self.home.join("Music")
    }
}

fn home_dir() -> anyhow::Result<PathBuf> {
    if let Some(dir) = env::var_os(HOME_OVERRIDE_VAR) {
        return Ok(PathBuf::from(dir));
    }

    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("neither HOME nor USERPROFILE is set"))
}

/// Reads the settings file; a missing file yields defaults which are written back.
pub fn load_settings(paths: &StorePaths) -> Result<Settings> {
    if !paths.settings.exists() {
        let settings = Settings::default();
        save_settings(paths, &settings)?;
        info!(path = %paths.settings.display(), "created default settings");
        return Ok(settings);
    }

    read_json(&paths.settings)
}

pub fn save_settings(paths: &StorePaths, settings: &Settings) -> Result<()> {
    write_json(&paths.settings, settings)
}

pub fn export_playlist(paths: &StorePaths, tracks: &[PathBuf]) -> Result<()> {
    write_json(&paths.playlist, tracks)
}

pub fn import_playlist(paths: &StorePaths) -> Result<Vec<PathBuf>> {
    read_json(&paths.playlist)
}

pub fn export_dropped_playlist(paths: &StorePaths, tracks: &[PathBuf]) -> Result<()> {
    write_json(&paths.dropped_playlist, tracks)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).map_err(|err| PlayerError::persistence(path, err))?;
    serde_json::from_str(&raw).map_err(|source| PlayerError::Serialize {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes through a sibling temp file and renames it over the target.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| PlayerError::persistence(parent, err))?;
    }

    let json = serde_json::to_string_pretty(value).map_err(|source| PlayerError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|err| PlayerError::persistence(&tmp, err))?;
    fs::rename(&tmp, path).map_err(|err| PlayerError::persistence(path, err))?;
    debug!(path = %path.display(), "wrote json document");
    Ok(())
}
