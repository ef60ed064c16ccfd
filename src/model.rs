use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_VOLUME: u8 = 50;
pub const MAX_VOLUME: u8 = 120;

/// On-disk settings document: `{ "volume", "last_played", "playlist" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_volume")]
    pub volume: u8,
    #[serde(default)]
    pub last_played: Option<PathBuf>,
    #[serde(default)]
    pub playlist: Vec<PathBuf>,
}

fn default_volume() -> u8 {
    DEFAULT_VOLUME
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            last_played: None,
            playlist: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Repeat,
    PlaylistOnly,
    PlaylistOnlyNotRandom,
    DirSelectNotRandom,
}

impl Mode {
    pub const ALL: [Mode; 4] = [
        Mode::Repeat,
        Mode::PlaylistOnly,
        Mode::PlaylistOnlyNotRandom,
        Mode::DirSelectNotRandom,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Repeat => "Repeat",
            Self::PlaylistOnly => "Playlist Only",
            Self::PlaylistOnlyNotRandom => "Playlist Only Not Random",
            Self::DirSelectNotRandom => "Dir Select Not Random",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeFlags {
    pub repeat: bool,
    pub playlist_only: bool,
    pub playlist_only_not_random: bool,
    pub dir_select_not_random: bool,
}

impl ModeFlags {
    pub fn get(&self, mode: Mode) -> bool {
        match mode {
            Mode::Repeat => self.repeat,
            Mode::PlaylistOnly => self.playlist_only,
            Mode::PlaylistOnlyNotRandom => self.playlist_only_not_random,
            Mode::DirSelectNotRandom => self.dir_select_not_random,
        }
    }

    /// Flips one flag and returns its new value.
    pub fn toggle(&mut self, mode: Mode) -> bool {
        let flag = match mode {
            Mode::Repeat => &mut self.repeat,
            Mode::PlaylistOnly => &mut self.playlist_only,
            Mode::PlaylistOnlyNotRandom => &mut self.playlist_only_not_random,
            Mode::DirSelectNotRandom => &mut self.dir_select_not_random,
        };
        *flag = !*flag;
        *flag
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    Directory,
    Playlist,
}
