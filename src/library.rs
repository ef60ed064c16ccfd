use crate::error::{PlayerError, Result};
use lofty::prelude::{Accessor, TaggedFileExt};
use lofty::probe::Probe;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use walkdir::WalkDir;

pub const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "flac", "m4a", "m4b", "m4p", "mpc", "ogg", "oga", "mogg", "raw", "wma", "wv",
    "webm", "cda", "3gp", "aa", "aac", "aax", "alac", "aiff", "dsd", "mqa",
];

pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "webm", "vob", "avi", "wmv", "m2ts", "ts", "m4v",
];

const SEARCH_URL: &str = "https://www.google.com/search?q=";

pub fn is_audio(path: &Path) -> bool {
    has_extension(path, AUDIO_EXTENSIONS)
}

pub fn is_video(path: &Path) -> bool {
    has_extension(path, VIDEO_EXTENSIONS)
}

fn has_extension(path: &Path, set: &[&str]) -> bool {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    set.iter().any(|supported| ext.eq_ignore_ascii_case(supported))
}

/// Walks `root` depth-first. Within each directory, files come first in name
/// order, then subdirectories in name order; only supported audio survives.
pub fn scan_directory(root: &Path) -> Result<Vec<PathBuf>> {
    scan_directory_until(root, &AtomicBool::new(false))
}

/// Like [`scan_directory`], but stops walking once `cancel` is set and
/// returns whatever was found up to that point.
pub fn scan_directory_until(root: &Path, cancel: &AtomicBool) -> Result<Vec<PathBuf>> {
    let root = std::path::absolute(root).map_err(|err| PlayerError::Scan {
        root: root.to_path_buf(),
        reason: err.to_string(),
    })?;

    fs::read_dir(&root).map_err(|err| PlayerError::Scan {
        root: root.clone(),
        reason: err.to_string(),
    })?;

    let tracks = WalkDir::new(&root)
        .follow_links(true)
        .sort_by(|a, b| {
            a.file_type()
                .is_dir()
                .cmp(&b.file_type().is_dir())
                .then_with(|| a.file_name().cmp(b.file_name()))
        })
        .into_iter()
        .take_while(|_| !cancel.load(Ordering::Relaxed))
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file() && is_audio(entry.path()))
        .map(walkdir::DirEntry::into_path)
        .collect();

    Ok(tracks)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackTags {
    pub title: Option<String>,
    pub artist: Option<String>,
}

pub fn read_tags(path: &Path) -> Result<TrackTags> {
    let metadata_error = |reason: String| PlayerError::Metadata {
        path: path.to_path_buf(),
        reason,
    };

    let tagged_file = Probe::open(path)
        .and_then(|probe| probe.read())
        .map_err(|err| metadata_error(err.to_string()))?;

    let tag = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())
        .ok_or_else(|| metadata_error(String::from("no tags present")))?;

    Ok(TrackTags {
        title: tag.title().and_then(|value| clean_tag_value(&value)),
        artist: tag.artist().and_then(|value| clean_tag_value(&value)),
    })
}

fn clean_tag_value(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn file_title(path: &Path) -> String {
    path.file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or("unknown")
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongLookup {
    pub title: String,
    pub artist: String,
    pub url: String,
}

impl SongLookup {
    pub fn query(&self) -> String {
        format!("{} {} song", self.artist, self.title)
    }
}

/// Builds a web search for the track. Tag failures fall back to the file
/// name with an empty artist; the error is handed back for reporting.
pub fn lookup_song(path: &Path) -> (SongLookup, Option<PlayerError>) {
    let (tags, error) = match read_tags(path) {
        Ok(tags) => (tags, None),
        Err(err) => (TrackTags::default(), Some(err)),
    };

    let title = tags.title.unwrap_or_else(|| file_title(path));
    let artist = tags.artist.unwrap_or_default();
    let mut lookup = SongLookup {
        title,
        artist,
        url: String::new(),
    };
    lookup.url = format!("{SEARCH_URL}{}", encode_query(&lookup.query()));
    (lookup, error)
}

fn encode_query(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(char::from(byte))
            }
            b' ' => out.push('+'),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, b"not really audio").expect("write fixture");
    }

    #[test]
    fn audio_extensions_match_case_insensitively() {
        assert!(is_audio(Path::new("/m/a.mp3")));
        assert!(is_audio(Path::new("/m/a.FLAC")));
        assert!(is_audio(Path::new("/m/a.Wv")));
        assert!(!is_audio(Path::new("/m/a.txt")));
        assert!(!is_audio(Path::new("/m/mp3")));
        assert!(is_video(Path::new("/m/clip.MKV")));
        assert!(!is_video(Path::new("/m/a.mp3")));
    }

    #[test]
    fn scan_orders_files_before_subdirectories() {
        let dir = tempdir().expect("tempdir");
        let root = dir.path();
        touch(&root.join("c.mp3"));
        touch(&root.join("a.MP3"));
        touch(&root.join("notes.txt"));
        touch(&root.join("album").join("02.flac"));
        touch(&root.join("album").join("01.flac"));
        touch(&root.join("album").join("cover.jpg"));
        touch(&root.join("b-side").join("x.ogg"));

        let tracks = scan_directory(root).expect("scan");
        let relative: Vec<PathBuf> = tracks
            .iter()
            .map(|path| path.strip_prefix(root).expect("under root").to_path_buf())
            .collect();

        assert_eq!(
            relative,
            vec![
                PathBuf::from("a.MP3"),
                PathBuf::from("c.mp3"),
                PathBuf::from("album/01.flac"),
                PathBuf::from("album/02.flac"),
                PathBuf::from("b-side/x.ogg"),
            ]
        );
        assert!(tracks.iter().all(|path| path.is_absolute()));
    }

    #[test]
    fn scan_of_missing_root_is_a_scan_error() {
        let dir = tempdir().expect("tempdir");
        let err = scan_directory(&dir.path().join("nope")).expect_err("missing root");
        assert!(matches!(err, PlayerError::Scan { .. }));
    }

    #[test]
    fn scan_of_empty_directory_is_empty() {
        let dir = tempdir().expect("tempdir");
        touch(&dir.path().join("readme.md"));
        assert!(scan_directory(dir.path()).expect("scan").is_empty());
    }

    #[test]
    fn cancelled_scan_stops_walking() {
        let dir = tempdir().expect("tempdir");
        touch(&dir.path().join("a.mp3"));
        touch(&dir.path().join("album").join("b.mp3"));

        let cancel = AtomicBool::new(true);
        let tracks = scan_directory_until(dir.path(), &cancel).expect("scan");
        assert!(tracks.is_empty());

        cancel.store(false, Ordering::Relaxed);
        assert_eq!(scan_directory_until(dir.path(), &cancel).expect("scan").len(), 2);
    }

    #[test]
    fn lookup_falls_back_to_file_name() {
        let dir = tempdir().expect("tempdir");
        let track = dir.path().join("Blue Monday.mp3");
        touch(&track);

        let (lookup, error) = lookup_song(&track);
        assert!(matches!(error, Some(PlayerError::Metadata { .. })));
        assert_eq!(lookup.title, "Blue Monday");
        assert_eq!(lookup.artist, "");
        assert_eq!(lookup.query(), " Blue Monday song");
        assert_eq!(
            lookup.url,
            "https://www.google.com/search?q=+Blue+Monday+song"
        );
    }

    #[test]
    fn query_encoding_escapes_reserved_bytes() {
        assert_eq!(encode_query("AC/DC & co"), "AC%2FDC+%26+co");
        assert_eq!(encode_query("Björk"), "Bj%C3%B6rk");
    }
}
