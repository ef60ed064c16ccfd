use rand::Rng;
use rand::seq::SliceRandom;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// The user-curated playlist. `dirty` tracks changes not yet written to the
/// exported playlist file.
#[derive(Debug, Clone, Default)]
pub struct PlaylistManager {
    tracks: Vec<PathBuf>,
    dirty: bool,
    focus: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRow {
    pub track: PathBuf,
    /// Byte range of the first match within the display string.
    pub span: Option<Range<usize>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResult {
    pub rows: Vec<SearchRow>,
    pub focus: Option<usize>,
}

impl PlaylistManager {
    pub fn from_tracks(tracks: Vec<PathBuf>) -> Self {
        Self {
            tracks,
            dirty: false,
            focus: None,
        }
    }

    pub fn tracks(&self) -> &[PathBuf] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Path> {
        self.tracks.get(index).map(PathBuf::as_path)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    pub fn focus(&self) -> Option<usize> {
        self.focus
    }

    pub fn set_focus(&mut self, focus: Option<usize>) {
        self.focus = focus.filter(|index| *index < self.tracks.len());
    }

    pub fn append(&mut self, track: PathBuf) {
        self.tracks.push(track);
        self.dirty = true;
    }

    pub fn append_many(&mut self, tracks: impl IntoIterator<Item = PathBuf>) -> usize {
        let before = self.tracks.len();
        self.tracks.extend(tracks);
        let added = self.tracks.len() - before;
        if added > 0 {
            self.dirty = true;
        }
        added
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.focus = None;
        self.dirty = true;
    }

    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.tracks.shuffle(rng);
        self.dirty = true;
    }

    pub fn sort(&mut self) {
        self.tracks.sort();
        self.dirty = true;
    }

    /// Replaces the contents with what was just read from the exported file.
    pub fn replace_from_file(&mut self, tracks: Vec<PathBuf>) {
        self.tracks = tracks;
        self.focus = None;
        self.dirty = false;
    }

    /// Annotates every entry whose path contains `needle` (case-insensitive)
    /// and moves focus to the first match, or clears it when nothing matches.
    pub fn search(&mut self, needle: &str) -> SearchResult {
        let rows: Vec<SearchRow> = self
            .tracks
            .iter()
            .map(|track| SearchRow {
                span: match_span(&track.to_string_lossy(), needle),
                track: track.clone(),
            })
            .collect();

        self.focus = rows.iter().position(|row| row.span.is_some());
        SearchResult {
            rows,
            focus: self.focus,
        }
    }
}

/// Byte range of the first case-insensitive occurrence of `needle`.
pub fn match_span(haystack: &str, needle: &str) -> Option<Range<usize>> {
    if needle.is_empty() {
        return None;
    }

    let wanted: Vec<char> = needle.chars().flat_map(char::to_lowercase).collect();
    haystack.char_indices().find_map(|(start, _)| {
        let mut pending = wanted.iter();
        let mut expect = pending.next();
        for (offset, ch) in haystack[start..].char_indices() {
            for lowered in ch.to_lowercase() {
                match expect {
                    Some(c) if *c == lowered => expect = pending.next(),
                    _ => return None,
                }
            }
            if expect.is_none() {
                return Some(start..start + offset + ch.len_utf8());
            }
        }
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn manager(names: &[&str]) -> PlaylistManager {
        PlaylistManager::from_tracks(names.iter().map(PathBuf::from).collect())
    }

    #[test]
    fn mutations_mark_dirty() {
        let mut playlist = manager(&[]);
        assert!(!playlist.is_dirty());

        playlist.append(PathBuf::from("/m/a.mp3"));
        assert!(playlist.is_dirty());
        playlist.mark_saved();

        assert_eq!(playlist.append_many(Vec::new()), 0);
        assert!(!playlist.is_dirty());
        assert_eq!(
            playlist.append_many(vec![PathBuf::from("/m/b.mp3"), PathBuf::from("/m/c.mp3")]),
            2
        );
        assert!(playlist.is_dirty());
        assert_eq!(playlist.len(), 3);
    }

    #[test]
    fn clear_empties_regardless_of_size() {
        let mut playlist = manager(&["a", "b", "c"]);
        playlist.set_focus(Some(1));
        playlist.clear();
        assert!(playlist.is_empty());
        assert_eq!(playlist.focus(), None);
        assert!(playlist.is_dirty());

        playlist.clear();
        assert!(playlist.is_empty());
    }

    #[test]
    fn search_annotates_first_match_and_focuses_it() {
        let mut playlist = manager(&["/music/Intro.mp3", "/music/Outro.mp3", "/music/intro-intro.flac"]);
        let result = playlist.search("INTRO");

        assert_eq!(result.rows.len(), 3);
        assert_eq!(result.rows[0].span, Some(7..12));
        assert_eq!(result.rows[1].span, None);
        assert_eq!(result.rows[2].span, Some(7..12));
        assert_eq!(result.focus, Some(0));
        assert_eq!(playlist.focus(), Some(0));
    }

    #[test]
    fn search_without_matches_clears_focus() {
        let mut playlist = manager(&["/m/a.mp3", "/m/b.mp3"]);
        playlist.set_focus(Some(1));
        let result = playlist.search("zzz");
        assert!(result.rows.iter().all(|row| row.span.is_none()));
        assert_eq!(result.focus, None);
        assert_eq!(playlist.focus(), None);
    }

    #[test]
    fn empty_search_term_annotates_nothing() {
        let mut playlist = manager(&["/m/a.mp3"]);
        let result = playlist.search("");
        assert_eq!(result.rows[0].span, None);
        assert_eq!(result.focus, None);
    }

    #[test]
    fn search_spans_respect_multibyte_characters() {
        let mut playlist = manager(&["/m/Ésta Canción.mp3"]);
        let result = playlist.search("canción");
        let span = result.rows[0].span.clone().expect("match");
        let display = "/m/Ésta Canción.mp3";
        assert_eq!(&display[span], "Canción");
    }

    #[test]
    fn focus_is_bounded_by_length() {
        let mut playlist = manager(&["a"]);
        playlist.set_focus(Some(4));
        assert_eq!(playlist.focus(), None);
    }

    #[test]
    fn replacing_from_file_is_clean() {
        let mut playlist = manager(&["a"]);
        playlist.append(PathBuf::from("b"));
        playlist.replace_from_file(vec![PathBuf::from("z")]);
        assert!(!playlist.is_dirty());
        assert_eq!(playlist.tracks(), &[PathBuf::from("z")]);
    }

    proptest::proptest! {
        #[test]
        fn shuffle_is_a_permutation(names in proptest::collection::vec("[a-c]{1,3}", 0..40), seed in proptest::prelude::any::<u64>()) {
            let mut playlist = PlaylistManager::from_tracks(names.iter().map(PathBuf::from).collect());
            let mut rng = SmallRng::seed_from_u64(seed);
            playlist.shuffle(&mut rng);

            let mut before: Vec<PathBuf> = names.iter().map(PathBuf::from).collect();
            let mut after = playlist.tracks().to_vec();
            before.sort();
            after.sort();
            proptest::prop_assert_eq!(before, after);
            proptest::prop_assert!(playlist.is_dirty());
        }
    }
}
