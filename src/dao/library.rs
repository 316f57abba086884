//! Song library: scans folders for karaoke videos and resolves typed codes to songs.

use std::{
    path::{Path, PathBuf},
    sync::{LazyLock, PoisonError, RwLock},
};

use indexmap::IndexMap;
use regex::Regex;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::{
    dao::storage::{StorageResult, read_json, write_json_atomic},
    state::karaoke::{MAX_CODE_LENGTH, Song},
};

/// Artist used when a file name carries no `Title - Artist` separator.
pub const UNKNOWN_ARTIST: &str = "Unknown";

static EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.mp4$").expect("valid extension pattern"));
static JUNK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\(.*?\)|\[.*?\]|\b(?:karaoke|instrumental|official|lyrics?|video|hd|version)\b",
    )
    .expect("valid junk pattern")
});
static SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*-\s*").expect("valid separator pattern"));
static SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid whitespace pattern"));

/// Resolves a queued code to a playable song.
pub trait SongLookup: Send + Sync {
    /// Song registered under `code`, if any.
    fn resolve(&self, code: &str) -> Option<Song>;
}

/// In-memory song index keyed by six-digit id, mirrored to `db.json`.
pub struct SongLibrary {
    songs: RwLock<IndexMap<String, Song>>,
    cache_path: PathBuf,
}

impl SongLibrary {
    /// Empty library mirrored to `cache_path`.
    pub fn new(cache_path: impl Into<PathBuf>) -> Self {
        Self {
            songs: RwLock::new(IndexMap::new()),
            cache_path: cache_path.into(),
        }
    }

    /// Load the index saved by the previous scan. Returns the number of songs loaded.
    pub async fn load_cache(&self) -> StorageResult<usize> {
        let Some(songs) = read_json::<Vec<Song>>(&self.cache_path).await? else {
            debug!(path = %self.cache_path.display(), "no song index cache");
            return Ok(0);
        };
        let count = songs.len();
        self.replace(songs);
        info!(count, "loaded song index from cache");
        Ok(count)
    }

    /// Rebuild the index from `roots` and save it to the cache. Returns the song count.
    pub async fn scan(&self, roots: Vec<PathBuf>) -> usize {
        info!(roots = ?roots, "scanning for songs");
        let songs = match tokio::task::spawn_blocking(move || collect_songs(&roots)).await {
            Ok(songs) => songs,
            Err(err) => {
                warn!(error = %err, "song scan task failed");
                return self.len();
            }
        };

        let count = songs.len();
        if let Err(err) = write_json_atomic(&self.cache_path, &songs).await {
            warn!(error = %err, "failed to save song index");
        }
        self.replace(songs);
        info!(count, "song index rebuilt");
        count
    }

    #[cfg(test)]
    pub(crate) fn with_songs(cache_path: impl Into<PathBuf>, songs: Vec<Song>) -> Self {
        let library = Self::new(cache_path);
        library.replace(songs);
        library
    }

    fn replace(&self, songs: Vec<Song>) {
        let index = songs
            .into_iter()
            .map(|song| (song.id.clone(), song))
            .collect();
        *self.songs.write().unwrap_or_else(PoisonError::into_inner) = index;
    }

    /// Song with exactly this id.
    pub fn get(&self, id: &str) -> Option<Song> {
        self.songs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Whether `id` is indexed.
    pub fn has(&self, id: &str) -> bool {
        self.songs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Whether a song file at `path` is already indexed.
    pub fn contains_path(&self, path: &Path) -> bool {
        let path = path.display().to_string();
        self.songs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .any(|song| song.path == path)
    }

    /// All songs in id order.
    pub fn list(&self) -> Vec<Song> {
        self.songs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Number of indexed songs.
    pub fn len(&self) -> usize {
        self.songs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no song is indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Map a typed code to a known id: exact match first, then with leading
    /// zeros trimmed, then its plain numeric form.
    pub fn resolve_code(&self, code: &str) -> Option<String> {
        if code.is_empty() {
            return None;
        }
        if self.has(code) {
            return Some(code.to_owned());
        }

        let trimmed = code.trim_start_matches('0');
        if !trimmed.is_empty() && self.has(trimmed) {
            return Some(trimmed.to_owned());
        }

        let numeric = if trimmed.is_empty() { code } else { trimmed };
        if let Ok(value) = numeric.parse::<u64>() {
            let numeric = value.to_string();
            if self.has(&numeric) {
                return Some(numeric);
            }
        }

        debug!(code, "no song matches code");
        None
    }

    /// Case-insensitive substring match on title or artist.
    pub fn search(&self, query: &str) -> Vec<Song> {
        let needle = query.to_lowercase();
        self.songs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|song| {
                song.title.to_lowercase().contains(&needle)
                    || song.artist.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }
}

impl SongLookup for SongLibrary {
    fn resolve(&self, code: &str) -> Option<Song> {
        self.resolve_code(code).and_then(|id| self.get(&id))
    }
}

/// Walk `roots` and build songs with sequential ids, in directory order.
pub fn collect_songs(roots: &[PathBuf]) -> Vec<Song> {
    let mut songs = Vec::new();

    for root in roots.iter().filter(|root| root.is_dir()) {
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "cannot read entry while scanning");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_song_file(entry.path()) {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy();
            let (title, artist) = parse_filename(&file_name);
            songs.push(Song {
                id: format!("{:0width$}", songs.len() + 1, width = MAX_CODE_LENGTH),
                title,
                artist,
                path: entry.path().display().to_string(),
            });
        }
    }

    songs
}

/// `.mp4` files, excluding partial downloads.
pub fn is_song_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    name.ends_with(".mp4") && !name.ends_with(".f136.mp4") && !name.ends_with(".temp.mp4")
}

/// Derive `(title, artist)` from a file name such as
/// `bohemian_rhapsody - queen (Karaoke Version).mp4`.
pub fn parse_filename(file_name: &str) -> (String, String) {
    let base = EXTENSION.replace(file_name, "");
    let base = base.replace('_', " ");
    let base = JUNK.replace_all(base.trim(), "");
    let base = SPACES.replace_all(base.trim(), " ");
    let base = base.trim();

    let parts: Vec<&str> = SEPARATOR
        .split(base)
        .filter(|part| !part.is_empty())
        .collect();

    match parts.split_first() {
        Some((title, rest)) if !rest.is_empty() => (
            title_case(title.trim()),
            title_case(rest.join(" - ").trim()),
        ),
        _ => (title_case(base), UNKNOWN_ARTIST.to_owned()),
    }
}

/// Capitalize each word; all-caps words (acronyms) are kept as they are.
fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            if word.to_uppercase() == word {
                return word.to_owned();
            }
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library_with(ids: &[&str]) -> SongLibrary {
        let library = SongLibrary::new("/nonexistent/db.json");
        library.replace(
            ids.iter()
                .map(|id| Song {
                    id: (*id).into(),
                    title: format!("Title {id}"),
                    artist: "Artist".into(),
                    path: format!("/songs/{id}.mp4"),
                })
                .collect(),
        );
        library
    }

    #[test]
    fn parses_title_and_artist() {
        assert_eq!(
            parse_filename("bohemian_rhapsody - queen (Karaoke Version).mp4"),
            ("Bohemian Rhapsody".into(), "Queen".into())
        );
        assert_eq!(
            parse_filename("ABBA - dancing queen [HD] Lyrics.MP4"),
            ("ABBA".into(), "Dancing Queen".into())
        );
    }

    #[test]
    fn missing_separator_yields_unknown_artist() {
        assert_eq!(
            parse_filename("my   favourite song official video.mp4"),
            ("My Favourite Song".into(), UNKNOWN_ARTIST.into())
        );
    }

    #[test]
    fn extra_separators_stay_in_artist() {
        assert_eq!(
            parse_filename("song - first - second.mp4"),
            ("Song".into(), "First - Second".into())
        );
    }

    #[test]
    fn resolves_exact_trimmed_and_numeric_codes() {
        let library = library_with(&["000001", "42", "7"]);
        assert_eq!(library.resolve_code("000001").as_deref(), Some("000001"));
        assert_eq!(library.resolve_code("000042").as_deref(), Some("42"));
        assert_eq!(library.resolve_code("7").as_deref(), Some("7"));
        assert_eq!(library.resolve_code("000099"), None);
        assert_eq!(library.resolve_code(""), None);
        assert_eq!(library.resolve("000042").unwrap().id, "42");
    }

    #[test]
    fn search_matches_title_or_artist() {
        let library = library_with(&["000001", "000002"]);
        assert_eq!(library.search("title 000002").len(), 1);
        assert_eq!(library.search("ARTIST").len(), 2);
        assert!(library.search("nothing").is_empty());
    }

    #[tokio::test]
    async fn scan_skips_partials_and_writes_cache() {
        let songs_dir = tempfile::tempdir().unwrap();
        let nested = songs_dir.path().join("nested");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(songs_dir.path().join("a - one.mp4"), b"").unwrap();
        std::fs::write(nested.join("b - two.mp4"), b"").unwrap();
        std::fs::write(songs_dir.path().join("c.f136.mp4"), b"").unwrap();
        std::fs::write(songs_dir.path().join("d.temp.mp4"), b"").unwrap();
        std::fs::write(songs_dir.path().join("notes.txt"), b"").unwrap();

        let data_dir = tempfile::tempdir().unwrap();
        let cache = data_dir.path().join("db.json");
        let library = SongLibrary::new(&cache);

        let count = library
            .scan(vec![songs_dir.path().to_path_buf(), PathBuf::from("/does/not/exist")])
            .await;
        assert_eq!(count, 2);
        assert_eq!(library.get("000001").unwrap().title, "A");
        assert_eq!(library.get("000002").unwrap().artist, "Two");

        let reloaded = SongLibrary::new(&cache);
        assert_eq!(reloaded.load_cache().await.unwrap(), 2);
        assert_eq!(reloaded.list(), library.list());
    }
}
