use std::fs;
use std::io;
use std::path::PathBuf;

use tokio::sync::broadcast;
use tracing::warn;

use crate::models::{Movie, Theme};

pub const FAVORITES_KEY: &str = "favorites.json";
pub const RECENTLY_VIEWED_KEY: &str = "recently_viewed.json";
pub const THEME_KEY: &str = "theme";

const RECENTLY_VIEWED_CAP: usize = 10;
const EVENT_CAPACITY: usize = 16;

/// Raised by the store itself after every favorites/recently-viewed
/// mutation. Payload-less: listeners re-read the store on receipt. Delivery
/// is advisory; a listener that misses an event catches up on its next read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    FavoritesChanged,
    RecentlyViewedChanged,
}

pub trait StoreBackend: Send + Sync {
    fn read(&self, key: &str) -> io::Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> io::Result<()>;
}

/// One file per key under a data directory.
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }
}

impl StoreBackend for FileBackend {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.dir.join(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        fs::write(self.dir.join(key), value)
    }
}

/// Favorites, recently-viewed history and theme. Reads degrade to defaults
/// on corrupt or unreadable data; writes are last-writer-wins. Never fails
/// outward.
pub struct MovieStore {
    backend: Box<dyn StoreBackend>,
    events: broadcast::Sender<StoreEvent>,
}

impl MovieStore {
    pub fn new(backend: Box<dyn StoreBackend>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { backend, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: StoreEvent) {
        // No listeners is fine.
        let _ = self.events.send(event);
    }

    fn read_list(&self, key: &str) -> Vec<Movie> {
        let raw = match self.backend.read(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("reading {} failed: {}", key, e);
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(list) => list,
            Err(e) => {
                warn!("{} is corrupt, treating as empty: {}", key, e);
                Vec::new()
            }
        }
    }

    fn write_list(&self, key: &str, list: &[Movie]) {
        let raw = match serde_json::to_string(list) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("serializing {} failed: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.backend.write(key, &raw) {
            warn!("writing {} failed: {}", key, e);
        }
    }

    pub fn favorites(&self) -> Vec<Movie> {
        self.read_list(FAVORITES_KEY)
    }

    /// Writes the full ordered list; this is also the reorder path.
    pub fn save_favorites(&self, favorites: &[Movie]) {
        self.write_list(FAVORITES_KEY, favorites);
        self.emit(StoreEvent::FavoritesChanged);
    }

    pub fn add_favorite(&self, movie: &Movie) {
        let mut favorites = self.favorites();
        if favorites.iter().any(|f| f.imdb_id == movie.imdb_id) {
            return;
        }
        favorites.push(movie.clone());
        self.save_favorites(&favorites);
    }

    pub fn remove_favorite(&self, imdb_id: &str) {
        let mut favorites = self.favorites();
        let before = favorites.len();
        favorites.retain(|f| f.imdb_id != imdb_id);
        if favorites.len() != before {
            self.save_favorites(&favorites);
        }
    }

    pub fn is_favorite(&self, imdb_id: &str) -> bool {
        self.favorites().iter().any(|f| f.imdb_id == imdb_id)
    }

    pub fn clear_favorites(&self) {
        self.save_favorites(&[]);
    }

    pub fn recently_viewed(&self) -> Vec<Movie> {
        self.read_list(RECENTLY_VIEWED_KEY)
    }

    /// Re-viewing moves the entry to the front instead of duplicating it;
    /// the list never exceeds ten entries.
    pub fn add_recently_viewed(&self, movie: &Movie) {
        let mut recent = self.recently_viewed();
        recent.retain(|m| m.imdb_id != movie.imdb_id);
        recent.insert(0, movie.clone());
        recent.truncate(RECENTLY_VIEWED_CAP);
        self.write_list(RECENTLY_VIEWED_KEY, &recent);
        self.emit(StoreEvent::RecentlyViewedChanged);
    }

    pub fn theme(&self) -> Theme {
        match self.backend.read(THEME_KEY) {
            Ok(Some(raw)) => Theme::parse(raw.trim()).unwrap_or_default(),
            Ok(None) => Theme::default(),
            Err(e) => {
                warn!("reading {} failed: {}", THEME_KEY, e);
                Theme::default()
            }
        }
    }

    pub fn save_theme(&self, theme: Theme) {
        if let Err(e) = self.backend.write(THEME_KEY, theme.as_str()) {
            warn!("writing {} failed: {}", THEME_KEY, e);
        }
    }
}
