use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use cinescout::app::App;
use cinescout::error::{Error, Result};
use cinescout::gemini::{GeminiApi, GenerationOptions};
use cinescout::models::{Movie, SearchResults, Sender, Video};
use cinescout::omdb::OmdbApi;
use cinescout::store::{FileBackend, MovieStore, StoreEvent};
use cinescout::youtube::YoutubeApi;

fn movie(imdb_id: &str, title: &str) -> Movie {
    Movie {
        id: cinescout::omdb::derived_id(imdb_id),
        imdb_id: imdb_id.to_string(),
        title: title.to_string(),
        poster_path: Some("https://posters.example/m.jpg".to_string()),
        release_date: "1999".to_string(),
        vote_average: 8.7,
        vote_count: Some(2_000_000),
        overview: "A hacker learns the truth.".to_string(),
        genres: Vec::new(),
        runtime: Some(136),
        cast: Vec::new(),
    }
}

fn trailer() -> Video {
    Video {
        id: "abc123".to_string(),
        title: "Official Trailer".to_string(),
        description: String::new(),
        thumbnail: "https://i.ytimg.com/hq.jpg".to_string(),
        url: "https://www.youtube.com/watch?v=abc123".to_string(),
    }
}

struct FakeOmdb {
    listing: Vec<Movie>,
    detail: Option<Movie>,
}

#[async_trait]
impl OmdbApi for FakeOmdb {
    async fn search(&self, _query: &str, page: u32) -> Result<SearchResults> {
        Ok(SearchResults {
            page,
            results: self.listing.clone(),
            total_pages: 1,
            total_results: self.listing.len() as u32,
        })
    }

    async fn movie_details(&self, imdb_id: &str) -> Result<Movie> {
        match &self.detail {
            Some(m) if m.imdb_id == imdb_id => Ok(m.clone()),
            _ => Err(Error::NotFound(format!("no movie with id {imdb_id}"))),
        }
    }

    async fn popular(&self, page: u32) -> Result<SearchResults> {
        self.search("movie", page).await
    }

    async fn trending(&self) -> Result<SearchResults> {
        self.search("movie", 1).await
    }
}

struct FakeYoutube {
    trailer: Option<Video>,
    fail: bool,
}

#[async_trait]
impl YoutubeApi for FakeYoutube {
    async fn search_trailer(&self, _title: &str) -> Result<Option<Video>> {
        if self.fail {
            return Err(Error::Provider("quota exceeded".to_string()));
        }
        Ok(self.trailer.clone())
    }

    async fn search_trailers(&self, _query: &str) -> Result<Vec<Video>> {
        if self.fail {
            return Err(Error::Provider("quota exceeded".to_string()));
        }
        Ok(self.trailer.clone().into_iter().collect())
    }
}

struct FakeGemini {
    missing_key: bool,
}

#[async_trait]
impl GeminiApi for FakeGemini {
    async fn ask(&self, prompt: &str, _options: GenerationOptions) -> Result<String> {
        if self.missing_key {
            return Err(Error::Configuration("GEMINI_API_KEY"));
        }
        Ok(format!("echo: {prompt}"))
    }
}

fn app_with(omdb: FakeOmdb, youtube: FakeYoutube, gemini: FakeGemini) -> (TempDir, App) {
    let dir = TempDir::new().unwrap();
    let store = MovieStore::new(Box::new(FileBackend::new(dir.path()).unwrap()));
    let app = App::new(
        Arc::new(omdb),
        Arc::new(youtube),
        Arc::new(gemini),
        Arc::new(store),
    );
    (dir, app)
}

fn default_app() -> (TempDir, App) {
    app_with(
        FakeOmdb {
            listing: vec![movie("tt0000001", "A"), movie("tt0000002", "B")],
            detail: Some(movie("tt0133093", "The Matrix")),
        },
        FakeYoutube {
            trailer: Some(trailer()),
            fail: false,
        },
        FakeGemini { missing_key: false },
    )
}

#[tokio::test]
async fn view_movie_records_visit_and_finds_trailer() {
    let (_dir, app) = default_app();
    let (movie, trailer) = app.view_movie("tt0133093").await.unwrap();
    assert_eq!(movie.title, "The Matrix");
    assert_eq!(trailer.unwrap().id, "abc123");

    let recent = app.store.recently_viewed();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].imdb_id, "tt0133093");

    // A second visit moves the entry to the front instead of duplicating.
    app.view_movie("tt0133093").await.unwrap();
    assert_eq!(app.store.recently_viewed().len(), 1);
}

#[tokio::test]
async fn view_movie_surfaces_not_found() {
    let (_dir, app) = default_app();
    let err = app.view_movie("tt0000603").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    // A failed visit leaves no trace in the history.
    assert!(app.store.recently_viewed().is_empty());
}

#[tokio::test]
async fn trailer_failures_degrade_to_none() {
    let (_dir, app) = app_with(
        FakeOmdb {
            listing: Vec::new(),
            detail: Some(movie("tt0133093", "The Matrix")),
        },
        FakeYoutube {
            trailer: None,
            fail: true,
        },
        FakeGemini { missing_key: false },
    );
    let (movie, trailer) = app.view_movie("tt0133093").await.unwrap();
    assert_eq!(movie.title, "The Matrix");
    assert!(trailer.is_none());
}

#[tokio::test]
async fn toggling_favorites_announces_each_change() {
    let (_dir, app) = default_app();
    let mut events = app.store.subscribe();
    let m = movie("tt0133093", "The Matrix");

    assert!(app.toggle_favorite(&m));
    assert!(app.store.is_favorite("tt0133093"));
    assert_eq!(events.try_recv().unwrap(), StoreEvent::FavoritesChanged);

    assert!(!app.toggle_favorite(&m));
    assert!(!app.store.is_favorite("tt0133093"));
    assert_eq!(events.try_recv().unwrap(), StoreEvent::FavoritesChanged);
}

#[tokio::test]
async fn reordered_favorites_read_back_in_order() {
    let (_dir, app) = default_app();
    let (a, b, c) = (
        movie("tt0000001", "A"),
        movie("tt0000002", "B"),
        movie("tt0000003", "C"),
    );
    app.store.add_favorite(&a);
    app.store.add_favorite(&b);
    app.store.add_favorite(&c);
    app.store.save_favorites(&[c.clone(), a.clone(), b.clone()]);
    let ids: Vec<_> = app
        .store
        .favorites()
        .into_iter()
        .map(|m| m.imdb_id)
        .collect();
    assert_eq!(ids, vec!["tt0000003", "tt0000001", "tt0000002"]);
}

#[tokio::test]
async fn chat_transcript_grows_user_then_bot() {
    let (_dir, app) = default_app();
    let mut chat = app.chat();
    assert_eq!(chat.messages().len(), 1);
    assert_eq!(chat.messages()[0].sender, Sender::Bot);

    let reply = chat.send("recommend a heist movie").await;
    assert_eq!(reply.sender, Sender::Bot);
    assert_eq!(reply.text, "echo: recommend a heist movie");

    let messages = chat.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].sender, Sender::User);
    assert!(messages[0].id < messages[1].id && messages[1].id < messages[2].id);
}

#[tokio::test]
async fn chat_turns_missing_key_into_an_inline_message() {
    let (_dir, app) = app_with(
        FakeOmdb {
            listing: Vec::new(),
            detail: None,
        },
        FakeYoutube {
            trailer: None,
            fail: false,
        },
        FakeGemini { missing_key: true },
    );
    let mut chat = app.chat();
    let reply = chat.send("hello?").await;
    assert_eq!(reply.sender, Sender::Bot);
    assert!(reply.text.starts_with("Error:"));
    assert!(reply.text.contains("GEMINI_API_KEY"));
}

#[tokio::test]
async fn know_more_asks_about_the_movie() {
    let (_dir, app) = default_app();
    let m = movie("tt0133093", "The Matrix");
    let briefing = app.know_more(&m).await.unwrap();
    assert!(briefing.contains("The Matrix"));
    assert!(briefing.contains("Recommendation"));
}
