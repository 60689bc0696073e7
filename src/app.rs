use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::error::Result;
use crate::gemini::{self, GeminiApi, GeminiClient, GenerationOptions};
use crate::models::{ChatMessage, Movie, Sender, Video};
use crate::omdb::{OmdbApi, OmdbClient};
use crate::store::MovieStore;
use crate::youtube::{YoutubeApi, YoutubeClient};

const CHAT_GREETING: &str = "Hello! I'm your movie assistant. How can I help you today?";

/// Everything the view layer needs, behind injectable seams.
#[derive(Clone)]
pub struct App {
    pub omdb: Arc<dyn OmdbApi>,
    pub youtube: Arc<dyn YoutubeApi>,
    pub gemini: Arc<dyn GeminiApi>,
    pub store: Arc<MovieStore>,
}

impl App {
    pub fn from_env(store: MovieStore) -> Result<Self> {
        Ok(Self::new(
            Arc::new(OmdbClient::from_env()?),
            Arc::new(YoutubeClient::from_env()),
            Arc::new(GeminiClient::from_env()),
            Arc::new(store),
        ))
    }

    pub fn new(
        omdb: Arc<dyn OmdbApi>,
        youtube: Arc<dyn YoutubeApi>,
        gemini: Arc<dyn GeminiApi>,
        store: Arc<MovieStore>,
    ) -> Self {
        Self {
            omdb,
            youtube,
            gemini,
            store,
        }
    }

    /// The details flow: fetch, record the visit, then try for a trailer.
    /// Trailer failures degrade to None; the details still render.
    pub async fn view_movie(&self, imdb_id: &str) -> Result<(Movie, Option<Video>)> {
        let movie = self.omdb.movie_details(imdb_id).await?;
        self.store.add_recently_viewed(&movie);
        let trailer = match self.youtube.search_trailer(&movie.title).await {
            Ok(trailer) => trailer,
            Err(e) => {
                warn!("trailer lookup for '{}' failed: {}", movie.title, e);
                None
            }
        };
        Ok((movie, trailer))
    }

    /// Returns the new membership state.
    pub fn toggle_favorite(&self, movie: &Movie) -> bool {
        if self.store.is_favorite(&movie.imdb_id) {
            self.store.remove_favorite(&movie.imdb_id);
            false
        } else {
            self.store.add_favorite(movie);
            true
        }
    }

    pub async fn know_more(&self, movie: &Movie) -> Result<String> {
        let prompt = gemini::insights_prompt(&movie.title, &movie.release_date);
        self.gemini.ask(&prompt, GenerationOptions::insights()).await
    }

    pub fn chat(&self) -> ChatSession {
        ChatSession::new(Arc::clone(&self.gemini))
    }
}

/// One open conversation: an in-memory transcript seeded with a greeting.
/// Assistant failures become bot-authored messages; the chat never fails
/// outward.
pub struct ChatSession {
    gemini: Arc<dyn GeminiApi>,
    messages: Vec<ChatMessage>,
    next_id: u64,
}

impl ChatSession {
    fn new(gemini: Arc<dyn GeminiApi>) -> Self {
        let mut session = Self {
            gemini,
            messages: Vec::new(),
            next_id: 1,
        };
        session.push(Sender::Bot, CHAT_GREETING.to_string());
        session
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    fn push(&mut self, sender: Sender, text: String) {
        let message = ChatMessage {
            id: self.next_id,
            text,
            sender,
            timestamp: Utc::now(),
        };
        self.next_id += 1;
        self.messages.push(message);
    }

    pub async fn send(&mut self, text: &str) -> &ChatMessage {
        self.push(Sender::User, text.to_string());
        let reply = match self.gemini.ask(text, GenerationOptions::chat()).await {
            Ok(reply) => reply,
            Err(e) => format!("Error: {e}"),
        };
        self.push(Sender::Bot, reply);
        &self.messages[self.messages.len() - 1]
    }
}
