use anyhow::Result;
use directories::ProjectDirs;
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cinescout::app::App;
use cinescout::models::{Movie, SearchResults, Theme, Video};
use cinescout::omdb;
use cinescout::store::{FileBackend, MovieStore};
use cinescout::youtube;

const USAGE: &str = "\
Usage: cinescout <command> [args]

  search <query> [page]        search movies
  popular [page]               well-known recent movies (fixed-query listing)
  trending                     this year's listing (fixed-query listing)
  details <id>                 movie details, trailer and favorites state
  trailers <query>             trailer discovery search
  favorites                    list saved favorites
  favorite <id>                toggle a favorite
  clear-favorites              empty the favorites list
  recent                       recently viewed movies
  theme [light|dark]           show or set the theme
  ask <prompt...>              one exchange with the assistant
  insights <id>                five-section movie briefing

Ids are imdb ids (tt0133093) or their bare numeric form.
";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn check_env() -> Result<()> {
    if env::var("OMDB_API_KEY").is_err() {
        anyhow::bail!("Missing required environment variable: OMDB_API_KEY");
    }
    Ok(())
}

fn data_dir() -> PathBuf {
    if let Ok(dir) = env::var("CINESCOUT_DATA_DIR") {
        return PathBuf::from(dir);
    }
    ProjectDirs::from("", "", "cinescout")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("data"))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    match dotenv() {
        Ok(path) => info!("Loaded environment from {:?}", path),
        Err(e) => warn!("No .env file loaded ({}) - relying on environment", e),
    }
    check_env()?;

    let store = MovieStore::new(Box::new(FileBackend::new(data_dir())?));
    let app = App::from_env(store)?;

    let args: Vec<String> = env::args().skip(1).collect();
    let mut args = args.iter().map(String::as_str);
    match args.next() {
        Some("search") => {
            let query = required(args.next(), "search needs a query")?;
            let page = args.next().map(parse_page).transpose()?.unwrap_or(1);
            print_listing(&app, &app.omdb.search(query, page).await?);
        }
        Some("popular") => {
            let page = args.next().map(parse_page).transpose()?.unwrap_or(1);
            print_listing(&app, &app.omdb.popular(page).await?);
        }
        Some("trending") => {
            print_listing(&app, &app.omdb.trending().await?);
        }
        Some("details") => {
            let id = resolve_imdb_id(required(args.next(), "details needs an id")?);
            let (movie, trailer) = app.view_movie(&id).await?;
            print_details(&app, &movie, trailer.as_ref());
        }
        Some("trailers") => {
            let query = required(args.next(), "trailers needs a query")?;
            for video in app.youtube.search_trailers(query).await? {
                println!("{}  {}", video.url, video.title);
            }
        }
        Some("favorites") => {
            let favorites = app.store.favorites();
            if favorites.is_empty() {
                println!("No favorites saved.");
            }
            for movie in favorites {
                println!("{:<11} {}", movie.imdb_id, movie.title);
            }
        }
        Some("favorite") => {
            let id = resolve_imdb_id(required(args.next(), "favorite needs an id")?);
            let movie = app.omdb.movie_details(&id).await?;
            if app.toggle_favorite(&movie) {
                println!("Added '{}' to favorites.", movie.title);
            } else {
                println!("Removed '{}' from favorites.", movie.title);
            }
        }
        Some("clear-favorites") => {
            app.store.clear_favorites();
            println!("Favorites cleared.");
        }
        Some("recent") => {
            for movie in app.store.recently_viewed() {
                println!("{:<11} {}", movie.imdb_id, movie.title);
            }
        }
        Some("theme") => match args.next() {
            None => println!("{}", app.store.theme().as_str()),
            Some(raw) => match Theme::parse(raw) {
                Some(theme) => {
                    app.store.save_theme(theme);
                    println!("Theme set to {}.", theme.as_str());
                }
                None => anyhow::bail!("theme must be 'light' or 'dark'"),
            },
        },
        Some("ask") => {
            let prompt = args.collect::<Vec<_>>().join(" ");
            if prompt.trim().is_empty() {
                anyhow::bail!("ask needs a prompt");
            }
            let mut chat = app.chat();
            let reply = chat.send(&prompt).await;
            println!("{}", reply.text);
        }
        Some("insights") => {
            let id = resolve_imdb_id(required(args.next(), "insights needs an id")?);
            let movie = app.omdb.movie_details(&id).await?;
            match app.know_more(&movie).await {
                Ok(text) => println!("{text}"),
                // A missing key is user-fixable; say so instead of failing.
                Err(e @ cinescout::Error::Configuration(_)) => println!("{e}"),
                Err(e) => return Err(e.into()),
            }
        }
        _ => {
            eprint!("{USAGE}");
            std::process::exit(2);
        }
    }
    Ok(())
}

fn required<'a>(arg: Option<&'a str>, message: &str) -> Result<&'a str> {
    arg.ok_or_else(|| anyhow::anyhow!("{}", message))
}

fn parse_page(raw: &str) -> Result<u32> {
    raw.parse()
        .map_err(|_| anyhow::anyhow!("page must be a number, got '{}'", raw))
}

fn resolve_imdb_id(arg: &str) -> String {
    if let Ok(derived) = arg.parse::<i64>() {
        return omdb::imdb_id_from_derived(derived);
    }
    arg.to_string()
}

fn print_listing(app: &App, listing: &SearchResults) {
    if listing.results.is_empty() {
        println!("No results.");
        return;
    }
    for movie in &listing.results {
        let marker = if app.store.is_favorite(&movie.imdb_id) {
            "*"
        } else {
            " "
        };
        println!(
            "{} {:<11} {:<48} {:>6}  {:.1}",
            marker,
            movie.imdb_id,
            truncated(&movie.title, 48),
            movie.release_date,
            movie.vote_average
        );
    }
    println!(
        "page {} of {} ({} total)",
        listing.page, listing.total_pages, listing.total_results
    );
}

fn print_details(app: &App, movie: &Movie, trailer: Option<&Video>) {
    println!("{} ({})", movie.title, movie.release_date);
    println!("  rating   {:.1}/10", movie.vote_average);
    if let Some(votes) = movie.vote_count {
        println!("  votes    {votes}");
    }
    if let Some(runtime) = movie.runtime {
        println!("  runtime  {runtime} min");
    }
    if !movie.genres.is_empty() {
        let names: Vec<_> = movie.genres.iter().map(|g| g.name.as_str()).collect();
        println!("  genres   {}", names.join(", "));
    }
    if !movie.cast.is_empty() {
        let names: Vec<_> = movie.cast.iter().map(|c| c.name.as_str()).collect();
        println!("  cast     {}", names.join(", "));
    }
    println!("  poster   {}", omdb::poster_url(movie.poster_path.as_deref(), "w500"));
    if !movie.overview.is_empty() {
        println!("\n{}\n", movie.overview);
    }
    match trailer {
        Some(video) => {
            println!("  trailer  {}", video.url);
            println!("  embed    {}", youtube::embed_url(&video.id));
        }
        None => println!("  trailer  none found"),
    }
    if app.store.is_favorite(&movie.imdb_id) {
        println!("  saved in favorites");
    }
}

fn truncated(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
