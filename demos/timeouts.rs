//! A single cached lookup endpoint over an in-memory "timeouts" table.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example timeouts
//!
//! Try:
//!   curl http://localhost:3000/v1/timeout/t-1
//!   curl http://localhost:3000/v1/timeout/t-1            # served from cache
//!   curl -H 'x-skip-cache: yes' http://localhost:3000/v1/timeout/t-1
//!   curl http://localhost:3000/v1/timeout/nope           # 404 JSON error
//!   curl http://localhost:3000/v2/anything               # 404 path mismatch

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use hookwork::hooks::{CacheOptions, CachedResponse, Logging, PathParams, UseServices};
use hookwork::{Error, Json, JsonError, MemoryCache, Props, Server, TracingLogger, compose};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize)]
struct Timeout {
    id: String,
    callback_url: String,
    delay_secs: u64,
}

/// Stand-in for a real database client.
struct Database {
    timeouts: HashMap<String, Timeout>,
}

impl Database {
    fn seeded() -> Self {
        let timeouts = [("t-1", "https://example.com/hook", 30), ("t-2", "https://example.com/other", 300)]
            .into_iter()
            .map(|(id, url, delay)| {
                let timeout = Timeout { id: id.to_owned(), callback_url: url.to_owned(), delay_secs: delay };
                (id.to_owned(), timeout)
            })
            .collect();
        Self { timeouts }
    }

    async fn find(&self, id: &str) -> Option<Timeout> {
        // Pretend this is slow so the cache is noticeable.
        tokio::time::sleep(Duration::from_millis(250)).await;
        self.timeouts.get(id).cloned()
    }
}

#[derive(Deserialize)]
struct FindArgs {
    id: String,
}

#[tokio::main]
async fn main() -> Result<(), hookwork::ServerError> {
    tracing_subscriber::fmt::init();

    let db = Arc::new(Database::seeded());
    let cache = Arc::new(MemoryCache::new());

    let endpoint = compose()
        .hook(Logging::new("[:method] :path -> :status in :elapsed(ms, ms) (:date(iso))"))
        .hook(PathParams::new("/v1/timeout/{id}"))
        .hook(
            UseServices::new()
                .service("db", move |_props| {
                    let db = Arc::clone(&db);
                    async move { Ok::<_, Error>(db) }
                })
                .cache(cache),
        )
        .hook(CachedResponse::new(
            CacheOptions::new("timeouts.find")
                .ttl(Duration::from_secs(60))
                .skipping("x-skip-cache", "yes")
                .logger(Arc::new(TracingLogger)),
        ))
        .handler(find_timeout);

    Server::bind("0.0.0.0:3000")?.serve(endpoint).await
}

// GET /v1/timeout/{id}
async fn find_timeout(props: Props) -> Result<Json<Timeout>, Error> {
    let args: FindArgs = props.args_as()?;
    let db = props.service::<Arc<Database>>("db")?;

    match db.find(&args.id).await {
        Some(timeout) => Ok(Json(timeout)),
        None => Err(JsonError::not_found("Timeout not found")
            .key("timeouts.find.unfound")
            .note(format!("Timeout with the id {} was not found", args.id))
            .into()),
    }
}
