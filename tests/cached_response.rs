use std::fmt::Display;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hookwork::hooks::{CacheOptions, CachedResponse, UseServices};
use hookwork::{
    Cache, CacheError, Endpoint, Error, Logger, MemoryCache, Props, Request, compose, hook_fn, identity,
};
use serde_json::{Value, json};

// ── Doubles ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingLogger {
    lines: Mutex<Vec<(&'static str, String)>>,
}

impl RecordingLogger {
    fn levels(&self) -> Vec<&'static str> {
        self.lines.lock().unwrap().iter().map(|(level, _)| *level).collect()
    }
}

impl Logger for RecordingLogger {
    fn log(&self, message: &str) {
        self.lines.lock().unwrap().push(("log", message.to_owned()));
    }

    fn warn(&self, message: &str) {
        self.lines.lock().unwrap().push(("warn", message.to_owned()));
    }

    fn error(&self, message: &str, _detail: Option<&dyn Display>) {
        self.lines.lock().unwrap().push(("error", message.to_owned()));
    }
}

/// Backend that counts calls and fails whichever operations it is told to.
#[derive(Default)]
struct FlakyCache {
    inner: MemoryCache,
    fail_get: bool,
    fail_set: bool,
    gets: AtomicUsize,
    sets: AtomicUsize,
}

#[async_trait]
impl Cache for FlakyCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_get {
            return Err(CacheError::Unavailable("connection reset".to_owned()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String, ttl_secs: u64) -> Result<(), CacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.fail_set {
            return Err(CacheError::Unavailable("connection reset".to_owned()));
        }
        self.inner.set(key, value, ttl_secs).await
    }
}

// ── Fixture ───────────────────────────────────────────────────────────────────

struct Fixture {
    endpoint: Endpoint,
    cache: Arc<FlakyCache>,
    calls: Arc<AtomicUsize>,
    logger: Arc<RecordingLogger>,
}

fn fixture(cache: FlakyCache, options: CacheOptions) -> Fixture {
    let cache = Arc::new(cache);
    let calls = Arc::new(AtomicUsize::new(0));
    let logger = Arc::new(RecordingLogger::default());
    let counter = Arc::clone(&calls);

    let endpoint = compose()
        .hook(hook_fn(|props: Props, next| async move {
            let id = props.request().query().get("id").cloned().unwrap_or_default();
            next.call(props.with_arg("id", json!(id))).await
        }))
        .hook(UseServices::new().cache(cache.clone()))
        .hook(CachedResponse::new(options.logger(logger.clone())))
        .handler(move |props: Props| {
            let counter = Arc::clone(&counter);
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                Ok::<_, Error>(json!({ "id": props.arg("id"), "computed": n }))
            }
        });

    Fixture { endpoint, cache, calls, logger }
}

fn get(uri: &str) -> Request {
    Request::builder().uri(uri).build()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn miss_computes_once_then_hits() {
    let f = fixture(FlakyCache::default(), CacheOptions::new("items"));

    let first = f.endpoint.handle(get("/items?id=7")).await;
    assert_eq!(first.body(), &json!({ "id": "7", "computed": 1 }));
    assert_eq!(f.calls.load(Ordering::SeqCst), 1);
    assert_eq!(f.cache.sets.load(Ordering::SeqCst), 1);

    let second = f.endpoint.handle(get("/items?id=7")).await;
    assert_eq!(second, first);
    assert_eq!(f.calls.load(Ordering::SeqCst), 1, "handler must not run on a hit");
    assert_eq!(f.cache.sets.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn entries_are_keyed_by_prefix_and_identity() {
    let f = fixture(FlakyCache::default(), CacheOptions::new("items"));
    f.endpoint.handle(get("/items?id=7")).await;

    let key = identity::cache_key("items", &json!({ "id": "7" }));
    assert!(key.starts_with("items."));
    let stored = f.cache.inner.get(&key).await.unwrap().expect("entry persisted");
    let stored: Value = serde_json::from_str(&stored).unwrap();
    assert_eq!(stored["body"], json!({ "id": "7", "computed": 1 }));

    f.endpoint.handle(get("/items?id=8")).await;
    assert_eq!(f.calls.load(Ordering::SeqCst), 2, "different args, different entry");
}

#[tokio::test]
async fn failing_get_degrades_to_a_miss() {
    let cache = FlakyCache { fail_get: true, ..FlakyCache::default() };
    let f = fixture(cache, CacheOptions::new("items"));

    let response = f.endpoint.handle(get("/items?id=1")).await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.body(), &json!({ "id": "1", "computed": 1 }));
    assert!(f.logger.levels().contains(&"error"));
}

#[tokio::test]
async fn failing_set_keeps_the_fresh_result() {
    let cache = FlakyCache { fail_set: true, ..FlakyCache::default() };
    let f = fixture(cache, CacheOptions::new("items"));

    let response = f.endpoint.handle(get("/items?id=1")).await;
    assert_eq!(response.body(), &json!({ "id": "1", "computed": 1 }));
    assert!(f.logger.levels().contains(&"error"));

    // Nothing was stored, so the next call computes again.
    f.endpoint.handle(get("/items?id=1")).await;
    assert_eq!(f.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn skip_header_bypasses_get_and_set() {
    let f = fixture(FlakyCache::default(), CacheOptions::new("items").skipping("x-skip-cache", "yes"));

    let request = Request::builder().uri("/items?id=1").header("x-skip-cache", "yes").build();
    let response = f.endpoint.handle(request).await;

    assert_eq!(response.body()["computed"], json!(1));
    assert_eq!(f.cache.gets.load(Ordering::SeqCst), 0);
    assert_eq!(f.cache.sets.load(Ordering::SeqCst), 0);

    // Any other header value goes through the cache.
    let request = Request::builder().uri("/items?id=1").header("x-skip-cache", "no").build();
    f.endpoint.handle(request).await;
    assert_eq!(f.cache.gets.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn undecodable_entries_are_recomputed() {
    let f = fixture(FlakyCache::default(), CacheOptions::new("items"));
    let key = identity::cache_key("items", &json!({ "id": "1" }));
    f.cache.inner.set(&key, "{not json".to_owned(), 60).await.unwrap();

    let response = f.endpoint.handle(get("/items?id=1")).await;
    assert_eq!(response.body()["computed"], json!(1));
    assert!(f.logger.levels().contains(&"warn"));
}

#[tokio::test]
async fn identity_narrows_the_key() {
    let options = CacheOptions::new("items").to_identity(|_args| json!({ "all": true }));
    let f = fixture(FlakyCache::default(), options);

    f.endpoint.handle(get("/items?id=1")).await;
    let second = f.endpoint.handle(get("/items?id=2")).await;

    assert_eq!(f.calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.body()["id"], json!("1"));
}

#[tokio::test]
async fn handler_errors_are_not_cached() {
    let cache = Arc::new(MemoryCache::new());
    let endpoint = compose()
        .hook(UseServices::new().cache(cache.clone()))
        .hook(CachedResponse::new(CacheOptions::new("broken")))
        .handler(|_props: Props| async { Err::<Value, _>(Error::unknown("backend down")) });

    assert_eq!(endpoint.handle(get("/")).await.status_code(), 500);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn missing_backend_is_a_setup_error() {
    let endpoint = compose()
        .hook(CachedResponse::new(CacheOptions::new("items")))
        .handler(|_props: Props| async { Ok::<_, Error>(()) });

    assert_eq!(endpoint.handle(get("/")).await.status_code(), 500);
}

#[tokio::test]
async fn unbounded_ttl_is_stored_and_served() {
    let f = fixture(FlakyCache::default(), CacheOptions::new("items").ttl(Duration::MAX));

    let first = f.endpoint.handle(get("/items?id=1")).await;
    assert_eq!(first.status_code(), 200);
    assert_eq!(first.body(), &json!({ "id": "1", "computed": 1 }));

    let second = f.endpoint.handle(get("/items?id=1")).await;
    assert_eq!(second, first);
    assert_eq!(f.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn null_and_absent_keys_hash_apart() {
    let absent = identity::cache_key("p", &json!({ "a": 1 }));
    let null = identity::cache_key("p", &json!({ "a": 1, "b": null }));
    let reordered = identity::cache_key("p", &json!({ "b": null, "a": 1 }));

    assert_ne!(absent, null);
    assert_eq!(null, reordered);
}

#[test]
fn null_and_its_marker_string_hash_apart() {
    let null = identity::cache_key("p", &json!({ "a": null }));
    let marker = identity::cache_key("p", &json!({ "a": identity::NULL_SENTINEL }));
    assert_ne!(null, marker);
}
