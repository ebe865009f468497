//! Media library cache against a mock Fleet Manager

mod common;

use std::time::Duration;

use anthias_fleet::cache::MediaLibraryCache;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::client_for;

#[tokio::test]
async fn test_media_fetched_once_within_ttl() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/media/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 2,
            "results": [
                {"id": 1, "name": "welcome.mp4", "file_type": "video"},
                {"id": 2, "name": "menu.png", "file_type": "image"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cache = MediaLibraryCache::new(client_for(&server));

    let first = cache.get().await.unwrap();
    let second = cache.get().await.unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    assert_eq!(first[0].id.as_deref(), Some("1"));

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}

#[tokio::test]
async fn test_media_refetched_after_ttl() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/media/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1, "name": "a"}])))
        .expect(2)
        .mount(&server)
        .await;

    let cache = MediaLibraryCache::with_ttl(client_for(&server), Duration::from_millis(50));

    cache.get().await.unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    cache.get().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_reads_fetch_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/media/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"id": 1, "name": "a"}]))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let cache = MediaLibraryCache::new(client_for(&server));
    let (a, b, c) = tokio::join!(cache.get(), cache.get(), cache.get());

    assert_eq!(a.unwrap().len(), 1);
    assert_eq!(b.unwrap().len(), 1);
    assert_eq!(c.unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_fetch_is_returned() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/media/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let cache = MediaLibraryCache::new(client_for(&server));
    let err = cache.get().await.unwrap_err();
    assert!(err.is_auth());
    assert!(cache.age().await.is_none());
}
