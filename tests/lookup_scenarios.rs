//! End-to-end scenarios S1-S6 from spec.md §8, exercised against the
//! real collaborators (Postgres Prefix Store, Redis Cache) and a
//! `wiremock`-stubbed Safe Browsing endpoint. Every test requires
//! `DATABASE_URL_TEST` and `REDIS_URL_TEST` pointing at disposable
//! instances and is `#[ignore]`d by default — run with
//! `cargo test --test lookup_scenarios -- --ignored` against a local
//! `docker compose` stack.

use base64::Engine;
use url_safety_checker::cache::Cache;
use url_safety_checker::lookup::LookupPipeline;
use url_safety_checker::safebrowsing::SafeBrowsingClient;
use url_safety_checker::store::pool::{ConnectionPool, DatabaseConfig};
use url_safety_checker::store::{PrefixEntry, PrefixStore};

async fn test_store() -> PrefixStore {
    let url = std::env::var("DATABASE_URL_TEST").expect("DATABASE_URL_TEST must point at a disposable postgres");
    let pool = ConnectionPool::connect(DatabaseConfig { url, ..Default::default() })
        .await
        .expect("failed to connect to test postgres");
    PrefixStore::new(pool)
}

async fn test_cache() -> Cache {
    let url = std::env::var("REDIS_URL_TEST").expect("REDIS_URL_TEST must point at a disposable redis");
    Cache::connect(&url).await.expect("failed to connect to test redis")
}

fn b64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[tokio::test]
#[ignore] // requires live postgres + redis
async fn s1_all_safe() {
    let store = test_store().await;
    let cache = test_cache().await;
    let client = SafeBrowsingClient::new("unused".to_string());
    let pipeline = LookupPipeline::new(cache, store, client);

    let hash = b64(b"abcd"); // exactly 4 bytes, prefix not present anywhere
    let verdicts = pipeline.check(vec![hash.clone()]).await.unwrap();

    assert_eq!(verdicts.len(), 1);
    assert_eq!(verdicts[0].url, hash);
    assert_eq!(verdicts[0].status, url_safety_checker::lookup::Status::Safe);
}

#[tokio::test]
#[ignore] // requires live postgres + redis
async fn s2_short_hash_rejected() {
    let store = test_store().await;
    let cache = test_cache().await;
    let client = SafeBrowsingClient::new("unused".to_string());
    let pipeline = LookupPipeline::new(cache, store, client);

    let hash = b64(b"ab"); // 2 bytes, below the 4-byte minimum
    let err = pipeline.check(vec![hash]).await.unwrap_err();

    assert!(err.to_string().contains("hash is too short"));
}

#[tokio::test]
#[ignore] // requires live postgres + redis
async fn s3_cached_unsafe_skips_store() {
    let store = test_store().await;
    let cache = test_cache().await;
    let client = SafeBrowsingClient::new("unused".to_string());

    let hash = format!("s3-{}", uuid::Uuid::new_v4());
    cache.set(&format!("fullHash:{hash}"), "MALWARE", None).await.unwrap();

    let pipeline = LookupPipeline::new(cache, store, client);
    let verdicts = pipeline.check(vec![hash.clone()]).await.unwrap();

    assert_eq!(verdicts.len(), 1);
    assert_eq!(verdicts[0].status, url_safety_checker::lookup::Status::Unsafe);
    assert_eq!(verdicts[0].threat_type.as_deref(), Some("MALWARE"));
}

#[tokio::test]
#[ignore] // requires live postgres + redis
async fn s4_prefix_hit_remote_confirms() {
    let store = test_store().await;
    let cache = test_cache().await;

    let hash = b64(b"target-hash-32-bytes-long-enough");
    let prefix = b64(&base64::engine::general_purpose::STANDARD.decode(&hash).unwrap()[..4]);
    store
        .insert_batch(vec![PrefixEntry { prefix, index: 1 }])
        .await
        .unwrap();

    let mock_server = wiremock::MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .and(wiremock::matchers::path_regex("fullHashes:find"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "matches": [{
                "threatType": "SOCIAL_ENGINEERING",
                "threat": { "hash": hash },
                "cacheDuration": "300s",
            }]
        })))
        .mount(&mock_server)
        .await;

    let client = SafeBrowsingClient::with_base_urls(
        "unused".to_string(),
        format!("{}/threatListUpdates:fetch", mock_server.uri()),
        format!("{}/fullHashes:find", mock_server.uri()),
    );

    let pipeline = LookupPipeline::new(cache.clone(), store, client);
    let verdicts = pipeline.check(vec![hash.clone()]).await.unwrap();

    assert_eq!(verdicts[0].status, url_safety_checker::lookup::Status::Unsafe);
    assert_eq!(verdicts[0].threat_type.as_deref(), Some("SOCIAL_ENGINEERING"));

    let cached = cache.get(&format!("fullHash:{hash}")).await.unwrap();
    assert_eq!(cached.as_deref(), Some("SOCIAL_ENGINEERING"));
}

#[tokio::test]
#[ignore] // requires live postgres + redis
async fn s5_prefix_hit_remote_clean() {
    let store = test_store().await;
    let cache = test_cache().await;

    let hash = b64(b"another-target-hash-32-bytes-lon");
    let prefix = b64(&base64::engine::general_purpose::STANDARD.decode(&hash).unwrap()[..4]);
    store
        .insert_batch(vec![PrefixEntry { prefix, index: 2 }])
        .await
        .unwrap();

    let mock_server = wiremock::MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .and(wiremock::matchers::path_regex("fullHashes:find"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({ "matches": [] })))
        .mount(&mock_server)
        .await;

    let client = SafeBrowsingClient::with_base_urls(
        "unused".to_string(),
        format!("{}/threatListUpdates:fetch", mock_server.uri()),
        format!("{}/fullHashes:find", mock_server.uri()),
    );

    let pipeline = LookupPipeline::new(cache.clone(), store, client);
    let verdicts = pipeline.check(vec![hash.clone()]).await.unwrap();

    assert_eq!(verdicts[0].status, url_safety_checker::lookup::Status::Safe);
    assert!(cache.get(&format!("fullHash:{hash}")).await.unwrap().is_none());
}
