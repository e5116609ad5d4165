//! Scenario S6 from spec.md §8: one full Updater cycle against a
//! `wiremock`-stubbed `threatListUpdates:fetch` endpoint, asserting the
//! Prefix Store and cursor land in the state the delta describes.
//! Requires `DATABASE_URL_TEST` and `REDIS_URL_TEST`; `#[ignore]`d by
//! default (see `lookup_scenarios.rs`).

use base64::Engine;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url_safety_checker::cache::Cache;
use url_safety_checker::safebrowsing::SafeBrowsingClient;
use url_safety_checker::store::pool::{ConnectionPool, DatabaseConfig};
use url_safety_checker::store::PrefixStore;
use url_safety_checker::updater::Updater;

#[tokio::test]
#[ignore] // requires live postgres + redis
async fn s6_updater_applies_one_delta() {
    let db_url = std::env::var("DATABASE_URL_TEST").expect("DATABASE_URL_TEST required");
    let redis_url = std::env::var("REDIS_URL_TEST").expect("REDIS_URL_TEST required");

    let pool = ConnectionPool::connect(DatabaseConfig { url: db_url, ..Default::default() })
        .await
        .unwrap();
    let store = PrefixStore::new(pool);
    let cache = Cache::connect(&redis_url).await.unwrap();

    let starting_idx = cache.get_idx().await.unwrap();

    let raw_hashes = base64::engine::general_purpose::STANDARD.encode([1u8, 2, 3, 4, 5, 6, 7, 8]);
    let delta_page = serde_json::json!({
        "listUpdateResponses": [{
            "threatType": "MALWARE",
            "additions": [{ "compressionType": "RAW", "rawHashes": { "prefixSize": 4, "rawHashes": raw_hashes } }],
            "removals": [],
            "newClientState": "abc",
            "checksum": {},
        }]
    });
    let empty_page = serde_json::json!({ "listUpdateResponses": [] });

    let mock_server = wiremock::MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .and(wiremock::matchers::path_regex("threatListUpdates:fetch"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(delta_page))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .and(wiremock::matchers::path_regex("threatListUpdates:fetch"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(empty_page))
        .mount(&mock_server)
        .await;

    let client = SafeBrowsingClient::with_base_urls(
        "unused".to_string(),
        format!("{}/threatListUpdates:fetch", mock_server.uri()),
        format!("{}/fullHashes:find", mock_server.uri()),
    );

    let updater = Updater::new(client, store.clone(), cache.clone());
    let token = CancellationToken::new();
    let run_token = token.clone();
    let handle = tokio::spawn(async move { updater.run(run_token).await });

    tokio::time::sleep(Duration::from_secs(6)).await;
    token.cancel();
    handle.abort();

    assert_eq!(cache.get("state:MALWARE").await.unwrap(), Some("abc".to_string()));
    assert_eq!(cache.get_idx().await.unwrap(), starting_idx + 2);

    let p1 = base64::engine::general_purpose::STANDARD.encode([1u8, 2, 3, 4]);
    let p2 = base64::engine::general_purpose::STANDARD.encode([5u8, 6, 7, 8]);
    let present = store.exists_in(&[p1, p2]).await.unwrap();
    assert_eq!(present.len(), 2);
}
