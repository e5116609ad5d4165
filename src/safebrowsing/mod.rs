//! # Safe Browsing Client
//!
//! A pure request/response adapter over the Safe Browsing v4
//! `threatListUpdates:fetch` and `fullHashes:find` endpoints (spec.md
//! §4.2). Types are translated field-for-field from
//! `examples/original_source/services/get_prefix_hash.go` and
//! `services/get_full_hash.go`. Stateless, `Clone`, safe for concurrent
//! use — the shared `reqwest::Client` reuses connections per spec.md §5.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

const THREAT_LIST_UPDATES_URL: &str = "https://safebrowsing.googleapis.com/v4/threatListUpdates:fetch";
const FULL_HASHES_URL: &str = "https://safebrowsing.googleapis.com/v4/fullHashes:find";

const CLIENT_ID: &str = "url-safety-checker";
const CLIENT_VERSION: &str = "1.0.0";

/// The three threat lists this system mirrors (spec.md §3).
pub const THREAT_LISTS: [&str; 3] = ["MALWARE", "SOCIAL_ENGINEERING", "UNWANTED_SOFTWARE"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientId {
    #[serde(rename = "clientId")]
    pub client_id: String,
    #[serde(rename = "clientVersion")]
    pub client_version: String,
}

impl Default for ClientId {
    fn default() -> Self {
        Self {
            client_id: CLIENT_ID.to_string(),
            client_version: CLIENT_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(rename = "maxUpdateEntries")]
    pub max_update_entries: u32,
    #[serde(rename = "maxDatabaseEntries")]
    pub max_database_entries: u32,
    #[serde(rename = "supportedCompressions")]
    pub supported_compressions: Vec<String>,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            max_update_entries: 2048,
            max_database_entries: 4096,
            supported_compressions: vec!["RAW".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListUpdateRequest {
    #[serde(rename = "threatType")]
    pub threat_type: String,
    #[serde(rename = "platformType")]
    pub platform_type: String,
    #[serde(rename = "threatEntryType")]
    pub threat_entry_type: String,
    pub state: String,
    pub constraints: Constraints,
}

impl ListUpdateRequest {
    /// Build a request for `threat_type` carrying the current cursor `state`.
    pub fn new(threat_type: &str, state: String) -> Self {
        Self {
            threat_type: threat_type.to_string(),
            platform_type: "ANY_PLATFORM".to_string(),
            threat_entry_type: "URL".to_string(),
            state,
            constraints: Constraints::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatListUpdateRequest {
    pub client: ClientId,
    #[serde(rename = "listUpdateRequests")]
    pub list_update_requests: Vec<ListUpdateRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawHashes {
    #[serde(rename = "prefixSize")]
    pub prefix_size: usize,
    #[serde(rename = "rawHashes")]
    pub raw_hashes: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Additions {
    #[serde(rename = "compressionType")]
    pub compression_type: String,
    #[serde(rename = "rawHashes")]
    pub raw_hashes: RawHashes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawIndices {
    pub indices: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Removals {
    #[serde(rename = "compressionType")]
    pub compression_type: String,
    #[serde(rename = "rawIndices")]
    pub raw_indices: RawIndices,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CheckSum {
    #[serde(default)]
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListUpdateResponse {
    #[serde(rename = "threatType")]
    pub threat_type: String,
    #[serde(rename = "responseType", default)]
    pub response_type: Option<String>,
    #[serde(default)]
    pub additions: Vec<Additions>,
    #[serde(default)]
    pub removals: Vec<Removals>,
    #[serde(rename = "newClientState")]
    pub new_client_state: String,
    #[serde(default)]
    pub checksum: CheckSum,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ThreatListUpdateResponse {
    #[serde(rename = "listUpdateResponses", default)]
    pub list_update_responses: Vec<ListUpdateResponse>,
    #[serde(rename = "minimumWaitDuration", default)]
    pub minimum_wait_duration: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreatEntry {
    pub hash: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreatInfo {
    #[serde(rename = "threatTypes")]
    pub threat_types: Vec<String>,
    #[serde(rename = "platformTypes")]
    pub platform_types: Vec<String>,
    #[serde(rename = "threatEntryTypes")]
    pub threat_entry_types: Vec<String>,
    #[serde(rename = "threatEntries")]
    pub threat_entries: Vec<ThreatEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FullHashesRequest {
    pub client: ClientId,
    #[serde(rename = "clientStates")]
    pub client_states: Vec<String>,
    #[serde(rename = "threatInfo")]
    pub threat_info: ThreatInfo,
}

impl FullHashesRequest {
    pub fn new(prefixes: Vec<String>) -> Self {
        Self {
            client: ClientId::default(),
            client_states: Vec::new(),
            threat_info: ThreatInfo {
                threat_types: THREAT_LISTS.iter().map(|s| s.to_string()).collect(),
                platform_types: vec!["ANY_PLATFORM".to_string()],
                threat_entry_types: vec!["URL".to_string()],
                threat_entries: prefixes.into_iter().map(|hash| ThreatEntry { hash }).collect(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreatMatch {
    #[serde(rename = "threatType")]
    pub threat_type: String,
    pub threat: ThreatEntry,
    #[serde(rename = "cacheDuration")]
    pub cache_duration: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct FullHashResponse {
    #[serde(default)]
    pub matches: Vec<ThreatMatch>,
    #[serde(rename = "minimumWaitDuration", default)]
    pub minimum_wait_duration: Option<String>,
    #[serde(rename = "negativeCacheDuration", default)]
    pub negative_cache_duration: Option<String>,
}

/// Stateless HTTP adapter over the two Safe Browsing v4 endpoints.
#[derive(Clone)]
pub struct SafeBrowsingClient {
    http: reqwest::Client,
    api_key: String,
    threat_list_updates_url: String,
    full_hashes_url: String,
}

impl SafeBrowsingClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            threat_list_updates_url: THREAT_LIST_UPDATES_URL.to_string(),
            full_hashes_url: FULL_HASHES_URL.to_string(),
        }
    }

    /// Point the client at a different pair of endpoints, used in tests
    /// to redirect requests to a local mock server.
    pub fn with_base_urls(api_key: String, threat_list_updates_url: String, full_hashes_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            threat_list_updates_url,
            full_hashes_url,
        }
    }

    /// `POST threatListUpdates:fetch?key=...`.
    pub async fn fetch_updates(
        &self,
        request: &ThreatListUpdateRequest,
    ) -> Result<ThreatListUpdateResponse, AppError> {
        let url = format!("{}?key={}", self.threat_list_updates_url, self.api_key);
        let response = self.http.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamUnavailable(format!(
                "threatListUpdates:fetch returned {status}: {body}"
            )));
        }

        response
            .json::<ThreatListUpdateResponse>()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("malformed update response: {e}")))
    }

    /// `POST fullHashes:find?key=...`.
    pub async fn find_full_hashes(
        &self,
        request: &FullHashesRequest,
    ) -> Result<FullHashResponse, AppError> {
        let url = format!("{}?key={}", self.full_hashes_url, self.api_key);
        let response = self.http.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamUnavailable(format!(
                "fullHashes:find returned {status}: {body}"
            )));
        }

        response
            .json::<FullHashResponse>()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("malformed full-hash response: {e}")))
    }
}
