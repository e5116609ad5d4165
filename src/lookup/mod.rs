//! # Lookup Pipeline
//!
//! The four-stage decision cascade for a batch of submitted URL hashes
//! (spec.md §4.4): positive-cache probe → prefix derivation → local
//! prefix filter → remote confirmation. Grounded in
//! `examples/original_source/controllers/check_url_safety.go` (the
//! overall cascade) and `services/threat_info.go`/`services/local_db_check.go`
//! (the cache-then-store ordering). Verdicts preserve input order by
//! carrying the original index alongside every in-flight item
//! (spec.md §9 design note), rather than rebuilding order at the end.

use base64::Engine;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::cache::{self, Cache};
use crate::error::AppError;
use crate::safebrowsing::{FullHashesRequest, SafeBrowsingClient};
use crate::store::PrefixStore;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Safe,
    Unsafe,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Verdict {
    pub url: String,
    pub status: Status,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threat_type: Option<String>,
}

impl Verdict {
    fn safe(url: String) -> Self {
        Self {
            url,
            status: Status::Safe,
            message: "not found in any known threat list".to_string(),
            threat_type: None,
        }
    }

    fn unsafe_with(url: String, threat_type: String) -> Self {
        Self {
            url,
            message: format!("matched threat list: {threat_type}"),
            status: Status::Unsafe,
            threat_type: Some(threat_type),
        }
    }
}

/// An input still awaiting a verdict, carrying its original position
/// so the final output list can be reassembled in input order.
struct Pending {
    index: usize,
    hash: String,
}

pub struct LookupPipeline {
    cache: Cache,
    store: PrefixStore,
    client: SafeBrowsingClient,
}

impl LookupPipeline {
    pub fn new(cache: Cache, store: PrefixStore, client: SafeBrowsingClient) -> Self {
        Self { cache, store, client }
    }

    /// Run the full cascade over `hashes`, returning one verdict per
    /// input, in input order, with duplicates each getting their own
    /// verdict (spec.md §4.4 edge cases).
    pub async fn check(&self, hashes: Vec<String>) -> Result<Vec<Verdict>, AppError> {
        let mut verdicts: Vec<Option<Verdict>> = vec![None; hashes.len()];

        // Stage 1: positive cache probe.
        let mut pending = Vec::new();
        for (index, hash) in hashes.into_iter().enumerate() {
            match self.probe_positive_cache(&hash).await? {
                Some(threat_type) => verdicts[index] = Some(Verdict::unsafe_with(hash, threat_type)),
                None => pending.push(Pending { index, hash }),
            }
        }

        if pending.is_empty() {
            return Ok(finalize(verdicts));
        }

        // Stage 2: prefix derivation.
        let mut prefixed = Vec::with_capacity(pending.len());
        for item in pending {
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(&item.hash)
                .map_err(|_| AppError::BadRequest("invalid base64 input".to_string()))?;
            if decoded.len() < 4 {
                return Err(AppError::BadRequest("hash is too short".to_string()));
            }
            let prefix = base64::engine::general_purpose::STANDARD.encode(&decoded[..4]);
            prefixed.push((item.index, item.hash, prefix));
        }

        // Stage 3: local prefix filter.
        let all_prefixes: Vec<String> = prefixed.iter().map(|(_, _, p)| p.clone()).collect();
        let present = self.filter_present_prefixes(&all_prefixes).await?;

        let mut suspicious = Vec::new();
        for (index, hash, prefix) in prefixed {
            if present.contains(&prefix) {
                suspicious.push((index, hash));
            } else {
                verdicts[index] = Some(Verdict::safe(hash));
            }
        }

        if suspicious.is_empty() {
            return Ok(finalize(verdicts));
        }

        // Stage 4: remote confirmation.
        let request_hashes: Vec<String> = suspicious.iter().map(|(_, h)| h.clone()).collect();
        let response = self
            .client
            .find_full_hashes(&FullHashesRequest::new(request_hashes))
            .await?;

        let mut matched: HashMap<String, (String, Duration)> = HashMap::new();
        let mut cache_writes = Vec::new();
        for m in &response.matches {
            let ttl = parse_cache_duration(&m.cache_duration);
            matched.insert(m.threat.hash.clone(), (m.threat_type.clone(), ttl));
            cache_writes.push((cache::full_hash_key(&m.threat.hash), m.threat_type.clone(), ttl));
        }
        self.cache.pipeline_set_ex(cache_writes).await;

        for (index, hash) in suspicious {
            verdicts[index] = Some(match matched.get(&hash) {
                Some((threat_type, _)) => Verdict::unsafe_with(hash, threat_type.clone()),
                None => Verdict::safe(hash),
            });
        }

        Ok(finalize(verdicts))
    }

    /// `GET fullHash:<input>` and `GET <input>` (BlacklistEntries use the
    /// bare hash as key, spec.md §4.4 stage 1).
    async fn probe_positive_cache(&self, hash: &str) -> Result<Option<String>, AppError> {
        if let Some(threat_type) = self.cache.get(&cache::full_hash_key(hash)).await? {
            return Ok(Some(threat_type));
        }
        if let Some(entry) = self.cache.get(hash).await? {
            // BlacklistEntry value shape is `<source>:BLACKLISTED_URL`.
            let threat_type = entry.split(':').nth(1).unwrap_or("BLACKLISTED_URL").to_string();
            return Ok(Some(threat_type));
        }
        Ok(None)
    }

    /// `SMISMEMBER prefixHashes` first, then the Prefix Store only for the
    /// prefixes the set reports absent. Grounded in
    /// `examples/original_source/services/local_db_check.go`'s
    /// `CheckIfHashExistsInCache`, which builds its Postgres query
    /// (`toLocalCheckPrefixes`) only from the Redis misses. A set hit is
    /// trusted directly (false positives are tolerated — the remote
    /// confirmation stage still has to agree before a verdict goes
    /// unsafe); a set miss still goes to the store since the set is only
    /// eventually consistent and a miss there is not a guarantee of
    /// absence (spec.md §8 invariant 4).
    async fn filter_present_prefixes(&self, prefixes: &[String]) -> Result<HashSet<String>, AppError> {
        let membership = self.cache.prefix_members(prefixes).await?;

        let mut present: HashSet<String> = HashSet::new();
        let mut to_check = Vec::new();
        for (prefix, is_member) in prefixes.iter().zip(membership) {
            if is_member {
                present.insert(prefix.clone());
            } else {
                to_check.push(prefix.clone());
            }
        }

        if !to_check.is_empty() {
            present.extend(self.store.exists_in(&to_check).await?);
        }

        Ok(present)
    }
}

fn finalize(verdicts: Vec<Option<Verdict>>) -> Vec<Verdict> {
    verdicts.into_iter().map(|v| v.expect("every index assigned a verdict")).collect()
}

/// Safe Browsing durations are `"300s"`-style strings; malformed or
/// missing durations fall back to no caching rather than failing the request.
fn parse_cache_duration(raw: &str) -> Duration {
    raw.strip_suffix('s')
        .and_then(|s| s.parse::<f64>().ok())
        .map(Duration::from_secs_f64)
        .unwrap_or(Duration::from_secs(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cache_duration_seconds() {
        assert_eq!(parse_cache_duration("300s"), Duration::from_secs(300));
        assert_eq!(parse_cache_duration("1.5s"), Duration::from_millis(1500));
    }

    #[test]
    fn malformed_cache_duration_falls_back_to_zero() {
        assert_eq!(parse_cache_duration("garbage"), Duration::from_secs(0));
    }

    #[test]
    fn safe_verdict_carries_no_threat_type() {
        let v = Verdict::safe("abcd".to_string());
        assert_eq!(v.status, Status::Safe);
        assert!(v.threat_type.is_none());
    }

    #[test]
    fn unsafe_verdict_carries_threat_type() {
        let v = Verdict::unsafe_with("abcd".to_string(), "MALWARE".to_string());
        assert_eq!(v.status, Status::Unsafe);
        assert_eq!(v.threat_type.as_deref(), Some("MALWARE"));
    }
}
