//! # Updater
//!
//! The long-running background task that pulls `threatListUpdates:fetch`
//! deltas and applies them to the Prefix Store (spec.md §4.3). Grounded
//! in `examples/original_source/services/fetch_updates.go` (outer
//! `breakTime`/`defaultWaitDuration` loop) and `services/get_prefix_hash.go`
//! (`GetPrefixHashes`'s inner drain loop, `backOffInterval`).

use base64::Engine;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::cache::{self, Cache};
use crate::safebrowsing::{
    ListUpdateRequest, ListUpdateResponse, SafeBrowsingClient, ThreatListUpdateRequest, THREAT_LISTS,
};
use crate::store::{PrefixEntry, PrefixStore};

/// Wait after a failed `threatListUpdates:fetch` before restarting the cycle.
const DEFAULT_WAIT_DURATION: Duration = Duration::from_secs(30 * 60);

/// Wait between pages of a multi-page update within one cycle.
const BACK_OFF_INTERVAL: Duration = Duration::from_secs(3);

/// Wait after a clean, fully-drained cycle before starting the next one.
const BREAK_TIME: Duration = Duration::from_secs(5 * 60);

/// The Updater: owns the Safe Browsing client, the Prefix Store, and the Cache.
pub struct Updater {
    client: SafeBrowsingClient,
    store: PrefixStore,
    cache: Cache,
}

impl Updater {
    pub fn new(client: SafeBrowsingClient, store: PrefixStore, cache: Cache) -> Self {
        Self { client, store, cache }
    }

    /// Run the outer loop until `cancel` fires. New cycles are not
    /// started once cancellation is requested; an in-flight cycle is
    /// allowed to finish its current page.
    pub async fn run(&self, cancel: CancellationToken) {
        while !cancel.is_cancelled() {
            match self.run_cycle(&cancel).await {
                Ok(()) => {
                    tracing::info!("update cycle completed, sleeping {:?}", BREAK_TIME);
                    tokio::select! {
                        _ = tokio::time::sleep(BREAK_TIME) => {}
                        _ = cancel.cancelled() => {}
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "update cycle failed, sleeping {:?}", DEFAULT_WAIT_DURATION);
                    tokio::select! {
                        _ = tokio::time::sleep(DEFAULT_WAIT_DURATION) => {}
                        _ = cancel.cancelled() => {}
                    }
                }
            }
        }
    }

    /// Drain all pages of the current delta. Returns once a page comes
    /// back with an empty `listUpdateResponses` (spec.md §4.3 step 4).
    async fn run_cycle(&self, cancel: &CancellationToken) -> Result<(), crate::error::AppError> {
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            let request = self.build_request().await?;
            let response = self.client.fetch_updates(&request).await?;

            if response.list_update_responses.is_empty() {
                return Ok(());
            }

            let mut cursors = Vec::with_capacity(response.list_update_responses.len());
            for list_response in &response.list_update_responses {
                self.apply_list_response(list_response).await?;
                cursors.push((list_response.threat_type.clone(), list_response.new_client_state.clone()));
            }

            // Cursor/data atomicity: data is applied above, the cursor
            // pipeline runs after — a crash between the two replays the
            // whole cycle next start, which insert conflict-do-nothing and
            // removal silent-ignore make safe (spec.md §4.3, §9).
            self.cache.advance_cursors(cursors).await?;

            tokio::select! {
                _ = tokio::time::sleep(BACK_OFF_INTERVAL) => {}
                _ = cancel.cancelled() => return Ok(()),
            }
        }
    }

    async fn build_request(&self) -> Result<ThreatListUpdateRequest, crate::error::AppError> {
        let mut list_update_requests = Vec::with_capacity(THREAT_LISTS.len());
        for list in THREAT_LISTS {
            let state = self.cache.get(&cache::state_key(list)).await?.unwrap_or_default();
            list_update_requests.push(ListUpdateRequest::new(list, state));
        }

        Ok(ThreatListUpdateRequest {
            client: Default::default(),
            list_update_requests,
        })
    }

    /// Additions are applied before removals (tie-break policy, spec.md §4.3):
    /// this preserves upstream's "removals refer to current table indices"
    /// contract when a single response carries both.
    ///
    /// TODO: `response.checksum.sha256` is received but not verified
    /// against the sorted local table (spec.md §9 open question) — this
    /// revision intentionally omits it rather than guessing the intended
    /// mismatch-recovery behavior.
    async fn apply_list_response(&self, response: &ListUpdateResponse) -> Result<(), crate::error::AppError> {
        if !response.additions.is_empty() {
            self.apply_additions(&response.additions).await?;
        }

        for removal in &response.removals {
            self.store.delete_by_indices(removal.raw_indices.indices.clone()).await?;
        }

        Ok(())
    }

    async fn apply_additions(
        &self,
        additions: &[crate::safebrowsing::Additions],
    ) -> Result<(), crate::error::AppError> {
        // IndexCounter is read once at the start of the block and
        // persisted once at the end (spec.md §4.3 step 3a).
        let mut idx = self.cache.get_idx().await?;
        let mut entries = Vec::new();
        let mut new_prefixes = Vec::new();

        for addition in additions {
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(&addition.raw_hashes.raw_hashes)
                .map_err(|e| crate::error::AppError::UpstreamUnavailable(format!("invalid rawHashes: {e}")))?;

            let prefix_size = addition.raw_hashes.prefix_size;
            if prefix_size == 0 {
                continue;
            }

            for chunk in decoded.chunks(prefix_size) {
                idx += 1;
                let prefix = base64::engine::general_purpose::STANDARD.encode(chunk);
                new_prefixes.push(prefix.clone());
                entries.push(PrefixEntry { prefix, index: idx });
            }
        }

        self.store.insert_batch(entries).await?;
        self.cache.set_idx(idx).await?;
        self.cache.add_prefix_members(&new_prefixes).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safebrowsing::{Additions, RawHashes};

    #[test]
    fn constants_match_spec() {
        assert_eq!(DEFAULT_WAIT_DURATION, Duration::from_secs(1800));
        assert_eq!(BACK_OFF_INTERVAL, Duration::from_secs(3));
        assert_eq!(BREAK_TIME, Duration::from_secs(300));
    }

    #[test]
    fn additions_split_into_prefix_windows() {
        // 8 raw bytes at prefixSize=4 -> two 4-byte prefixes (S6 in spec.md §8).
        let raw = base64::engine::general_purpose::STANDARD.encode([1u8, 2, 3, 4, 5, 6, 7, 8]);
        let addition = Additions {
            compression_type: "RAW".to_string(),
            raw_hashes: RawHashes { prefix_size: 4, raw_hashes: raw },
        };
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&addition.raw_hashes.raw_hashes)
            .unwrap();
        let chunks: Vec<&[u8]> = decoded.chunks(addition.raw_hashes.prefix_size).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], [1, 2, 3, 4]);
        assert_eq!(chunks[1], [5, 6, 7, 8]);
    }
}
