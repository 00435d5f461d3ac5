// src/store/cache.rs — TTL read cache in front of the transcript store

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::chat::message::{SessionSummary, Transcript};
use crate::store::server::StoreHandle;

struct CacheEntry {
    fetched_at: Instant,
    transcript: Transcript,
}

/// Store handle with a short-TTL read cache, bounding read amplification
/// under repeated polling of the same session. A write to a key replaces
/// that key's cached entry immediately, so a reader never sees a stale
/// transcript after its own write.
#[derive(Clone)]
pub struct CachedStore {
    handle: StoreHandle,
    ttl: Duration,
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl CachedStore {
    pub fn new(handle: StoreHandle, ttl: Duration) -> Self {
        Self {
            handle,
            ttl,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn get_transcript(&self, session_id: &str) -> anyhow::Result<Transcript> {
        if let Some(cached) = self.cached(session_id) {
            return Ok(cached);
        }

        let transcript = self.handle.get_transcript(session_id.to_string()).await?;
        self.store_entry(session_id, transcript.clone());
        Ok(transcript)
    }

    pub async fn put_transcript(
        &self,
        session_id: &str,
        transcript: Transcript,
    ) -> anyhow::Result<()> {
        // Drop the stale entry before the write so a failed put cannot
        // leave the old value cached past it.
        self.invalidate(session_id);
        self.handle
            .put_transcript(session_id.to_string(), transcript.clone())
            .await?;
        self.store_entry(session_id, transcript);
        Ok(())
    }

    pub async fn add_summary(&self, summary: SessionSummary) -> anyhow::Result<()> {
        self.handle.add_summary(summary).await
    }

    pub async fn list_summaries(&self) -> anyhow::Result<Vec<SessionSummary>> {
        self.handle.list_summaries().await
    }

    pub fn invalidate(&self, session_id: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(session_id);
        }
    }

    fn cached(&self, session_id: &str) -> Option<Transcript> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(session_id) {
            Some(entry) if entry.fetched_at.elapsed() < self.ttl => {
                Some(entry.transcript.clone())
            }
            Some(_) => {
                // Expired: drop it now rather than letting it linger.
                entries.remove(session_id);
                None
            }
            None => None,
        }
    }

    fn store_entry(&self, session_id: &str, transcript: Transcript) {
        if let Ok(mut entries) = self.entries.lock() {
            // Sweep expired entries on every insert so the map stays
            // bounded by the set of sessions touched within one TTL.
            let ttl = self.ttl;
            entries.retain(|_, entry| entry.fetched_at.elapsed() < ttl);
            entries.insert(
                session_id.to_string(),
                CacheEntry {
                    fetched_at: Instant::now(),
                    transcript,
                },
            );
        }
    }
}
