//! LLM response cache.
//!
//! Rows live in the mind database next to memories and are keyed by a
//! SHA-256 of `(model, system prompt, user prompt)`. Expired rows are removed
//! lazily on lookup and by [`Mind::cache_evict`].

use crate::mind::Mind;
use crate::types::{CacheEntry, CacheStats};
use anyhow::Result;
use chrono::{Duration, Utc};
use rusqlite::{OptionalExtension, params};

impl Mind {
    /// Deterministic cache key for a prompt sent to `model`.
    pub fn cache_key(model: &str, system_prompt: Option<&str>, prompt: &str) -> String {
        let mut ctx = ring::digest::Context::new(&ring::digest::SHA256);
        ctx.update(model.as_bytes());
        ctx.update(b"|");
        if let Some(system) = system_prompt {
            ctx.update(system.as_bytes());
        }
        ctx.update(b"|");
        ctx.update(prompt.as_bytes());

        hex::encode(ctx.finish())
    }

    /// Returns the live entry for `key` and counts the hit. An entry older
    /// than `ttl` is deleted and reported as a miss.
    pub fn cache_get(&self, key: &str, ttl: Duration) -> Result<Option<CacheEntry>> {
        let now = Utc::now();
        let conn = self.conn()?;

        let entry = conn
            .query_row(
                "SELECT key, model, response, created_at, hit_count FROM cache WHERE key = ?1",
                params![key],
                |row| {
                    let hits: i64 = row.get(4)?;
                    Ok(CacheEntry {
                        key: row.get(0)?,
                        model: row.get(1)?,
                        response: row.get(2)?,
                        created_at: row.get(3)?,
                        hit_count: u64::try_from(hits).unwrap_or_default(),
                    })
                },
            )
            .optional()?;

        let Some(mut entry) = entry else {
            return Ok(None);
        };

        if entry.is_expired(ttl, now) {
            conn.execute("DELETE FROM cache WHERE key = ?1", params![key])?;
            tracing::debug!(key, "Cache entry expired");
            return Ok(None);
        }

        conn.execute(
            "UPDATE cache SET hit_count = hit_count + 1 WHERE key = ?1",
            params![key],
        )?;
        entry.hit_count += 1;
        Ok(Some(entry))
    }

    pub fn cache_put(&self, key: &str, model: &str, response: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO cache (key, model, response, created_at, hit_count)
             VALUES (?1, ?2, ?3, ?4, 0)",
            params![key, model, response, Utc::now()],
        )?;
        Ok(())
    }

    /// Drops the oldest entries until at most `max_entries` remain.
    pub fn cache_evict(&self, max_entries: usize) -> Result<usize> {
        let conn = self.conn()?;
        let evicted = conn.execute(
            "DELETE FROM cache WHERE key IN (
                SELECT key FROM cache
                ORDER BY created_at ASC
                LIMIT MAX(0, (SELECT COUNT(*) FROM cache) - ?1)
            )",
            params![i64::try_from(max_entries).unwrap_or(i64::MAX)],
        )?;
        Ok(evicted)
    }

    pub fn cache_clear(&self) -> Result<usize> {
        let conn = self.conn()?;
        Ok(conn.execute("DELETE FROM cache", [])?)
    }

    pub fn cache_stats(&self) -> Result<CacheStats> {
        let conn = self.conn()?;
        let (entries, hits): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(hit_count), 0) FROM cache",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(CacheStats {
            entries: usize::try_from(entries).unwrap_or_default(),
            hits: u64::try_from(hits).unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_deterministic() {
        let k1 = Mind::cache_key("llama3.2", Some("sys"), "hello");
        let k2 = Mind::cache_key("llama3.2", Some("sys"), "hello");
        assert_eq!(k1, k2);
        assert_eq!(k1.len(), 64);
        assert!(k1.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(
            Mind::cache_key("", None, ""),
            "565d240f5343e625ae579a4d45a770f1f02c6368b5ed4d06da4fbe6f47c28866"
        );
    }

    #[test]
    fn cache_key_varies_by_model_and_system() {
        let base = Mind::cache_key("llama3.2", None, "hello");
        assert_ne!(base, Mind::cache_key("qwen2.5", None, "hello"));
        assert_ne!(base, Mind::cache_key("llama3.2", Some("be terse"), "hello"));
    }

    #[test]
    fn put_get_counts_hits() {
        let mind = Mind::in_memory().unwrap();
        let key = Mind::cache_key("m", None, "What is Rust?");
        mind.cache_put(&key, "m", "A systems language.").unwrap();

        let first = mind.cache_get(&key, Duration::hours(1)).unwrap().unwrap();
        assert_eq!(first.response, "A systems language.");
        assert_eq!(first.hit_count, 1);
        mind.cache_get(&key, Duration::hours(1)).unwrap();

        let stats = mind.cache_stats().unwrap();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 2);
    }

    #[test]
    fn miss_returns_none() {
        let mind = Mind::in_memory().unwrap();
        assert!(mind.cache_get("nope", Duration::hours(1)).unwrap().is_none());
    }

    #[test]
    fn expired_entry_is_removed() {
        let mind = Mind::in_memory().unwrap();
        mind.cache_put("k", "m", "r").unwrap();
        assert!(mind.cache_get("k", Duration::zero()).unwrap().is_none());
        assert_eq!(mind.cache_stats().unwrap().entries, 0);
    }

    #[test]
    fn eviction_respects_max_entries() {
        let mind = Mind::in_memory().unwrap();
        for i in 0..5 {
            mind.cache_put(&format!("k{i}"), "m", "r").unwrap();
        }
        assert_eq!(mind.cache_evict(3).unwrap(), 2);
        assert_eq!(mind.cache_stats().unwrap().entries, 3);
        assert_eq!(mind.cache_clear().unwrap(), 3);
    }
}
