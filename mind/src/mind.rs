use crate::keywords;
use crate::types::{Identity, Memory, MemoryType, Trace};
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub const DEFAULT_SALIENCE: f64 = 0.5;

const RELEVANCE_WEIGHT: f64 = 0.7;
const REFLECT_WINDOW: usize = 20;
const IDENTITY_TRAITS: usize = 5;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS memories (
        id            TEXT PRIMARY KEY,
        content       TEXT NOT NULL,
        memory_type   TEXT NOT NULL,
        source        TEXT,
        salience      REAL NOT NULL,
        created_at    TEXT NOT NULL,
        last_accessed TEXT NOT NULL,
        access_count  INTEGER NOT NULL DEFAULT 0,
        tags          TEXT NOT NULL DEFAULT '[]'
    );
    CREATE INDEX IF NOT EXISTS idx_memories_type ON memories(memory_type);

    CREATE TABLE IF NOT EXISTS traces (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        kind       TEXT NOT NULL,
        detail     TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS identity (
        id            INTEGER PRIMARY KEY CHECK (id = 1),
        summary       TEXT NOT NULL,
        traits        TEXT NOT NULL,
        dominant_type TEXT,
        memory_count  INTEGER NOT NULL,
        updated_at    TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS cache (
        key        TEXT PRIMARY KEY,
        model      TEXT NOT NULL,
        response   TEXT NOT NULL,
        created_at TEXT NOT NULL,
        hit_count  INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS idx_cache_created ON cache(created_at);
";

/// A persistent mind: memories that decay unless recalled, an identity that
/// emerges from them, an activity trace and an LLM response cache, all in
/// one SQLite database.
pub struct Mind {
    conn: Mutex<Connection>,
    location: Option<PathBuf>,
}

impl Mind {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create mind directory at {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open mind database at {}", path.display()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous  = NORMAL;",
        )?;
        Self::init(&conn)?;

        tracing::debug!(path = %path.display(), "Mind opened");

        Ok(Self {
            conn: Mutex::new(conn),
            location: Some(path.to_path_buf()),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            location: None,
        })
    }

    fn init(conn: &Connection) -> Result<()> {
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize mind schema")
    }

    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Mind database lock poisoned"))
    }

    pub fn experience(&self, content: &str, memory_type: MemoryType) -> Result<Memory> {
        self.experience_with(content, memory_type, None, DEFAULT_SALIENCE, &[])
    }

    pub fn experience_with(
        &self,
        content: &str,
        memory_type: MemoryType,
        source: Option<&str>,
        salience: f64,
        tags: &[String],
    ) -> Result<Memory> {
        let content = content.trim();
        if content.is_empty() {
            anyhow::bail!("Cannot store an empty memory");
        }

        let mut memory = Memory::new(content, memory_type);
        memory.source = source.map(str::to_string);
        memory.salience = if salience.is_finite() {
            salience.clamp(0.0, 1.0)
        } else {
            DEFAULT_SALIENCE
        };
        memory.tags = tags.to_vec();

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO memories
             (id, content, memory_type, source, salience, created_at, last_accessed, access_count, tags)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                memory.id,
                memory.content,
                memory.memory_type.as_str(),
                memory.source,
                memory.salience,
                memory.created_at,
                memory.last_accessed,
                memory.access_count,
                serde_json::to_string(&memory.tags)?,
            ],
        )?;
        insert_trace(
            &conn,
            "experience",
            &format!("{} {}", memory.memory_type, memory.id),
        )?;

        tracing::debug!(id = %memory.id, kind = %memory.memory_type, "Memory stored");
        Ok(memory)
    }

    pub fn get(&self, id: &str) -> Result<Option<Memory>> {
        let conn = self.conn()?;
        let memory = conn
            .query_row(
                "SELECT id, content, memory_type, source, salience, created_at,
                        last_accessed, access_count, tags
                 FROM memories WHERE id = ?1",
                params![id],
                memory_from_row,
            )
            .optional()?;
        Ok(memory)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    pub fn memories(&self, memory_type: Option<MemoryType>) -> Result<Vec<Memory>> {
        let conn = self.conn()?;
        load_memories(&conn, memory_type)
    }

    /// Returns up to `limit` memories ranked by keyword relevance blended with
    /// strength. Returned memories are reinforced: their access count goes up
    /// and their decay clock restarts.
    /// An empty query returns the strongest memories; a query with no usable
    /// keywords (only stopwords or short words) returns nothing.
    pub fn recall(&self, query: &str, limit: usize) -> Result<Vec<(Memory, f64)>> {
        let now = Utc::now();
        let terms: HashSet<String> = keywords::tokenize(query).into_iter().collect();
        let browse = query.trim().is_empty();
        if !browse && terms.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn()?;
        let mut scored: Vec<(Memory, f64)> = load_memories(&conn, None)?
            .into_iter()
            .filter_map(|m| {
                let strength = m.strength(now);
                if browse {
                    return Some((m, strength));
                }
                let haystack = format!("{} {}", m.content, m.tags.join(" "));
                let relevance = keywords::relevance(&terms, &haystack);
                (relevance > 0.0).then(|| {
                    let score = RELEVANCE_WEIGHT * relevance + (1.0 - RELEVANCE_WEIGHT) * strength;
                    (m, score)
                })
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(limit);

        let tx = conn.unchecked_transaction()?;
        for (memory, _) in &mut scored {
            tx.execute(
                "UPDATE memories SET access_count = access_count + 1, last_accessed = ?1
                 WHERE id = ?2",
                params![now, memory.id],
            )?;
            memory.access_count += 1;
            memory.last_accessed = now;
        }
        insert_trace(
            &tx,
            "recall",
            &format!("{} hits for '{}'", scored.len(), query),
        )?;
        tx.commit()?;

        Ok(scored)
    }

    /// Deletes memories whose current strength fell below `threshold`.
    pub fn forget(&self, threshold: f64) -> Result<usize> {
        let now = Utc::now();
        let conn = self.conn()?;
        let weak: Vec<String> = load_memories(&conn, None)?
            .into_iter()
            .filter(|m| m.strength(now) < threshold)
            .map(|m| m.id)
            .collect();

        let tx = conn.unchecked_transaction()?;
        for id in &weak {
            tx.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
        }
        insert_trace(
            &tx,
            "forget",
            &format!("{} memories below {:.3}", weak.len(), threshold),
        )?;
        tx.commit()?;

        if !weak.is_empty() {
            tracing::info!(forgotten = weak.len(), threshold, "Memories forgotten");
        }
        Ok(weak.len())
    }

    /// Derives identity from the strongest memories and persists it.
    pub fn reflect(&self) -> Result<Identity> {
        let now = Utc::now();
        let memories = self.memories(None)?;
        let identity = derive_identity(&memories, now);
        self.set_identity(&identity)?;
        self.trace("reflect", &identity.summary)?;
        Ok(identity)
    }

    pub fn identity(&self) -> Result<Option<Identity>> {
        let conn = self.conn()?;
        let identity = conn
            .query_row(
                "SELECT summary, traits, dominant_type, memory_count, updated_at
                 FROM identity WHERE id = 1",
                [],
                |row| {
                    let traits: String = row.get(1)?;
                    let dominant: Option<String> = row.get(2)?;
                    let memory_count: i64 = row.get(3)?;
                    Ok(Identity {
                        summary: row.get(0)?,
                        traits: serde_json::from_str(&traits).map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e))
                        })?,
                        dominant_type: dominant
                            .map(|d| parse_memory_type(2, &d))
                            .transpose()?,
                        memory_count: usize::try_from(memory_count).unwrap_or_default(),
                        updated_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(identity)
    }

    pub fn set_identity(&self, identity: &Identity) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO identity
             (id, summary, traits, dominant_type, memory_count, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?5)",
            params![
                identity.summary,
                serde_json::to_string(&identity.traits)?,
                identity.dominant_type.map(MemoryType::as_str),
                i64::try_from(identity.memory_count).unwrap_or(i64::MAX),
                identity.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn trace(&self, kind: &str, detail: &str) -> Result<()> {
        let conn = self.conn()?;
        insert_trace(&conn, kind, detail)
    }

    /// Most recent traces first.
    pub fn traces(&self, limit: usize) -> Result<Vec<Trace>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, kind, detail, created_at FROM traces ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
            Ok(Trace {
                id: row.get(0)?,
                kind: row.get(1)?,
                detail: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Into::into)
    }
}

fn insert_trace(conn: &Connection, kind: &str, detail: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO traces (kind, detail, created_at) VALUES (?1, ?2, ?3)",
        params![kind, detail, Utc::now()],
    )?;
    Ok(())
}

fn load_memories(conn: &Connection, memory_type: Option<MemoryType>) -> Result<Vec<Memory>> {
    let mut stmt = conn.prepare(
        "SELECT id, content, memory_type, source, salience, created_at,
                last_accessed, access_count, tags
         FROM memories
         WHERE ?1 IS NULL OR memory_type = ?1
         ORDER BY created_at ASC",
    )?;
    let rows = stmt.query_map(params![memory_type.map(MemoryType::as_str)], memory_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(Into::into)
}

fn memory_from_row(row: &Row<'_>) -> rusqlite::Result<Memory> {
    let memory_type: String = row.get(2)?;
    let tags: String = row.get(8)?;
    Ok(Memory {
        id: row.get(0)?,
        content: row.get(1)?,
        memory_type: parse_memory_type(2, &memory_type)?,
        source: row.get(3)?,
        salience: row.get(4)?,
        created_at: row.get(5)?,
        last_accessed: row.get(6)?,
        access_count: row.get(7)?,
        tags: serde_json::from_str(&tags)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?,
    })
}

fn parse_memory_type(column: usize, value: &str) -> rusqlite::Result<MemoryType> {
    value
        .parse::<MemoryType>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, e.into()))
}

fn derive_identity(memories: &[Memory], now: DateTime<Utc>) -> Identity {
    if memories.is_empty() {
        return Identity::empty();
    }

    let mut ranked: Vec<(&Memory, f64)> = memories.iter().map(|m| (m, m.strength(now))).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(REFLECT_WINDOW);

    let traits = keywords::top_keywords(
        ranked.iter().map(|(m, s)| (m.content.as_str(), *s)),
        IDENTITY_TRAITS,
    );

    let mut dominant = MemoryType::ALL[0];
    let mut dominant_count = 0;
    for kind in MemoryType::ALL {
        let count = memories.iter().filter(|m| m.memory_type == kind).count();
        if count > dominant_count {
            dominant = kind;
            dominant_count = count;
        }
    }

    let mut summary = format!(
        "Shaped by {} memories, mostly {}.",
        memories.len(),
        dominant
    );
    if !traits.is_empty() {
        summary.push_str(&format!(" Recurring themes: {}.", traits.join(", ")));
    }

    Identity {
        summary,
        traits,
        dominant_type: Some(dominant),
        memory_count: memories.len(),
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn experience_and_get() {
        let mind = Mind::in_memory().unwrap();
        let memory = mind
            .experience("User prefers Rust for systems work", MemoryType::Semantic)
            .unwrap();
        let loaded = mind.get(&memory.id).unwrap().unwrap();
        assert_eq!(loaded.content, "User prefers Rust for systems work");
        assert_eq!(loaded.memory_type, MemoryType::Semantic);
        assert_eq!(mind.count().unwrap(), 1);
    }

    #[test]
    fn empty_content_is_rejected() {
        let mind = Mind::in_memory().unwrap();
        assert!(mind.experience("   ", MemoryType::Episodic).is_err());
        assert_eq!(mind.count().unwrap(), 0);
    }

    #[test]
    fn salience_is_clamped() {
        let mind = Mind::in_memory().unwrap();
        let memory = mind
            .experience_with("loud", MemoryType::Episodic, Some("test"), 4.0, &[])
            .unwrap();
        assert_eq!(memory.salience, 1.0);
        assert_eq!(memory.source.as_deref(), Some("test"));
    }

    #[test]
    fn recall_ranks_relevant_memories_and_reinforces() {
        let mind = Mind::in_memory().unwrap();
        mind.experience("Tokio is an async runtime for Rust", MemoryType::Semantic)
            .unwrap();
        mind.experience("The cat sleeps on the sofa", MemoryType::Episodic)
            .unwrap();

        let hits = mind.recall("rust async", 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].0.content.contains("Tokio"));
        assert_eq!(hits[0].0.access_count, 1);

        let stored = mind.get(&hits[0].0.id).unwrap().unwrap();
        assert_eq!(stored.access_count, 1);
    }

    #[test]
    fn recall_matches_tags() {
        let mind = Mind::in_memory().unwrap();
        mind.experience_with(
            "Deploy with the blue pipeline",
            MemoryType::Procedural,
            None,
            0.8,
            &["kubernetes".to_string()],
        )
        .unwrap();
        assert_eq!(mind.recall("kubernetes", 3).unwrap().len(), 1);
    }

    #[test]
    fn empty_query_returns_strongest() {
        let mind = Mind::in_memory().unwrap();
        mind.experience_with("weak", MemoryType::Episodic, None, 0.1, &[])
            .unwrap();
        mind.experience_with("strong", MemoryType::Episodic, None, 0.9, &[])
            .unwrap();
        let hits = mind.recall("", 1).unwrap();
        assert_eq!(hits[0].0.content, "strong");
    }

    #[test]
    fn stopword_query_recalls_nothing() {
        let mind = Mind::in_memory().unwrap();
        mind.experience("The user prefers short answers", MemoryType::Semantic)
            .unwrap();
        assert!(mind.recall("what is it", 5).unwrap().is_empty());

        let stored = &mind.memories(None).unwrap()[0];
        assert_eq!(stored.access_count, 0);
    }

    #[test]
    fn forget_prunes_weak_memories() {
        let mind = Mind::in_memory().unwrap();
        mind.experience_with("faint", MemoryType::Episodic, None, 0.05, &[])
            .unwrap();
        mind.experience_with("vivid", MemoryType::Semantic, None, 0.9, &[])
            .unwrap();
        assert_eq!(mind.forget(0.1).unwrap(), 1);
        assert_eq!(mind.count().unwrap(), 1);
    }

    #[test]
    fn reflect_derives_identity() {
        let mind = Mind::in_memory().unwrap();
        assert!(mind.identity().unwrap().is_none());

        mind.experience("Rust compilers are fascinating", MemoryType::Semantic)
            .unwrap();
        mind.experience("Wrote a Rust parser today", MemoryType::Episodic)
            .unwrap();
        mind.experience("Rust borrow checker rules", MemoryType::Semantic)
            .unwrap();

        let identity = mind.reflect().unwrap();
        assert_eq!(identity.memory_count, 3);
        assert_eq!(identity.dominant_type, Some(MemoryType::Semantic));
        assert_eq!(identity.traits.first().map(String::as_str), Some("rust"));

        let stored = mind.identity().unwrap().unwrap();
        assert_eq!(stored.summary, identity.summary);
        assert_eq!(stored.traits, identity.traits);
    }

    #[test]
    fn reflect_without_memories_is_empty() {
        let mind = Mind::in_memory().unwrap();
        let identity = mind.reflect().unwrap();
        assert!(identity.traits.is_empty());
        assert_eq!(identity.dominant_type, None);
    }

    #[test]
    fn traces_are_newest_first() {
        let mind = Mind::in_memory().unwrap();
        mind.trace("first", "a").unwrap();
        mind.trace("second", "b").unwrap();
        let traces = mind.traces(1).unwrap();
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].kind, "second");
    }

    #[test]
    fn persists_across_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("mind.db");
        {
            let mind = Mind::open(&path).unwrap();
            mind.experience("remember me", MemoryType::Semantic).unwrap();
            mind.reflect().unwrap();
        }
        let mind = Mind::open(&path).unwrap();
        assert_eq!(mind.count().unwrap(), 1);
        assert!(mind.identity().unwrap().is_some());
        assert_eq!(mind.location(), Some(path.as_path()));
    }
}
