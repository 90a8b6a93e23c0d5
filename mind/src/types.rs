use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Episodic,
    Semantic,
    Procedural,
    Reflection,
}

impl MemoryType {
    pub const ALL: [MemoryType; 4] = [
        MemoryType::Episodic,
        MemoryType::Semantic,
        MemoryType::Procedural,
        MemoryType::Reflection,
    ];

    /// Hours after which an untouched memory has lost half its strength.
    pub fn half_life_hours(self) -> f64 {
        match self {
            Self::Episodic => 72.0,
            Self::Semantic => 720.0,
            Self::Procedural => 2160.0,
            Self::Reflection => 1440.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Episodic => "episodic",
            Self::Semantic => "semantic",
            Self::Procedural => "procedural",
            Self::Reflection => "reflection",
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "episodic" => Ok(Self::Episodic),
            "semantic" => Ok(Self::Semantic),
            "procedural" => Ok(Self::Procedural),
            "reflection" => Ok(Self::Reflection),
            other => Err(anyhow::anyhow!(
                "Unknown memory type: {}. Available: episodic, semantic, procedural, reflection",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Memory {
    pub id: String,
    pub content: String,
    pub memory_type: MemoryType,
    pub source: Option<String>,
    pub salience: f64,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u32,
    pub tags: Vec<String>,
}

impl Memory {
    pub fn new(content: impl Into<String>, memory_type: MemoryType) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            memory_type,
            source: None,
            salience: 0.5,
            created_at: now,
            last_accessed: now,
            access_count: 0,
            tags: Vec::new(),
        }
    }

    /// Current strength in `[0, 1]`: salience decayed by time since last
    /// access, with a small boost for memories that keep being recalled.
    pub fn strength(&self, now: DateTime<Utc>) -> f64 {
        let age_hours = (now - self.last_accessed).num_seconds().max(0) as f64 / 3600.0;
        let decay = 0.5_f64.powf(age_hours / self.memory_type.half_life_hours());
        let reinforcement = 1.0 + (1.0 + f64::from(self.access_count)).ln() * 0.1;
        (self.salience * decay * reinforcement).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Identity {
    pub summary: String,
    pub traits: Vec<String>,
    pub dominant_type: Option<MemoryType>,
    pub memory_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    pub fn empty() -> Self {
        Self {
            summary: "No memories yet.".to_string(),
            traits: Vec::new(),
            dominant_type: None,
            memory_count: 0,
            updated_at: Utc::now(),
        }
    }

    /// Renders the identity as a system-prompt section.
    pub fn to_prompt(&self) -> String {
        if self.traits.is_empty() {
            return format!("## Identity\n\n{}", self.summary);
        }
        format!(
            "## Identity\n\n{}\n\nTraits: {}",
            self.summary,
            self.traits.join(", ")
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trace {
    pub id: i64,
    pub kind: String,
    pub detail: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub model: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
    pub hit_count: u64,
}

impl CacheEntry {
    pub fn is_expired(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        now - self.created_at >= ttl
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn memory_type_parses_case_insensitive() {
        assert_eq!("Semantic".parse::<MemoryType>().unwrap(), MemoryType::Semantic);
        assert!("dream".parse::<MemoryType>().is_err());
    }

    #[test]
    fn strength_halves_after_half_life() {
        let mut memory = Memory::new("met alice at the station", MemoryType::Episodic);
        memory.salience = 1.0;
        let later = memory.last_accessed + Duration::hours(72);
        let strength = memory.strength(later);
        assert!((strength - 0.5).abs() < 1e-6, "got {strength}");
    }

    #[test]
    fn semantic_decays_slower_than_episodic() {
        let episodic = Memory::new("a", MemoryType::Episodic);
        let mut semantic = episodic.clone();
        semantic.memory_type = MemoryType::Semantic;
        let later = episodic.last_accessed + Duration::days(10);
        assert!(semantic.strength(later) > episodic.strength(later));
    }

    #[test]
    fn recall_reinforces_strength() {
        let fresh = Memory::new("a", MemoryType::Semantic);
        let mut recalled = fresh.clone();
        recalled.access_count = 10;
        let now = fresh.last_accessed;
        assert!(recalled.strength(now) > fresh.strength(now));
    }

    #[test]
    fn cache_entry_expiry() {
        let entry = CacheEntry {
            key: "k".into(),
            model: "m".into(),
            response: "r".into(),
            created_at: Utc::now(),
            hit_count: 0,
        };
        assert!(!entry.is_expired(Duration::minutes(5), entry.created_at));
        assert!(entry.is_expired(Duration::minutes(5), entry.created_at + Duration::minutes(5)));
    }
}
