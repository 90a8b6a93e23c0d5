use crate::tool::Tool;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

const NAME_WEIGHT: f64 = 1.0;
const KEYWORD_WEIGHT: f64 = 0.5;
pub const MIN_MATCH_SCORE: f64 = 0.5;

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    tools: Vec<Tool>,
}

/// How well one tool matches a query, and where it is first mentioned.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolMatch {
    pub name: String,
    pub score: f64,
    pub position: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: Vec<Tool>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tool, replacing any tool with the same name. Returns the replaced tool.
    pub fn register(&mut self, tool: Tool) -> Option<Tool> {
        match self.tools.iter_mut().find(|t| t.name == tool.name) {
            Some(existing) => Some(std::mem::replace(existing, tool)),
            None => {
                self.tools.push(tool);
                None
            }
        }
    }

    pub fn with_tool(mut self, tool: Tool) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(content).context("Failed to parse TOML tool catalog")?;
        Ok(Self::from_tools(file.tools))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let file: CatalogFile =
            serde_yaml::from_str(content).context("Failed to parse YAML tool catalog")?;
        Ok(Self::from_tools(file.tools))
    }

    /// Loads a catalog file, picking the format from its extension.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read tool catalog {}", path.display()))?;

        let catalog = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&content)?,
            Some("yaml" | "yml") => Self::from_yaml(&content)?,
            _ => anyhow::bail!(
                "Unsupported tool catalog format: {} (expected .toml, .yaml or .yml)",
                path.display()
            ),
        };

        tracing::debug!(tools = catalog.len(), path = %path.display(), "Tool catalog loaded");
        Ok(catalog)
    }

    fn from_tools(tools: Vec<Tool>) -> Self {
        let mut catalog = Self::new();
        for tool in tools {
            catalog.register(tool);
        }
        catalog
    }

    /// Tools whose name or keywords occur in `query`, best first.
    pub fn matches(&self, query: &str) -> Vec<ToolMatch> {
        let haystack = normalize(query);

        let mut matches: Vec<ToolMatch> = self
            .tools
            .iter()
            .filter_map(|tool| {
                let mut score = 0.0;
                let mut position = usize::MAX;

                for (i, phrase) in tool.phrases().iter().enumerate() {
                    let needle = format!(" {} ", normalize_words(phrase));
                    if needle.trim().is_empty() {
                        continue;
                    }
                    if let Some(at) = haystack.find(&needle) {
                        score += if i == 0 { NAME_WEIGHT } else { KEYWORD_WEIGHT };
                        position = position.min(at);
                    }
                }

                (score >= MIN_MATCH_SCORE).then(|| ToolMatch {
                    name: tool.name.clone(),
                    score,
                    position,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.position.cmp(&b.position))
                .then_with(|| a.name.cmp(&b.name))
        });
        matches
    }
}

/// Lowercased words separated by single spaces, padded so whole-word
/// matches can be found with a plain substring search.
pub(crate) fn normalize(text: &str) -> String {
    format!(" {} ", normalize_words(text))
}

fn normalize_words(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
