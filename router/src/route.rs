//! Selector-complexity routing.
//!
//! A query is classified by how hard it is to *select* the tools that answer
//! it, not by how hard the tools are to run:
//!
//! - `SC0`: one tool is clearly named. Call it.
//! - `SC1`: several tools form a fixed chain. Run them as a pipeline.
//! - `SC2`: the right tool depends on a condition, or several tools compete
//!   for the same step. Search over the candidates.
//! - `SC3`: nothing in the catalog fits, or the request is exploratory.
//!   Hand it to a fully agentic loop.

use crate::catalog::{ToolCatalog, ToolMatch, normalize};
use serde::{Deserialize, Serialize};

const SEQUENCE_MARKERS: &[&str] = &[
    " then ",
    " after that ",
    " afterwards ",
    " followed by ",
    " next ",
    " finally ",
    " and pipe ",
];

const CONDITIONAL_MARKERS: &[&str] = &[
    " if ",
    " unless ",
    " depending on ",
    " whether ",
    " otherwise ",
    " in case ",
];

const OPEN_ENDED_MARKERS: &[&str] = &[
    " figure out ",
    " explore ",
    " investigate ",
    " research ",
    " best way ",
    " optimize ",
    " brainstorm ",
    " come up with ",
    " strategy ",
];

/// Second-best match scoring at least this fraction of the best counts as competing.
const COMPETING_RATIO: f64 = 0.8;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScLevel {
    #[serde(rename = "SC0")]
    Sc0,
    #[serde(rename = "SC1")]
    Sc1,
    #[serde(rename = "SC2")]
    Sc2,
    #[serde(rename = "SC3")]
    Sc3,
}

impl ScLevel {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Sc0 => 0,
            Self::Sc1 => 1,
            Self::Sc2 => 2,
            Self::Sc3 => 3,
        }
    }

    pub fn strategy(self) -> Strategy {
        match self {
            Self::Sc0 => Strategy::Direct,
            Self::Sc1 => Strategy::Pipeline,
            Self::Sc2 => Strategy::Search,
            Self::Sc3 => Strategy::Agentic,
        }
    }
}

impl std::fmt::Display for ScLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SC{}", self.as_u8())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Direct,
    Pipeline,
    Search,
    Agentic,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Pipeline => write!(f, "pipeline"),
            Self::Search => write!(f, "search"),
            Self::Agentic => write!(f, "agentic"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Routing {
    pub level: ScLevel,
    pub strategy: Strategy,
    pub tools: Vec<String>,
    pub confidence: f64,
    pub reason: String,
}

impl Routing {
    fn new(level: ScLevel, tools: Vec<String>, confidence: f64, reason: impl Into<String>) -> Self {
        Self {
            level,
            strategy: level.strategy(),
            tools,
            confidence,
            reason: reason.into(),
        }
    }
}

/// Classifies `query` against `catalog`.
pub fn route(query: &str, catalog: &ToolCatalog) -> Routing {
    if query.trim().is_empty() {
        return Routing::new(ScLevel::Sc0, Vec::new(), 0.0, "empty query");
    }

    let text = normalize(query);
    let has = |markers: &[&str]| markers.iter().any(|m| text.contains(m));
    let sequential = has(SEQUENCE_MARKERS);
    let conditional = has(CONDITIONAL_MARKERS);
    let open_ended = has(OPEN_ENDED_MARKERS);

    let matches = catalog.matches(query);
    let names = |ms: &[ToolMatch]| ms.iter().map(|m| m.name.clone()).collect::<Vec<_>>();

    let routing = if matches.is_empty() {
        Routing::new(
            ScLevel::Sc3,
            Vec::new(),
            if open_ended { 0.7 } else { 0.5 },
            "no catalog tool matches the query",
        )
    } else if open_ended {
        Routing::new(ScLevel::Sc3, names(&matches), 0.6, "open-ended request")
    } else if conditional {
        Routing::new(
            ScLevel::Sc2,
            names(&matches),
            0.7,
            "tool choice depends on a condition",
        )
    } else if matches.len() == 1 {
        let confidence = (0.5 + matches[0].score / 4.0).min(0.95);
        Routing::new(ScLevel::Sc0, names(&matches), confidence, "single tool named")
    } else if sequential || has_data_links(&matches, catalog) {
        Routing::new(
            ScLevel::Sc1,
            pipeline_order(&matches, catalog),
            0.8,
            "tools form a fixed chain",
        )
    } else if matches[1].score >= matches[0].score * COMPETING_RATIO {
        let floor = matches[0].score * COMPETING_RATIO;
        let competing: Vec<ToolMatch> = matches.into_iter().filter(|m| m.score >= floor).collect();
        Routing::new(
            ScLevel::Sc2,
            names(&competing),
            0.6,
            "several tools compete for the same step",
        )
    } else {
        Routing::new(
            ScLevel::Sc0,
            vec![matches[0].name.clone()],
            0.75,
            "one tool clearly dominates",
        )
    };

    tracing::debug!(
        level = %routing.level,
        strategy = %routing.strategy,
        tools = ?routing.tools,
        "Query routed"
    );
    routing
}

fn has_data_links(matches: &[ToolMatch], catalog: &ToolCatalog) -> bool {
    matches.iter().any(|a| {
        matches.iter().any(|b| {
            a.name != b.name
                && matches!(
                    (catalog.get(&a.name), catalog.get(&b.name)),
                    (Some(ta), Some(tb)) if ta.feeds(tb)
                )
        })
    })
}

/// Orders matched tools so producers precede consumers, falling back to the
/// order in which the query mentions them.
fn pipeline_order(matches: &[ToolMatch], catalog: &ToolCatalog) -> Vec<String> {
    let mut pending: Vec<&ToolMatch> = matches.iter().collect();
    pending.sort_by_key(|m| m.position);

    let mut ordered = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        let has_producer = |candidate: &ToolMatch| {
            pending.iter().any(|other| {
                other.name != candidate.name
                    && matches!(
                        (catalog.get(&other.name), catalog.get(&candidate.name)),
                        (Some(producer), Some(consumer)) if producer.feeds(consumer)
                    )
            })
        };
        // A cycle leaves no ready tool; take the earliest mention.
        let next = pending
            .iter()
            .position(|m| !has_producer(m))
            .unwrap_or(0);
        ordered.push(pending.remove(next).name.clone());
    }
    ordered
}
