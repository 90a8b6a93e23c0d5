use serde::{Deserialize, Serialize};

/// A tool the router can select. Keywords drive matching; `inputs` and
/// `outputs` name data kinds so tools can be chained.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tool {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
}

impl Tool {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            keywords: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }

    /// True when something this tool produces is consumed by `next`.
    pub fn feeds(&self, next: &Tool) -> bool {
        self.outputs.iter().any(|o| next.inputs.contains(o))
    }

    /// Phrases that identify this tool in a query: its name with
    /// underscores/dashes read as spaces, plus its keywords.
    pub(crate) fn phrases(&self) -> Vec<String> {
        let mut phrases = vec![self.name.replace(['_', '-'], " ").to_lowercase()];
        phrases.extend(self.keywords.iter().map(|k| k.to_lowercase()));
        phrases
    }
}
