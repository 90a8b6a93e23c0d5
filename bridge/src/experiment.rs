//! A/B testing across providers.
//!
//! Subjects (users, sessions, prompts) are assigned to variants by hashing
//! `experiment/subject`, so the same subject always lands on the same
//! variant for a given experiment and weights are respected across subjects.

use crate::traits::{ChatMessage, LLMProvider};
use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

struct Variant {
    name: String,
    weight: u32,
    provider: Arc<dyn LLMProvider>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentResult {
    pub experiment: String,
    pub variant: String,
    pub subject: String,
    pub latency_ms: u64,
    pub success: bool,
    pub response: Option<String>,
    pub error: Option<String>,
    pub score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariantStats {
    pub variant: String,
    pub runs: usize,
    pub successes: usize,
    pub success_rate: f64,
    pub mean_latency_ms: f64,
    pub mean_score: Option<f64>,
}

pub struct Experiment {
    name: String,
    variants: Vec<Variant>,
    results: Mutex<Vec<ExperimentResult>>,
}

impl Experiment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variants: Vec::new(),
            results: Mutex::new(Vec::new()),
        }
    }

    pub fn variant(self, name: impl Into<String>, provider: Arc<dyn LLMProvider>) -> Self {
        self.weighted_variant(name, 1, provider)
    }

    /// Adds a variant drawing `weight` shares of traffic. Zero-weight
    /// variants are never assigned.
    pub fn weighted_variant(
        mut self,
        name: impl Into<String>,
        weight: u32,
        provider: Arc<dyn LLMProvider>,
    ) -> Self {
        let name = name.into();
        self.variants.retain(|v| v.name != name);
        self.variants.push(Variant {
            name,
            weight,
            provider,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variant_names(&self) -> Vec<&str> {
        self.variants.iter().map(|v| v.name.as_str()).collect()
    }

    fn results_lock(&self) -> MutexGuard<'_, Vec<ExperimentResult>> {
        self.results.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Variant assigned to `subject`.
    pub fn assign(&self, subject: &str) -> Result<&str> {
        let total: u64 = self.variants.iter().map(|v| u64::from(v.weight)).sum();
        if total == 0 {
            return Err(anyhow!("Experiment '{}' has no weighted variants", self.name));
        }

        let digest = ring::digest::digest(
            &ring::digest::SHA256,
            format!("{}/{}", self.name, subject).as_bytes(),
        );
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest.as_ref()[..8]);
        let mut bucket = u64::from_be_bytes(prefix) % total;

        for variant in &self.variants {
            let weight = u64::from(variant.weight);
            if bucket < weight {
                return Ok(&variant.name);
            }
            bucket -= weight;
        }

        Err(anyhow!("Experiment '{}' failed to assign a variant", self.name))
    }

    /// Runs the subject's variant and records the outcome. Provider failures
    /// are recorded as unsuccessful results, not returned as errors.
    pub async fn run(
        &self,
        subject: &str,
        messages: &[ChatMessage],
        temperature: f64,
    ) -> Result<ExperimentResult> {
        let variant_name = self.assign(subject)?;
        let variant = self
            .variants
            .iter()
            .find(|v| v.name == variant_name)
            .ok_or_else(|| anyhow!("Unknown variant {}", variant_name))?;

        let started = Instant::now();
        let outcome = variant.provider.chat(messages, temperature).await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (success, response, error) = match outcome {
            Ok(response) => (true, Some(response.text), None),
            Err(e) => {
                tracing::warn!(
                    experiment = %self.name,
                    variant = %variant.name,
                    "Variant failed: {}",
                    e
                );
                (false, None, Some(e.to_string()))
            }
        };

        let result = ExperimentResult {
            experiment: self.name.clone(),
            variant: variant.name.clone(),
            subject: subject.to_string(),
            latency_ms,
            success,
            response,
            error,
            score: None,
            created_at: Utc::now(),
        };
        self.results_lock().push(result.clone());
        Ok(result)
    }

    /// Attaches a rating to the subject's most recent result.
    pub fn score(&self, subject: &str, score: f64) -> bool {
        let mut results = self.results_lock();
        match results.iter_mut().rev().find(|r| r.subject == subject) {
            Some(result) => {
                result.score = Some(score);
                true
            }
            None => false,
        }
    }

    pub fn results(&self) -> Vec<ExperimentResult> {
        self.results_lock().clone()
    }

    /// Per-variant statistics, in the order variants were added.
    pub fn summary(&self) -> Vec<VariantStats> {
        let results = self.results_lock();
        self.variants
            .iter()
            .map(|variant| {
                let runs: Vec<&ExperimentResult> =
                    results.iter().filter(|r| r.variant == variant.name).collect();
                let successes = runs.iter().filter(|r| r.success).count();
                let scores: Vec<f64> = runs.iter().filter_map(|r| r.score).collect();

                VariantStats {
                    variant: variant.name.clone(),
                    runs: runs.len(),
                    successes,
                    success_rate: ratio(successes as f64, runs.len()),
                    mean_latency_ms: ratio(
                        runs.iter().map(|r| r.latency_ms as f64).sum(),
                        runs.len(),
                    ),
                    mean_score: (!scores.is_empty())
                        .then(|| scores.iter().sum::<f64>() / scores.len() as f64),
                }
            })
            .collect()
    }

    /// Best variant so far: highest mean score when any variant is scored,
    /// otherwise highest success rate, ties going to lower latency.
    pub fn winner(&self) -> Option<String> {
        let stats: Vec<VariantStats> = self.summary().into_iter().filter(|s| s.runs > 0).collect();
        let scored = stats.iter().any(|s| s.mean_score.is_some());

        stats
            .into_iter()
            .max_by(|a, b| {
                let primary = if scored {
                    a.mean_score
                        .unwrap_or(f64::MIN)
                        .total_cmp(&b.mean_score.unwrap_or(f64::MIN))
                } else {
                    a.success_rate.total_cmp(&b.success_rate)
                };
                primary.then_with(|| b.mean_latency_ms.total_cmp(&a.mean_latency_ms))
            })
            .map(|s| s.variant)
    }
}

fn ratio(total: f64, count: usize) -> f64 {
    if count == 0 { 0.0 } else { total / count as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::CallableLLM;

    fn reply(text: &'static str) -> Arc<dyn LLMProvider> {
        Arc::new(CallableLLM::new(move |_| Ok(text.to_string())))
    }

    fn experiment() -> Experiment {
        Experiment::new("tone")
            .variant("formal", reply("Good afternoon."))
            .variant("casual", reply("hey!"))
    }

    #[test]
    fn assignment_is_sticky() {
        let exp = experiment();
        let first = exp.assign("user-42").unwrap().to_string();
        for _ in 0..10 {
            assert_eq!(exp.assign("user-42").unwrap(), first);
        }
    }

    #[test]
    fn assignment_spreads_subjects() {
        let exp = experiment();
        let formal = (0..200)
            .filter(|i| exp.assign(&format!("user-{i}")).unwrap() == "formal")
            .count();
        assert!((50..150).contains(&formal), "formal got {formal}/200");
    }

    #[test]
    fn zero_weight_is_never_assigned() {
        let exp = Experiment::new("rollout")
            .weighted_variant("old", 1, reply("old"))
            .weighted_variant("new", 0, reply("new"));
        for i in 0..50 {
            assert_eq!(exp.assign(&i.to_string()).unwrap(), "old");
        }
        assert!(Experiment::new("empty").assign("x").is_err());
    }

    #[tokio::test]
    async fn run_records_results_and_scores() {
        let exp = experiment();
        let result = exp
            .run("user-1", &[ChatMessage::user("greet me")], 0.7)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.variant, exp.assign("user-1").unwrap());

        assert!(exp.score("user-1", 4.0));
        assert!(!exp.score("nobody", 1.0));

        let stats = exp.summary();
        let stat = stats.iter().find(|s| s.variant == result.variant).unwrap();
        assert_eq!(stat.runs, 1);
        assert_eq!(stat.success_rate, 1.0);
        assert_eq!(stat.mean_score, Some(4.0));
        assert_eq!(exp.winner(), Some(result.variant));
    }

    #[tokio::test]
    async fn failures_are_recorded() {
        let exp = Experiment::new("outage")
            .variant("broken", Arc::new(CallableLLM::new(|_| Err(anyhow!("boom")))));
        let result = exp.run("s", &[ChatMessage::user("hi")], 0.0).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("boom"));
        assert_eq!(exp.summary()[0].success_rate, 0.0);
    }

    #[tokio::test]
    async fn winner_prefers_success_without_scores() {
        let exp = Experiment::new("stability")
            .variant("flaky", Arc::new(CallableLLM::new(|_| Err(anyhow!("boom")))))
            .variant("solid", reply("ok"));
        assert_eq!(exp.winner(), None);
        for i in 0..20 {
            exp.run(&format!("s{i}"), &[ChatMessage::user("hi")], 0.0)
                .await
                .unwrap();
        }
        assert_eq!(exp.winner().as_deref(), Some("solid"));
    }
}
