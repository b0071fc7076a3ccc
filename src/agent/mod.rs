//! The fortune agent.
//!
//! Sequences one reading: extract features → determine state → select the
//! mother verdict from the book → let the LLM nudge its tone → remember the
//! exchange. The agent owns its session memory; build one instance per
//! logical session and hand it around explicitly.

pub mod perturb;

use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::features::Features;
use crate::providers::CompletionProvider;
use crate::state::{classify, DestinyState};
use crate::verdicts::{select, Language};
use self::perturb::Perturbation;

/// One remembered reading. Append-only during the process lifetime; the only
/// read the pipeline performs is the list length, which feeds attempt_count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub question: String,
    pub result: String,
    pub state: DestinyState,
    pub mother_verdict: String,
    pub features: Features,
    pub timestamp: DateTime<Local>,
}

/// Intermediate trace, returned only when the caller asks for it.
#[derive(Debug, Clone, Serialize)]
pub struct Reasoning {
    pub features: Features,
    pub state: DestinyState,
    pub mother_verdict: String,
    pub perturbation: &'static str,
}

/// Outcome of one reading.
///
/// Carries its own mother verdict and feature snapshot: callers that persist
/// the reading must take them from here, not from a later look at shared
/// memory, where a concurrent reading may already have appended.
#[derive(Debug, Clone, Serialize)]
pub struct Reading {
    pub result: String,
    pub state: DestinyState,
    pub mother_verdict: String,
    pub features: Features,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Reasoning>,
}

pub struct FortuneAgent {
    perturbation: Perturbation,
    memory: Mutex<Vec<MemoryEntry>>,
}

impl FortuneAgent {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            perturbation: Perturbation::new(provider),
            memory: Mutex::new(Vec::new()),
        }
    }

    /// Run the full reading pipeline for one question.
    ///
    /// Perturbation failures are absorbed inside the step itself; an error
    /// surfacing from here means a defect in extraction or classification,
    /// and is logged and propagated unmodified.
    pub async fn execute(
        &self,
        question: &str,
        language: Language,
        enable_reasoning: bool,
    ) -> Result<Reading> {
        // The lock spans the length read through the append so concurrent
        // requests cannot lose attempt_count updates.
        let mut memory = self.memory.lock().await;

        let features = Features::extract(question, memory.len());
        let state = classify(&features);
        tracing::info!(state = %state, "determined destiny state");

        let mother_verdict = select(state, &features, language);
        let result = self
            .perturbation
            .perturb(mother_verdict, &features, language)
            .await;

        memory.push(MemoryEntry {
            question: question.to_string(),
            result: result.clone(),
            state,
            mother_verdict: mother_verdict.to_string(),
            features: features.clone(),
            timestamp: Local::now(),
        });
        drop(memory);

        let reasoning = enable_reasoning.then(|| Reasoning {
            features: features.clone(),
            state,
            mother_verdict: mother_verdict.to_string(),
            perturbation: "applied",
        });

        Ok(Reading {
            result,
            state,
            mother_verdict: mother_verdict.to_string(),
            features,
            reasoning,
        })
    }

    /// Most recent `limit` entries, oldest first.
    pub async fn memory(&self, limit: usize) -> Vec<MemoryEntry> {
        let memory = self.memory.lock().await;
        let skip = memory.len().saturating_sub(limit);
        memory[skip..].to_vec()
    }

    pub async fn memory_len(&self) -> usize {
        self.memory.lock().await.len()
    }

    /// Forget the session. Subsequent attempt counts restart at 1.
    pub async fn clear_memory(&self) {
        self.memory.lock().await.clear();
        tracing::info!("agent memory cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use async_trait::async_trait;

    /// Provider that always fails, so readings use the mother verdict.
    struct DownProvider;

    #[async_trait]
    impl CompletionProvider for DownProvider {
        async fn complete(&self, _: &str, _: f64, _: u32) -> Result<String> {
            Err(LlmError::Request("down".into()).into())
        }
    }

    fn agent() -> FortuneAgent {
        FortuneAgent::new(Arc::new(DownProvider))
    }

    #[tokio::test]
    async fn empty_question_first_attempt_is_empty_heart() {
        let reading = agent().execute("", Language::Zh, false).await.unwrap();
        assert_eq!(reading.state, DestinyState::EmptyHeart);
        assert!(reading.reasoning.is_none());
    }

    #[tokio::test]
    async fn empty_question_second_attempt_is_self_deception() {
        let agent = agent();
        agent.execute("", Language::Zh, false).await.unwrap();
        let reading = agent.execute("", Language::Zh, false).await.unwrap();
        assert_eq!(reading.state, DestinyState::SelfDeception);
    }

    #[tokio::test]
    async fn attempt_count_grows_with_memory() {
        let agent = agent();
        for expected_attempt in 1..=4 {
            agent.execute("走还是留", Language::Zh, false).await.unwrap();
            let entries = agent.memory(10).await;
            assert_eq!(entries.len(), expected_attempt);
            assert_eq!(
                entries.last().unwrap().features.attempt_count,
                expected_attempt
            );
        }
    }

    #[tokio::test]
    async fn clear_memory_resets_attempt_count() {
        let agent = agent();
        agent.execute("走还是留", Language::Zh, false).await.unwrap();
        agent.execute("走还是留", Language::Zh, false).await.unwrap();
        agent.clear_memory().await;
        agent.execute("走还是留", Language::Zh, false).await.unwrap();
        assert_eq!(agent.memory(10).await[0].features.attempt_count, 1);
    }

    #[tokio::test]
    async fn reasoning_trace_carries_the_mother_verdict() {
        let reading = agent()
            .execute("should I take the offer or stay put?", Language::En, true)
            .await
            .unwrap();
        let reasoning = reading.reasoning.expect("reasoning requested");
        assert_eq!(reasoning.state, reading.state);
        // Provider is down, so the result must be the mother verdict itself.
        assert_eq!(reasoning.mother_verdict, reading.result);
        assert_eq!(reasoning.perturbation, "applied");
    }

    #[tokio::test]
    async fn memory_limit_returns_newest_entries() {
        let agent = agent();
        for i in 0..5 {
            agent
                .execute(&format!("question {i}"), Language::En, false)
                .await
                .unwrap();
        }
        let entries = agent.memory(2).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].question, "question 3");
        assert_eq!(entries[1].question, "question 4");
    }
}
