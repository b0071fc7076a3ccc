//! End-to-end agent pipeline tests with stub providers.

use std::sync::Arc;

use async_trait::async_trait;
use tiekou::agent::FortuneAgent;
use tiekou::error::{LlmError, Result};
use tiekou::features::Features;
use tiekou::providers::CompletionProvider;
use tiekou::state::{classify, DestinyState};
use tiekou::verdicts::{select, Language};

/// Succeeds with a fixed rewrite.
struct PolisherStub;

#[async_trait]
impl CompletionProvider for PolisherStub {
    async fn complete(&self, _: &str, _: f64, _: u32) -> Result<String> {
        Ok("polished verdict\nextra line".to_string())
    }
}

/// Always fails, forcing the mother-verdict fallback.
struct DownStub;

#[async_trait]
impl CompletionProvider for DownStub {
    async fn complete(&self, _: &str, _: f64, _: u32) -> Result<String> {
        Err(LlmError::Request("connection reset".into()).into())
    }
}

#[tokio::test]
async fn attempt_count_is_monotonic_until_cleared() {
    let agent = FortuneAgent::new(Arc::new(DownStub));

    for n in 1..=5 {
        agent.execute("要走吗", Language::Zh, false).await.unwrap();
        assert_eq!(agent.memory_len().await, n);
        let last = agent.memory(1).await.pop().unwrap();
        assert_eq!(last.features.attempt_count, n);
    }

    agent.clear_memory().await;
    assert_eq!(agent.memory_len().await, 0);
    agent.execute("要走吗", Language::Zh, false).await.unwrap();
    assert_eq!(agent.memory(1).await.pop().unwrap().features.attempt_count, 1);
}

#[tokio::test]
async fn successful_perturbation_keeps_first_line_only() {
    let agent = FortuneAgent::new(Arc::new(PolisherStub));
    let reading = agent
        .execute("do I stay or do I go now?", Language::En, true)
        .await
        .unwrap();

    assert_eq!(reading.result, "polished verdict");
    let reasoning = reading.reasoning.unwrap();
    assert_ne!(reasoning.mother_verdict, reading.result);
}

#[tokio::test]
async fn failed_perturbation_returns_mother_verdict_verbatim() {
    let agent = FortuneAgent::new(Arc::new(DownStub));
    let reading = agent
        .execute("do I stay or do I go now?", Language::En, true)
        .await
        .unwrap();

    assert_eq!(reading.reasoning.unwrap().mother_verdict, reading.result);
}

#[tokio::test]
async fn stored_feature_snapshot_rederives_the_mother_verdict() {
    // Share-by-id contract: re-deriving the verdict from the stored feature
    // record must reproduce the same mother sentence.
    let agent = FortuneAgent::new(Arc::new(DownStub));
    let reading = agent
        .execute("该不该搬去另一个城市重新开始呢？", Language::Zh, true)
        .await
        .unwrap();
    let entry = agent.memory(1).await.pop().unwrap();

    let snapshot: Features =
        serde_json::from_str(&serde_json::to_string(&entry.features).unwrap()).unwrap();
    let state = classify(&snapshot);
    assert_eq!(state, reading.state);
    assert_eq!(select(state, &snapshot, Language::Zh), entry.mother_verdict);
}

#[tokio::test]
async fn concurrent_readings_keep_their_own_snapshots() {
    // Two in-flight requests against one agent: each reading must carry the
    // mother verdict and feature record of its own question, not whichever
    // entry landed in memory last.
    let agent = Arc::new(FortuneAgent::new(Arc::new(DownStub)));

    let (a, b) = tokio::join!(
        agent.execute("要不要辞职？", Language::Zh, false),
        agent.execute("这段感情还有救吗，到底要不要再坚持下去呢？", Language::Zh, false),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    for reading in [&a, &b] {
        let state = classify(&reading.features);
        assert_eq!(state, reading.state);
        assert_eq!(
            select(state, &reading.features, Language::Zh),
            reading.mother_verdict
        );
        // Provider is down, so the outgoing text is the mother verdict.
        assert_eq!(reading.result, reading.mother_verdict);
    }

    // The lock serialized them: one saw an empty history, the other saw one entry.
    let mut attempts = [a.features.attempt_count, b.features.attempt_count];
    attempts.sort_unstable();
    assert_eq!(attempts, [1, 2]);
}

#[tokio::test]
async fn empty_then_repeat_scenarios() {
    let agent = FortuneAgent::new(Arc::new(DownStub));

    let first = agent.execute("", Language::Zh, false).await.unwrap();
    assert_eq!(first.state, DestinyState::EmptyHeart);

    let second = agent.execute("", Language::Zh, false).await.unwrap();
    assert_eq!(second.state, DestinyState::SelfDeception);
}
