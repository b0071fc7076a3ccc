//! HTTP-level provider tests against a wiremock server.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tiekou::agent::perturb::Perturbation;
use tiekou::features::Features;
use tiekou::providers::openai_compat::OpenAiCompatProvider;
use tiekou::providers::CompletionProvider;
use tiekou::verdicts::Language;

fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "choices": [
            { "message": { "role": "assistant", "content": content } }
        ]
    })
}

#[tokio::test]
async fn parses_a_successful_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "temperature": 0.3,
            "max_tokens": 100
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("算得越多，越证明你已经输了。")))
        .mount(&server)
        .await;

    let provider = OpenAiCompatProvider::new(
        &format!("{}/v1", server.uri()),
        Some("sk-test"),
        "gpt-4o-mini".into(),
        5,
    );

    let out = provider.complete("polish", 0.3, 100).await.unwrap();
    assert_eq!(out, "算得越多，越证明你已经输了。");
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let provider =
        OpenAiCompatProvider::new(&format!("{}/v1", server.uri()), Some("sk-test"), "m".into(), 5);

    let err = provider.complete("polish", 0.3, 100).await.unwrap_err();
    assert!(err.to_string().contains("429"));
}

#[tokio::test]
async fn blank_completion_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("   ")))
        .mount(&server)
        .await;

    let provider =
        OpenAiCompatProvider::new(&format!("{}/v1", server.uri()), Some("sk-test"), "m".into(), 5);

    assert!(provider.complete("polish", 0.3, 100).await.is_err());
}

#[tokio::test]
async fn perturb_falls_back_when_the_endpoint_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion_body("too late"))
                .set_delay(std::time::Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    // 1-second client timeout; the mock responds after 5.
    let provider: Arc<dyn CompletionProvider> = Arc::new(OpenAiCompatProvider::new(
        &format!("{}/v1", server.uri()),
        Some("sk-test"),
        "m".into(),
        1,
    ));

    let features = Features::new(false, 7, true, 2, 3);
    let out = Perturbation::new(provider)
        .perturb("Midnight decisions are often wrong", &features, Language::En)
        .await;
    assert_eq!(out, "Midnight decisions are often wrong");
}
