use super::*;
use serde_json::json;
use std::time::Instant;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(server: &MockServer) -> GenerationClient {
    let config = GeminiConfig {
        base_url: Url::parse(&server.uri()).expect("mock server URI is a valid URL"),
        ..GeminiConfig::default()
    };
    GenerationClient::new(&config, "test-key")
        .expect("create client")
        .with_backoff_unit(Duration::from_millis(10))
}

fn text_response(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [
            { "content": { "parts": [ { "text": text } ] } }
        ]
    }))
}

#[test]
fn backoff_prefers_the_server_advised_wait() {
    let unit = Duration::from_secs(1);
    assert_eq!(
        backoff_delay(0, Some(Duration::from_secs(7)), unit),
        Duration::from_secs(7)
    );
    assert_eq!(
        backoff_delay(3, Some(Duration::from_secs(1)), unit),
        Duration::from_secs(1)
    );
}

#[test]
fn backoff_doubles_per_attempt_without_advice() {
    let unit = Duration::from_secs(1);
    assert_eq!(backoff_delay(0, None, unit), Duration::from_secs(1));
    assert_eq!(backoff_delay(1, None, unit), Duration::from_secs(2));
    assert_eq!(backoff_delay(2, None, unit), Duration::from_secs(4));
    assert_eq!(backoff_delay(3, None, unit), Duration::from_secs(8));
}

#[test]
fn candidate_text_is_trimmed() {
    let parsed: GenerateResponse = serde_json::from_value(json!({
        "candidates": [
            { "content": { "parts": [ { "text": "  بو بر دڭمه\n" } ] } }
        ]
    }))
    .expect("valid response shape");

    assert_eq!(
        extract_candidate_text(&parsed).as_deref(),
        Some("بو بر دڭمه")
    );
}

#[test]
fn blank_or_missing_candidate_text_is_none() {
    let blank: GenerateResponse = serde_json::from_value(json!({
        "candidates": [ { "content": { "parts": [ { "text": "   " } ] } } ]
    }))
    .expect("valid response shape");
    assert_eq!(extract_candidate_text(&blank), None);

    let blocked: GenerateResponse = serde_json::from_value(json!({
        "candidates": [ { "finishReason": "SAFETY" } ]
    }))
    .expect("valid response shape");
    assert_eq!(extract_candidate_text(&blocked), None);

    let empty: GenerateResponse =
        serde_json::from_value(json!({ "candidates": [] })).expect("valid response shape");
    assert_eq!(extract_candidate_text(&empty), None);
}

#[tokio::test]
async fn first_attempt_success_returns_the_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-pro:generateContent"))
        .and(query_param("key", "test-key"))
        .respond_with(text_response("عثمانلي"))
        .expect(1)
        .mount(&server)
        .await;

    let answer = test_client(&server)
        .generate("convert this")
        .await
        .expect("generation succeeds");
    assert_eq!(answer, "عثمانلي");
}

#[tokio::test]
async fn rate_limit_retries_then_succeeds() {
    let server = MockServer::start().await;
    // 429 with an advised wait, then 429 without one, then success.
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(text_response("answer"))
        .expect(1)
        .mount(&server)
        .await;

    let started = Instant::now();
    let answer = test_client(&server)
        .generate("convert this")
        .await
        .expect("third attempt succeeds");

    assert_eq!(answer, "answer");
    // Second wait is computed, not advised: 2^1 backoff units.
    assert!(started.elapsed() >= Duration::from_millis(20));
}

#[tokio::test]
async fn exhausted_rate_limits_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let result = test_client(&server).generate("convert this").await;
    assert_eq!(result, Err(GenerationError::Exhausted { attempts: 3 }));
}

#[tokio::test]
async fn a_smaller_budget_exhausts_sooner() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .expect(2)
        .mount(&server)
        .await;

    let result = test_client(&server)
        .with_max_attempts(2)
        .generate("convert this")
        .await;
    assert_eq!(result, Err(GenerationError::Exhausted { attempts: 2 }));
}

#[tokio::test]
async fn server_errors_share_the_retry_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(text_response("recovered"))
        .expect(1)
        .mount(&server)
        .await;

    let answer = test_client(&server)
        .generate("convert this")
        .await
        .expect("retry after 500 succeeds");
    assert_eq!(answer, "recovered");
}

#[tokio::test]
async fn malformed_bodies_are_retried_as_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(text_response("recovered"))
        .expect(1)
        .mount(&server)
        .await;

    let answer = test_client(&server)
        .generate("convert this")
        .await
        .expect("retry after malformed body succeeds");
    assert_eq!(answer, "recovered");
}

#[tokio::test]
async fn empty_candidates_escalate_once_then_surface_unreadable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .expect(2)
        .mount(&server)
        .await;

    let result = test_client(&server).generate("convert this").await;
    assert_eq!(result, Err(GenerationError::Unreadable));
}

#[tokio::test]
async fn escalation_doubles_the_token_ceiling() {
    let server = MockServer::start().await;
    // Default ceiling comes back empty; the doubled ceiling succeeds.
    Mock::given(method("POST"))
        .and(body_string_contains("2048"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [ { "finishReason": "MAX_TOKENS" } ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("4096"))
        .respond_with(text_response("full answer"))
        .expect(1)
        .mount(&server)
        .await;

    let answer = test_client(&server)
        .generate("convert this")
        .await
        .expect("escalated attempt succeeds");
    assert_eq!(answer, "full answer");
}

#[tokio::test]
async fn content_blocks_are_not_retried_through_the_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [ { "finishReason": "SAFETY" } ]
        })))
        .expect(2)
        .mount(&server)
        .await;

    // Only the single escalation attempt is allowed on top of the first
    // call, even though the retry budget would allow a third.
    let result = test_client(&server).generate("convert this").await;
    assert_eq!(result, Err(GenerationError::Unreadable));
}
