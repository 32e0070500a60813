//! HTTP client integration tests against mocked backends.
//!
//! Covers:
//! - OpenAI-compatible classification requests and reply handling
//! - Classifier fallback on HTTP errors and unusable replies
//! - Missing API key construction
//! - Remote retrieval engine success and error paths
//! - A full route through HTTP engines and an HTTP classifier

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tokio_query_router::config::{ClassifierConfig, RouterConfig, RuleConfig};
use tokio_query_router::routing::analysis::RULE_BASED_RATIONALE;
use tokio_query_router::{
    CompletionClient, HttpRetrievalEngine, IntelligentQueryRouter, OpenAiChatClient,
    QueryClassifier, RetrievalEngine, RouterError, SearchStrategy,
};

/// Serialise tests that read/write environment variables so they don't race
/// against each other within this integration test binary.
static ENV_MUTEX: Mutex<()> = Mutex::new(());

const KEY_ENV: &str = "QUERY_ROUTER_TEST_API_KEY";

// ============================================================================
// Helpers
// ============================================================================

fn make_client(base_url: &str) -> OpenAiChatClient {
    let _g = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    std::env::set_var(KEY_ENV, "test-key");
    let client = OpenAiChatClient::with_key_env("kimi-k2-0711-preview", KEY_ENV)
        .expect("must succeed with key set")
        .with_base_url(base_url)
        .with_timeout(Duration::from_secs(2));
    std::env::remove_var(KEY_ENV);
    client
}

fn chat_body(content: &str) -> serde_json::Value {
    json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    })
}

async fn mount_chat(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(template)
        .mount(server)
        .await;
}

const GRAPH_REPLY: &str = r#"{"query_complexity":0.8,"relationship_intensity":0.9,"reasoning_required":true,"entity_count":3,"recommended_strategy":"graph_rag","confidence":0.88,"reasoning":"relations between regions and spices"}"#;

// ============================================================================
// Classification client
// ============================================================================

#[tokio::test]
async fn test_chat_client_sends_model_and_bearer_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "kimi-k2-0711-preview",
            "max_tokens": 800
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("  hello  ")))
        .expect(1)
        .mount(&server)
        .await;

    let client = make_client(&server.uri());
    let reply = client.complete("prompt").await.expect("must succeed");
    assert_eq!(reply, "hello");
}

#[tokio::test]
async fn test_chat_client_http_500_is_classifier_error() {
    let server = MockServer::start().await;
    mount_chat(&server, ResponseTemplate::new(500).set_body_string("boom")).await;

    let result = make_client(&server.uri()).complete("prompt").await;
    match result {
        Err(RouterError::Classifier(msg)) => assert!(msg.contains("500")),
        other => panic!("expected Classifier error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_chat_client_empty_choices_is_error() {
    let server = MockServer::start().await;
    mount_chat(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })),
    )
    .await;

    assert!(make_client(&server.uri()).complete("prompt").await.is_err());
}

#[test]
fn test_missing_api_key_is_config_error() {
    let _g = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    std::env::remove_var(KEY_ENV);
    let config = ClassifierConfig {
        api_key_env: KEY_ENV.to_string(),
        ..ClassifierConfig::default()
    };
    let result = OpenAiChatClient::from_config(&config);
    assert!(matches!(result, Err(RouterError::ConfigError(_))));
}

#[tokio::test]
async fn test_classifier_parses_fenced_reply() {
    let server = MockServer::start().await;
    let fenced = format!("```json\n{GRAPH_REPLY}\n```");
    mount_chat(&server, ResponseTemplate::new(200).set_body_json(chat_body(&fenced))).await;

    let classifier =
        QueryClassifier::new(Arc::new(make_client(&server.uri())), RuleConfig::default());
    let analysis = classifier.analyze("为什么川菜用花椒？").await;
    assert_eq!(analysis.recommended_strategy(), SearchStrategy::GraphRag);
    assert!((analysis.confidence() - 0.88).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_classifier_falls_back_on_http_error() {
    let server = MockServer::start().await;
    mount_chat(&server, ResponseTemplate::new(503)).await;

    let classifier =
        QueryClassifier::new(Arc::new(make_client(&server.uri())), RuleConfig::default());
    let analysis = classifier.analyze("红烧肉怎么做？").await;
    assert_eq!(analysis.rationale(), RULE_BASED_RATIONALE);
    assert!((analysis.confidence() - 0.6).abs() < f64::EPSILON);
    assert_eq!(analysis.recommended_strategy(), SearchStrategy::Traditional);
}

#[tokio::test]
async fn test_classifier_falls_back_on_prose_reply() {
    let server = MockServer::start().await;
    mount_chat(
        &server,
        ResponseTemplate::new(200).set_body_json(chat_body("I would use the graph engine.")),
    )
    .await;

    let classifier =
        QueryClassifier::new(Arc::new(make_client(&server.uri())), RuleConfig::default());
    let analysis = classifier.analyze("鸡肉搭配什么蔬菜").await;
    assert_eq!(analysis.rationale(), RULE_BASED_RATIONALE);
    assert_eq!(analysis.recommended_strategy(), SearchStrategy::GraphRag);
}

// ============================================================================
// Retrieval engine client
// ============================================================================

#[tokio::test]
async fn test_http_engine_posts_query_and_parses_passages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hybrid_search"))
        .and(body_partial_json(json!({ "query": "红烧肉", "k": 2 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "passages": [
                { "content": "红烧肉做法", "metadata": { "recipe_id": "r1" } },
                { "content": "东坡肉做法" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = HttpRetrievalEngine::new("traditional", server.uri()).with_path("/hybrid_search");
    let passages = engine.search("红烧肉", 2).await.expect("must succeed");
    assert_eq!(passages.len(), 2);
    assert_eq!(passages[0].meta_str("recipe_id"), Some("r1"));
    assert!(passages[1].metadata.is_empty());
}

#[tokio::test]
async fn test_http_engine_error_status_names_engine() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graph_rag_search"))
        .respond_with(ResponseTemplate::new(502).set_body_string("neo4j down"))
        .mount(&server)
        .await;

    let engine = HttpRetrievalEngine::new("graph_rag", server.uri()).with_path("/graph_rag_search");
    match engine.search("q", 3).await {
        Err(RouterError::Engine { engine, message }) => {
            assert_eq!(engine, "graph_rag");
            assert!(message.contains("502"));
        }
        other => panic!("expected Engine error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_http_engine_timeout_is_engine_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "passages": [] }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let engine =
        HttpRetrievalEngine::new("traditional", server.uri()).with_timeout(Duration::from_millis(50));
    assert!(matches!(
        engine.search("q", 1).await,
        Err(RouterError::Engine { .. })
    ));
}

// ============================================================================
// Full route over HTTP
// ============================================================================

#[tokio::test]
async fn test_route_over_http_graph_falls_back_to_traditional() {
    let llm = MockServer::start().await;
    mount_chat(&llm, ResponseTemplate::new(200).set_body_json(chat_body(GRAPH_REPLY))).await;

    let engines = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graph_rag_search"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&engines)
        .await;
    Mock::given(method("POST"))
        .and(path("/hybrid_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "passages": [{ "content": "川菜常用花椒" }]
        })))
        .expect(1)
        .mount(&engines)
        .await;

    let traditional: Arc<dyn RetrievalEngine> = Arc::new(
        HttpRetrievalEngine::new("traditional", engines.uri()).with_path("/hybrid_search"),
    );
    let graph: Arc<dyn RetrievalEngine> = Arc::new(
        HttpRetrievalEngine::new("graph_rag", engines.uri()).with_path("/graph_rag_search"),
    );
    let classifier = QueryClassifier::new(Arc::new(make_client(&llm.uri())), RuleConfig::default());
    let router = IntelligentQueryRouter::new(traditional, graph, classifier, &RouterConfig::default());

    let (passages, analysis) = router
        .route_query("为什么川菜用花椒？", 3)
        .await
        .expect("must fall back");
    assert_eq!(analysis.recommended_strategy(), SearchStrategy::GraphRag);
    assert_eq!(passages.len(), 1);
    assert_eq!(passages[0].meta_str("route_strategy"), Some("graph_rag"));
    assert_eq!(router.statistics().graph_rag_count, 1);
}
