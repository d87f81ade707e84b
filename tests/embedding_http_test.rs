use mockito::{Matcher, Server};
use serde_json::json;
use std::time::Duration;

use fraud_ingest::embedding::{EmbeddingProvider, HttpEmbeddingProvider};
use fraud_ingest::error::{EmbeddingError, FailureClass};

fn provider(endpoint: String, dimensions: usize) -> HttpEmbeddingProvider {
    HttpEmbeddingProvider::with_circuit_breaker(
        endpoint,
        "text-embedding-3-small",
        dimensions,
        Duration::from_secs(2),
        2,
        30,
    )
    .unwrap()
}

#[tokio::test]
async fn test_embed_returns_vector_from_openai_shape() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/embeddings")
        .match_header("authorization", "Bearer test-key")
        .match_body(Matcher::PartialJson(json!({
            "input": "U1 120.5 USD M1 GROCERY",
            "model": "text-embedding-3-small",
            "dimensions": 3
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data":[{"embedding":[0.1,0.2,0.3],"index":0}]}"#)
        .create_async()
        .await;

    let provider = provider(format!("{}/v1/embeddings", server.url()), 3).with_api_key("test-key");
    let vector = provider.embed("U1 120.5 USD M1 GROCERY").await.unwrap();

    assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unprocessable_input_is_invalid_input() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/embeddings")
        .with_status(422)
        .with_body("input too long")
        .create_async()
        .await;

    let provider = provider(format!("{}/v1/embeddings", server.url()), 3);
    let err = provider.embed("U1 10 USD M1 GROCERY").await.unwrap_err();

    assert!(matches!(err, EmbeddingError::InvalidInput(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_empty_text_is_rejected_without_a_request() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/embeddings")
        .expect(0)
        .create_async()
        .await;

    let provider = provider(format!("{}/v1/embeddings", server.url()), 3);
    let err = provider.embed("   ").await.unwrap_err();

    assert_eq!(err.class(), FailureClass::InvalidInput);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_wrong_dimensions_is_invalid_response() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/embeddings")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"embedding":[0.1,0.2]}"#)
        .create_async()
        .await;

    let provider = provider(format!("{}/v1/embeddings", server.url()), 3);
    let err = provider.embed("U1 10 USD M1 GROCERY").await.unwrap_err();

    assert!(matches!(err, EmbeddingError::InvalidResponse(_)));
    assert_eq!(err.class(), FailureClass::Permanent);
}

#[tokio::test]
async fn test_repeated_outages_open_the_circuit() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/embeddings")
        .with_status(503)
        .expect(2)
        .create_async()
        .await;

    let provider = provider(format!("{}/v1/embeddings", server.url()), 3);
    for _ in 0..2 {
        let err = provider.embed("U1 10 USD M1 GROCERY").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::ProviderUnavailable(_)));
    }

    assert_eq!(provider.circuit_state(), "open");
    let err = provider.embed("U1 10 USD M1 GROCERY").await.unwrap_err();
    assert!(err.to_string().contains("circuit breaker is open"));
    assert!(err.is_retryable());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_invalid_input_does_not_trip_the_circuit() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/embeddings")
        .with_status(400)
        .create_async()
        .await;

    let provider = provider(format!("{}/v1/embeddings", server.url()), 3);
    for _ in 0..3 {
        let _ = provider.embed("U1 10 USD M1 GROCERY").await;
    }

    assert_eq!(provider.circuit_state(), "closed");
}

#[tokio::test]
async fn test_unreachable_endpoint_is_provider_unavailable() {
    let provider = provider("http://127.0.0.1:9/v1/embeddings".to_string(), 3);
    let err = provider.embed("U1 10 USD M1 GROCERY").await.unwrap_err();

    assert!(matches!(err, EmbeddingError::ProviderUnavailable(_)));
}
