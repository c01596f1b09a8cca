//! Provider HTTP contracts against mock servers.

use airtag_assistant::chat::{ChatMessage, ChatProvider, GenerateRequest, OpenAiChat, WorkersAiChat};
use airtag_assistant::config::{ChatConfig, EmbeddingConfig};
use airtag_assistant::embedding::{EmbeddingsProvider, OpenAiEmbeddings, WorkersAiEmbeddings};
use airtag_assistant::workers_ai::WorkersAiClient;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn embedding_config(base_url: &str, dims: usize) -> EmbeddingConfig {
    EmbeddingConfig {
        provider: "openai".to_string(),
        model: Some("text-embedding-3-small".to_string()),
        dims,
        base_url: Some(base_url.to_string()),
        max_retries: 0,
        timeout_secs: 5,
    }
}

fn chat_config(base_url: &str) -> ChatConfig {
    ChatConfig {
        provider: "openai".to_string(),
        model: Some("gpt-4o-mini".to_string()),
        base_url: Some(base_url.to_string()),
        max_retries: 0,
        timeout_secs: 5,
    }
}

fn request() -> GenerateRequest {
    GenerateRequest {
        messages: vec![ChatMessage::system("rules"), ChatMessage::user("question")],
        temperature: Some(0.2),
        max_tokens: Some(700),
    }
}

#[tokio::test]
async fn openai_embeddings_request_and_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "text-embedding-3-small",
            "input": ["how does precision finding work"],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "embedding": [0.1, 0.2, 0.3] }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiEmbeddings::with_api_key(&embedding_config(&server.uri(), 3), "sk-test").unwrap();
    let v = provider.embed("how does precision finding work").await.unwrap();
    assert_eq!(v, vec![0.1, 0.2, 0.3]);
}

#[tokio::test]
async fn openai_embeddings_dim_mismatch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "embedding": [0.1, 0.2] }]
        })))
        .mount(&server)
        .await;

    let provider = OpenAiEmbeddings::with_api_key(&embedding_config(&server.uri(), 384), "k").unwrap();
    let err = provider.embed("x").await.unwrap_err();
    assert!(err.to_string().contains("dim mismatch"));
}

#[tokio::test]
async fn openai_embeddings_client_error_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = embedding_config(&server.uri(), 3);
    config.max_retries = 3;
    let provider = OpenAiEmbeddings::with_api_key(&config, "k").unwrap();
    let err = provider.embed("x").await.unwrap_err();
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn openai_embeddings_retries_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": [{ "embedding": [1.0] }] })),
        )
        .mount(&server)
        .await;

    let mut config = embedding_config(&server.uri(), 1);
    config.max_retries = 1;
    let provider = OpenAiEmbeddings::with_api_key(&config, "k").unwrap();
    assert_eq!(provider.embed("x").await.unwrap(), vec![1.0]);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn openai_embeddings_rate_limit_exhausts_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .expect(2)
        .mount(&server)
        .await;

    let mut config = embedding_config(&server.uri(), 1);
    config.max_retries = 1;
    let provider = OpenAiEmbeddings::with_api_key(&config, "k").unwrap();
    let err = format!("{:#}", provider.embed("x").await.unwrap_err());
    assert!(err.contains("429"), "{}", err);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn openai_embeddings_missing_vector_previews_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "object": "list" })))
        .mount(&server)
        .await;

    let provider = OpenAiEmbeddings::with_api_key(&embedding_config(&server.uri(), 3), "k").unwrap();
    let err = provider.embed("x").await.unwrap_err().to_string();
    assert!(err.contains("missing embedding vector"));
    assert!(err.contains("\"object\":\"list\""));
}

#[tokio::test]
async fn openai_chat_reads_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "max_tokens": 700,
            "messages": [
                { "role": "system", "content": "rules" },
                { "role": "user", "content": "question" }
            ],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "  An answer.\n" } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let chat = OpenAiChat::with_api_key(&chat_config(&server.uri()), "sk-test").unwrap();
    assert_eq!(chat.generate(&request()).await.unwrap(), "An answer.");
}

#[tokio::test]
async fn openai_chat_empty_content_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "   " } }]
        })))
        .mount(&server)
        .await;

    let chat = OpenAiChat::with_api_key(&chat_config(&server.uri()), "k").unwrap();
    let err = chat.generate(&request()).await.unwrap_err();
    assert_eq!(err.to_string(), "Chat response missing text");
}

#[tokio::test]
async fn workers_ai_embeddings_contract() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/accounts/acct-1/ai/run/@cf/baai/bge-small-en-v1\.5$"))
        .and(header("authorization", "Bearer cf-token"))
        .and(body_partial_json(json!({ "text": ["lost mode"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "errors": [],
            "result": { "shape": [1, 3], "data": [[0.5, 0.25, 0.125]] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = WorkersAiClient::new(Some(&server.uri()), "acct-1", "cf-token", 5).unwrap();
    let provider = WorkersAiEmbeddings::new(client, "@cf/baai/bge-small-en-v1.5", 3);
    assert_eq!(provider.embed("lost mode").await.unwrap(), vec![0.5, 0.25, 0.125]);
}

#[tokio::test]
async fn workers_ai_failure_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "errors": [{ "code": 5007, "message": "No such model" }],
            "result": null
        })))
        .mount(&server)
        .await;

    let client = WorkersAiClient::new(Some(&server.uri()), "acct", "tok", 5).unwrap();
    let provider = WorkersAiEmbeddings::new(client, "@cf/none/missing", 3);
    let err = provider.embed("x").await.unwrap_err().to_string();
    assert!(err.contains("No such model"));
}

#[tokio::test]
async fn workers_ai_chat_reads_response_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"/ai/run/@cf/meta/llama-3\.1-8b-instruct$"))
        .and(body_partial_json(json!({ "max_tokens": 700 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": { "response": "Replace the CR2032 battery." }
        })))
        .mount(&server)
        .await;

    let client = WorkersAiClient::new(Some(&server.uri()), "acct", "tok", 5).unwrap();
    let chat = WorkersAiChat::new(client, "@cf/meta/llama-3.1-8b-instruct");
    assert_eq!(chat.generate(&request()).await.unwrap(), "Replace the CR2032 battery.");
}
