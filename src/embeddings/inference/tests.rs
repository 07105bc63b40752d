use super::*;
use serde_json::json;
use std::time::Duration;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path},
};

const EMBED_PATH: &str =
    "/hf-inference/models/sentence-transformers/all-MiniLM-L6-v2/pipeline/feature-extraction";

fn parse(body: &str) -> FeatureExtractionResponse {
    serde_json::from_str(body).expect("response should parse")
}

fn test_config(base_url: &str, token: Option<&str>) -> Config {
    let mut config = Config::default();
    config.inference.base_url = base_url.to_string();
    config.inference.api_token = token.map(str::to_string);
    config.inference.embedding_dimension = 3;
    config.inference.batch_size = 2;
    config
}

fn test_client(config: &Config) -> EmbeddingClient {
    let http = HttpClient::new("hf_test", &config.inference)
        .with_timeout(Duration::from_secs(5))
        .with_retry_attempts(1)
        .with_backoff(Duration::from_millis(1));
    EmbeddingClient::new(config).with_http_client(http)
}

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

#[test]
fn response_shapes_deserialize() {
    assert!(matches!(
        parse("[0.1, 0.2]"),
        FeatureExtractionResponse::Vector(_)
    ));
    assert!(matches!(
        parse("[[0.1, 0.2], [0.3, 0.4]]"),
        FeatureExtractionResponse::Matrix(_)
    ));
    assert!(matches!(
        parse("[[[0.1, 0.2]], [[0.3, 0.4]]]"),
        FeatureExtractionResponse::Tokens(_)
    ));
    assert!(serde_json::from_str::<FeatureExtractionResponse>(r#"{"error": "loading"}"#).is_err());
}

#[test]
fn flat_vector_is_one_embedding() {
    let vectors = normalize_feature_extraction(parse("[1.0, 2.0, 3.0]"), 1)
        .expect("should normalize");
    assert_eq!(vectors, vec![vec![1.0, 2.0, 3.0]]);

    assert_eq!(
        normalize_feature_extraction(parse("[1.0, 2.0]"), 2),
        Err(EmbeddingError::CountMismatch {
            expected: 2,
            actual: 1
        })
    );
}

#[test]
fn matrix_is_one_row_per_input() {
    let vectors = normalize_feature_extraction(parse("[[1.0, 2.0], [3.0, 4.0]]"), 2)
        .expect("should normalize");
    assert_eq!(vectors, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
}

#[test]
fn matrix_for_single_input_is_mean_pooled() {
    let vectors = normalize_feature_extraction(parse("[[1.0, 2.0], [3.0, 6.0]]"), 1)
        .expect("should normalize");
    assert_eq!(vectors, vec![vec![2.0, 4.0]]);
}

#[test]
fn token_arrays_are_pooled_per_input() {
    let vectors = normalize_feature_extraction(
        parse("[[[1.0, 1.0], [3.0, 3.0]], [[5.0, 0.0]]]"),
        2,
    )
    .expect("should normalize");
    assert_eq!(vectors, vec![vec![2.0, 2.0], vec![5.0, 0.0]]);
}

#[test]
fn malformed_shapes_are_rejected() {
    assert_eq!(
        normalize_feature_extraction(parse("[[[1.0, 2.0], [3.0]]]"), 1),
        Err(EmbeddingError::Ragged)
    );
    assert_eq!(
        normalize_feature_extraction(parse("[]"), 1),
        Err(EmbeddingError::Empty)
    );
    assert_eq!(
        normalize_feature_extraction(parse("[[1.0], [2.0], [3.0]]"), 2),
        Err(EmbeddingError::CountMismatch {
            expected: 2,
            actual: 3
        })
    );
}

#[test]
fn missing_token_yields_placeholders() {
    let config = test_config("https://router.huggingface.co", None);
    let client = EmbeddingClient::new(&config);

    assert!(!client.is_available());
    let embeddings = client.embed(&texts(&["a", "b", "c"]));

    assert_eq!(embeddings.len(), 3);
    assert!(embeddings.iter().all(Embedding::is_placeholder));
    assert!(embeddings.iter().all(|e| e.values() == [0.0, 0.0, 0.0]));
}

#[test]
fn empty_input_makes_no_request() {
    let config = test_config("http://127.0.0.1:9", Some("hf_test"));
    assert!(test_client(&config).embed(&[]).is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn single_text_is_sent_as_string() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .and(header("Authorization", "Bearer hf_test"))
        .and(body_json(json!({"inputs": "What is the leave policy?"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([0.1, 0.2, 0.3])))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri(), Some("hf_test"));
    let embedding = test_client(&config).embed_one("What is the leave policy?");

    assert_eq!(embedding, Embedding::Computed(vec![0.1, 0.2, 0.3]));
}

#[tokio::test(flavor = "multi_thread")]
async fn texts_are_sent_in_batches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .and(body_json(json!({"inputs": ["one", "two"]})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .and(body_json(json!({"inputs": "three"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([0.0, 0.0, 1.0])))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri(), Some("hf_test"));
    let embeddings = test_client(&config).embed(&texts(&["one", "two", "three"]));

    assert_eq!(
        embeddings,
        vec![
            Embedding::Computed(vec![1.0, 0.0, 0.0]),
            Embedding::Computed(vec![0.0, 1.0, 0.0]),
            Embedding::Computed(vec![0.0, 0.0, 1.0]),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_batch_degrades_only_that_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .and(body_json(json!({"inputs": ["one", "two"]})))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .and(body_json(json!({"inputs": "three"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([0.0, 0.0, 1.0])))
        .mount(&server)
        .await;

    let config = test_config(&server.uri(), Some("hf_test"));
    let embeddings = test_client(&config).embed(&texts(&["one", "two", "three"]));

    assert_eq!(embeddings.len(), 3);
    assert!(embeddings[0].is_placeholder());
    assert!(embeddings[1].is_placeholder());
    assert_eq!(embeddings[2], Embedding::Computed(vec![0.0, 0.0, 1.0]));
}

#[tokio::test(flavor = "multi_thread")]
async fn wrong_dimension_degrades_to_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([0.5, 0.5])))
        .mount(&server)
        .await;

    let config = test_config(&server.uri(), Some("hf_test"));
    let embedding = test_client(&config).embed_one("policy");

    assert_eq!(embedding, Embedding::placeholder(3));
}

#[tokio::test(flavor = "multi_thread")]
async fn unparseable_body_degrades_to_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let config = test_config(&server.uri(), Some("hf_test"));
    let embedding = test_client(&config).embed_one("policy");

    assert!(embedding.is_placeholder());
    assert_eq!(embedding.values().len(), 3);
}
