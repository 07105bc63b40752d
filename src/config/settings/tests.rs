use super::*;
use std::collections::HashMap;
use tempfile::TempDir;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.inference.base_url, "https://router.huggingface.co");
    assert_eq!(
        config.inference.embedding_model,
        "sentence-transformers/all-MiniLM-L6-v2"
    );
    assert_eq!(config.inference.chat_model, "HuggingFaceH4/zephyr-7b-beta");
    assert_eq!(config.inference.embedding_dimension, 384);
    assert_eq!(config.chunking.chunk_size, 500);
    assert_eq!(config.chunking.chunk_overlap, 50);
    assert_eq!(config.retrieval.top_k, 3);
    assert_eq!(config.history.max_turns, 6);
    assert_eq!(config.answer.max_tokens, 512);
    assert_eq!(config.answer.style, AnswerStyle::Prose);
    assert_eq!(config.ingestion.on_error, OnError::Skip);
    assert!(config.inference.api_token.is_none());
}

#[test]
fn config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.inference.base_url = "ftp://example.com".to_string();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidProtocol(_))
    ));

    let mut invalid_config = config.clone();
    invalid_config.inference.base_url = "not a url".to_string();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidUrl(_))
    ));

    let mut invalid_config = config.clone();
    invalid_config.inference.chat_model = "  ".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.inference.batch_size = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.chunking.chunk_overlap = 500;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::OverlapTooLarge(500, 500))
    ));

    let mut invalid_config = config.clone();
    invalid_config.retrieval.top_k = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config;
    invalid_config.answer.temperature = 3.5;
    assert!(invalid_config.validate().is_err());
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let mut parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    parsed_config.base_dir = config.base_dir.clone();
    assert_eq!(config, parsed_config);
}

#[test]
fn token_is_never_serialized() {
    let mut config = Config::default();
    config.inference.api_token = Some("hf_secret".to_string());

    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    assert!(!toml_str.contains("hf_secret"));
    assert!(!format!("{:?}", config).contains("hf_secret"));
}

#[test]
fn partial_config_uses_defaults() {
    let partial = r#"
        [retrieval]
        top_k = 5

        [answer]
        style = "bulleted"
    "#;

    let config: Config = toml::from_str(partial).expect("should parse partial toml");
    assert_eq!(config.retrieval.top_k, 5);
    assert_eq!(config.answer.style, AnswerStyle::Bulleted);
    assert_eq!(config.chunking.chunk_size, 500);
    assert_eq!(config.history.max_turns, 6);
}

#[test]
fn load_missing_file_uses_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config =
        Config::load_with_env(temp_dir.path(), env_from(&[])).expect("should load defaults");

    assert_eq!(config.base_dir, temp_dir.path());
    assert_eq!(config.documents_dir(), temp_dir.path().join("data/raw"));
    assert_eq!(config.index_dir(), temp_dir.path().join("data/vector_store"));
    assert_eq!(
        config.history_file(),
        temp_dir.path().join("data/chat_history.json")
    );
    assert!(!config.has_api_token());
}

#[test]
fn env_overrides_are_applied() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let env = env_from(&[
        (TOKEN_ENV_VAR, "hf_test"),
        (CHAT_MODEL_ENV_VAR, "mistralai/Mistral-7B-Instruct-v0.3"),
        (BASE_URL_ENV_VAR, "http://localhost:9999"),
        (EMBEDDING_MODEL_ENV_VAR, ""),
    ]);

    let config = Config::load_with_env(temp_dir.path(), env).expect("should load config");

    assert_eq!(config.inference.api_token.as_deref(), Some("hf_test"));
    assert_eq!(
        config.inference.chat_model,
        "mistralai/Mistral-7B-Instruct-v0.3"
    );
    assert_eq!(config.inference.base_url, "http://localhost:9999");
    // Empty values do not override
    assert_eq!(
        config.inference.embedding_model,
        "sentence-transformers/all-MiniLM-L6-v2"
    );
}

#[test]
fn save_and_reload() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config {
        base_dir: temp_dir.path().join("nested"),
        ..Config::default()
    };
    config.retrieval.top_k = 7;
    config.ingestion.on_error = OnError::Abort;

    config.save().expect("should save config");
    assert!(config.config_file_path().exists());

    let loaded =
        Config::load_with_env(temp_dir.path().join("nested"), env_from(&[])).expect("should load");
    assert_eq!(loaded, config);
}

#[test]
fn invalid_file_fails_to_load() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(
        temp_dir.path().join(CONFIG_FILENAME),
        "[chunking]\nchunk_size = 10\nchunk_overlap = 20\n",
    )
    .expect("should write config");

    let result = Config::load_with_env(temp_dir.path(), env_from(&[]));
    assert!(result.is_err());
}
