use super::*;
use tempfile::TempDir;

#[test]
fn load_existing_config_falls_back_to_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = load_existing_config(temp_dir.path()).expect("config loaded successfully");

    assert_eq!(config.base_dir, temp_dir.path());
    assert!(!config.inference.embedding_model.is_empty());
    assert!(config.retrieval.top_k > 0);
}

#[test]
fn load_existing_config_reads_saved_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut saved = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    saved.retrieval.top_k = 7;
    saved.answer.style = AnswerStyle::Bulleted;
    saved.save().expect("should save config");

    let config = load_existing_config(temp_dir.path()).expect("config loaded successfully");

    assert_eq!(config.retrieval.top_k, 7);
    assert_eq!(config.answer.style, AnswerStyle::Bulleted);
}

#[test]
fn invalid_config_file_is_reported_not_replaced() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join(crate::config::settings::CONFIG_FILENAME);
    std::fs::write(&path, "[retrieval]\ntop_k = \"three\"\n").expect("should write config");

    let result = load_existing_config(temp_dir.path());

    assert!(result.is_err());
    assert_eq!(
        std::fs::read_to_string(&path).expect("should read config"),
        "[retrieval]\ntop_k = \"three\"\n"
    );
}

#[test]
fn config_that_fails_validation_is_an_error() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join(crate::config::settings::CONFIG_FILENAME);
    std::fs::write(&path, "[retrieval]\ntop_k = 0\n").expect("should write config");

    assert!(load_existing_config(temp_dir.path()).is_err());
}

#[test]
fn existing_config_is_loaded_without_token() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut saved = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    saved.inference.base_url = "http://file.example".to_string();
    saved.save().expect("should save config");

    let config = load_existing_config(temp_dir.path()).expect("config loaded successfully");

    assert_eq!(config.inference.base_url, "http://file.example");
    assert_eq!(config.inference.api_token, None);
}

#[test]
fn write_default_config_creates_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = write_default_config(temp_dir.path()).expect("should write defaults");

    assert!(config.config_file_path().exists());
    let reloaded = Config::load(temp_dir.path()).expect("should reload");
    assert_eq!(reloaded.retrieval.top_k, config.retrieval.top_k);
    assert_eq!(reloaded.answer.style, config.answer.style);
}

#[test]
fn describe_hides_the_token() {
    let mut config = Config::default();
    config.inference.api_token = Some("hf_secret_value".to_string());

    let sections = describe(&config);
    let values: Vec<&str> = sections
        .iter()
        .flat_map(|(_, entries)| entries.iter().map(|(_, value)| value.as_str()))
        .collect();

    assert!(values.iter().all(|value| !value.contains("hf_secret_value")));
    assert!(values.contains(&"set"));
    assert!(values.contains(&"prose"));
}

#[test]
fn describe_reports_missing_token() {
    let config = Config::default();

    let token = describe(&config)
        .into_iter()
        .flat_map(|(_, entries)| entries)
        .find(|(label, _)| *label == "API token")
        .map(|(_, value)| value);

    assert_eq!(token.as_deref(), Some("missing"));
}
