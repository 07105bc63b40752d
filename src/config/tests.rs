use super::*;
use std::fs;
use tempfile::TempDir;

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::assistant::formatter::AnswerStyle;
    use crate::config::settings::CONFIG_FILENAME;

    #[test]
    fn config_file_persistence() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let config_path = temp_dir.path().join(CONFIG_FILENAME);

        let mut original_config = Config::default();
        original_config.inference.base_url = "http://localhost:8080".to_string();
        original_config.inference.chat_model = "test-chat".to_string();
        original_config.answer.style = AnswerStyle::Bulleted;
        original_config.paths.documents_dir = "policies".into();

        let toml_content = toml::to_string_pretty(&original_config)
            .expect("config should convert to toml string successfully");
        fs::write(&config_path, toml_content).expect("should write to config_path successfully");

        let content =
            fs::read_to_string(&config_path).expect("should read from config_path successfully");
        let loaded_config: Config = toml::from_str(&content).expect("should parse toml correctly");

        assert_eq!(original_config.inference, loaded_config.inference);
        assert_eq!(original_config.answer, loaded_config.answer);
        assert_eq!(original_config.paths, loaded_config.paths);
    }

    #[test]
    fn invalid_toml_handling() {
        let invalid_toml = r#"
            [inference
            base_url = "http://localhost"
            batch_size = "many"
        "#;

        let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_style_is_rejected() {
        let toml_str = r#"
            [answer]
            style = "haiku"
        "#;

        let result: Result<Config, toml::de::Error> = toml::from_str(toml_str);
        assert!(result.is_err());
    }

    #[test]
    fn complete_valid_config() {
        let valid_toml = r#"
            [inference]
            base_url = "https://router.huggingface.co"
            embedding_model = "sentence-transformers/all-MiniLM-L6-v2"
            chat_model = "HuggingFaceH4/zephyr-7b-beta"
            embedding_dimension = 384
            batch_size = 16
            timeout_seconds = 10
            retry_attempts = 2

            [chunking]
            chunk_size = 400
            chunk_overlap = 40

            [retrieval]
            top_k = 4

            [history]
            max_turns = 3

            [answer]
            max_tokens = 256
            temperature = 0.2
            style = "prose"

            [ingestion]
            on_error = "abort"

            [paths]
            documents_dir = "docs"
            index_dir = "index"
            history_file = "history.json"
        "#;

        let config: Config = toml::from_str(valid_toml).expect("should parse toml successfully");
        assert_eq!(config.inference.batch_size, 16);
        assert_eq!(config.inference.retry_attempts, 2);
        assert_eq!(config.chunking.chunk_size, 400);
        assert_eq!(config.chunking.chunk_overlap, 40);
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.history.max_turns, 3);
        assert_eq!(config.answer.max_tokens, 256);
        assert_eq!(config.ingestion.on_error, OnError::Abort);
        assert_eq!(config.paths.index_dir, std::path::PathBuf::from("index"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn error_display_messages() {
        let errors = vec![
            ConfigError::InvalidProtocol("ftp".to_string()),
            ConfigError::InvalidBatchSize(0),
            ConfigError::InvalidModel(String::new()),
            ConfigError::InvalidUrl("invalid-url".to_string()),
            ConfigError::OverlapTooLarge(60, 50),
            ConfigError::InvalidTopK(0),
        ];

        for error in errors {
            let message = format!("{error}");
            assert!(message.len() > 10);
        }
    }
}
