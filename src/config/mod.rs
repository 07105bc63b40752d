// Configuration management module
// TOML settings with environment overrides and validation

pub mod interactive;
pub mod settings;

#[cfg(test)]
mod tests;

pub use interactive::{run_interactive_config, show_config, write_default_config};
pub use settings::{
    AnswerConfig, Config, ConfigError, HistoryConfig, InferenceConfig, IngestionConfig, OnError,
    PathsConfig, RetrievalConfig, TOKEN_ENV_VAR,
};

/// Load the `.env` file from the working directory, if any, into the process
/// environment. Variables that are already set win.
#[inline]
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Failed to load .env file: {}", e),
    }
}
