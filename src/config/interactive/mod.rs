#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::path::Path;

use super::{Config, InferenceConfig, TOKEN_ENV_VAR};
use crate::assistant::formatter::AnswerStyle;

/// Prompt for the main settings and save them to `config_dir`.
#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 Policy assistant configuration").bold().cyan());
    eprintln!();

    let mut config = match load_existing_config(config_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "{} {:#}",
                style("✗ Existing configuration could not be read:").red(),
                e
            );
            if !Confirm::new()
                .with_prompt("Start from defaults and replace that file when saving?")
                .default(false)
                .interact()?
            {
                eprintln!("Configuration left unchanged.");
                return Ok(());
            }
            Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            }
        }
    };

    eprintln!("{}", style("Inference API").bold().yellow());
    eprintln!("Hosted models used for embeddings and answers.");
    eprintln!();
    configure_inference(&mut config.inference)?;

    eprintln!();
    eprintln!("{}", style("Answers").bold().yellow());
    configure_answers(&mut config)?;

    if !token_in_environment() {
        eprintln!();
        eprintln!(
            "{}",
            style(format!("⚠ {} is not set", TOKEN_ENV_VAR)).yellow()
        );
        eprintln!("Export it or add it to a .env file before indexing.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

/// Write the default configuration to `config_dir` without prompting.
#[inline]
pub fn write_default_config(config_dir: &Path) -> Result<Config> {
    let config = Config {
        base_dir: config_dir.to_path_buf(),
        ..Config::default()
    };
    config.save().context("Failed to save configuration")?;
    Ok(config)
}

#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    for (section, entries) in describe(&config) {
        eprintln!();
        eprintln!("{}", style(section).bold().yellow());
        for (label, value) in entries {
            eprintln!("  {}: {}", label, style(value).cyan());
        }
    }

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

type Section = (&'static str, Vec<(&'static str, String)>);

/// Human-readable settings grouped by section. Never includes the token.
fn describe(config: &Config) -> Vec<Section> {
    let inference = &config.inference;
    vec![
        (
            "Inference:",
            vec![
                ("Base URL", inference.base_url.clone()),
                ("Embedding model", inference.embedding_model.clone()),
                ("Chat model", inference.chat_model.clone()),
                ("Embedding dimension", inference.embedding_dimension.to_string()),
                ("Batch size", inference.batch_size.to_string()),
                ("Timeout", format!("{}s", inference.timeout_seconds)),
                ("Retry attempts", inference.retry_attempts.to_string()),
                (
                    "API token",
                    if config.has_api_token() { "set" } else { "missing" }.to_string(),
                ),
            ],
        ),
        (
            "Retrieval:",
            vec![
                ("Chunk size", config.chunking.chunk_size.to_string()),
                ("Chunk overlap", config.chunking.chunk_overlap.to_string()),
                ("Top k", config.retrieval.top_k.to_string()),
                ("History pairs", config.history.max_turns.to_string()),
            ],
        ),
        (
            "Answers:",
            vec![
                ("Style", format!("{:?}", config.answer.style).to_lowercase()),
                ("Max tokens", config.answer.max_tokens.to_string()),
                ("Temperature", config.answer.temperature.to_string()),
            ],
        ),
        (
            "Paths:",
            vec![
                ("Documents", config.documents_dir().display().to_string()),
                ("Index", config.index_dir().display().to_string()),
                ("History", config.history_file().display().to_string()),
            ],
        ),
    ]
}

/// The file as written, without environment overrides, since the result is
/// saved back. Defaults when there is no file; an error when it is invalid.
fn load_existing_config(config_dir: &Path) -> Result<Config> {
    let config = Config::load_with_env(config_dir, |_| None)?;
    if config.config_file_path().exists() {
        eprintln!("{}", style("Found existing configuration.").green());
    } else {
        eprintln!(
            "{}",
            style("No configuration file found. Using defaults.").yellow()
        );
    }
    Ok(config)
}

fn token_in_environment() -> bool {
    std::env::var(TOKEN_ENV_VAR).is_ok_and(|token| !token.trim().is_empty())
}

fn configure_inference(inference: &mut InferenceConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("Inference base URL")
        .default(inference.base_url.clone())
        .validate_with(|input: &String| -> Result<(), String> {
            let candidate = InferenceConfig {
                base_url: input.clone(),
                ..InferenceConfig::default()
            };
            candidate.base_url().map(|_| ()).map_err(|e| e.to_string())
        })
        .interact_text()?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(inference.embedding_model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let embedding_dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(inference.embedding_dimension)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (1..=8192).contains(input) {
                Ok(())
            } else {
                Err("Dimension must be between 1 and 8192")
            }
        })
        .interact_text()?;

    let chat_model: String = Input::new()
        .with_prompt("Chat model")
        .default(inference.chat_model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    inference.base_url = base_url;
    inference.embedding_model = embedding_model;
    inference.embedding_dimension = embedding_dimension;
    inference.chat_model = chat_model;

    Ok(())
}

fn configure_answers(config: &mut Config) -> Result<()> {
    let top_k: usize = Input::new()
        .with_prompt("Fragments retrieved per question")
        .default(config.retrieval.top_k)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input == 0 {
                Err("Must retrieve at least one fragment")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let max_turns: usize = Input::new()
        .with_prompt("Previous exchanges sent with each question")
        .default(config.history.max_turns)
        .interact_text()?;

    let styles = [AnswerStyle::Prose, AnswerStyle::Bulleted];
    let labels = ["prose (paragraphs)", "bulleted (lists)"];
    let default_index = styles
        .iter()
        .position(|&s| s == config.answer.style)
        .unwrap_or(0);
    let style_index = Select::new()
        .with_prompt("Answer style")
        .default(default_index)
        .items(&labels)
        .interact()?;

    config.retrieval.top_k = top_k;
    config.history.max_turns = max_turns;
    config.answer.style = styles.get(style_index).copied().unwrap_or_default();

    Ok(())
}
