use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing::{info, warn};

use crate::RagError;
use crate::assistant::{Answer, ChatHistory};
use crate::config::Config;
use crate::documents::Fragment;
use crate::service::{IndexEvent, RagService};

/// Characters of each source fragment shown under an answer
pub const SOURCE_PREVIEW_CHARS: usize = 150;

const EXIT_COMMAND: &str = "/exit";
const CLEAR_COMMAND: &str = "/clear";

fn load_config(config_dir: &Path) -> Result<Config> {
    Config::load(config_dir).context("Failed to load configuration")
}

/// Rebuild the vector index from the documents folder
#[inline]
pub async fn index_documents(config_dir: &Path) -> Result<()> {
    let config = load_config(config_dir)?;
    info!(
        "Indexing documents from {}",
        config.documents_dir().display()
    );
    if !config.has_api_token() {
        warn!("No API token set, fragments will be stored with placeholder embeddings");
    }

    let service = RagService::new(config).await?;

    let progress = if console::user_attended_stderr() {
        ProgressBar::new(0).with_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} fragments embedded",
            )
            .context("Invalid progress template")?
            .progress_chars("#>-"),
        )
    } else {
        ProgressBar::hidden()
    };

    let report = service
        .reindex_with_progress(|event| match event {
            IndexEvent::Chunked { fragments } => progress.set_length(fragments as u64),
            IndexEvent::Embedded(count) => progress.inc(count as u64),
        })
        .await;
    progress.finish_and_clear();
    let report = report?;

    println!(
        "{} Indexed {} fragments",
        style("✓").green(),
        report.fragments
    );
    if report.placeholders > 0 {
        println!(
            "{} {} fragments have placeholder embeddings and will not match queries well",
            style("⚠").yellow(),
            report.placeholders
        );
    }

    Ok(())
}

/// Answer one question and record it in the chat history
#[inline]
pub async fn ask_question(config_dir: &Path, question: &str) -> Result<()> {
    let config = load_config(config_dir)?;
    let mut history = ChatHistory::load(config.history_file());
    let service = RagService::new(config).await?;

    match service.ask(question, history.turns()).await {
        Ok(answer) => {
            print_answer(&answer);
            history.push_exchange(question, answer.text);
            history.save().context("Failed to save chat history")?;
        }
        Err(RagError::NotInitialized) => println!("{}", RagError::NotInitialized),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

/// Interactive question loop. An empty line or `/exit` ends it.
#[inline]
pub async fn run_chat(config_dir: &Path) -> Result<()> {
    let config = load_config(config_dir)?;
    let mut history = ChatHistory::load(config.history_file());
    let service = RagService::new(config).await?;

    if !service.is_ready().await {
        println!("{}", RagError::NotInitialized);
        return Ok(());
    }

    eprintln!(
        "{}",
        style("Ask about company policies. Type /clear to forget the conversation, /exit to quit.")
            .dim()
    );

    loop {
        let line: String = Input::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()?;
        let question = line.trim();

        match question {
            "" | EXIT_COMMAND => break,
            CLEAR_COMMAND => {
                history.clear();
                history.save().context("Failed to save chat history")?;
                eprintln!("{}", style("Conversation cleared.").dim());
            }
            _ => {
                let answer = service.ask(question, history.turns()).await?;
                print_answer(&answer);
                history.push_exchange(question, answer.text);
                history.save().context("Failed to save chat history")?;
            }
        }
    }

    Ok(())
}

#[inline]
pub fn show_history(config_dir: &Path) -> Result<()> {
    let config = load_config(config_dir)?;
    let history = ChatHistory::load(config.history_file());

    if history.is_empty() {
        println!("No conversation history.");
        return Ok(());
    }

    for turn in history.turns() {
        println!("{}: {}", style(turn.role.as_str()).bold(), turn.content);
    }

    Ok(())
}

#[inline]
pub fn clear_history(config_dir: &Path) -> Result<()> {
    let config = load_config(config_dir)?;
    let mut history = ChatHistory::load(config.history_file());
    let removed = history.len();
    history.clear();
    history.save().context("Failed to save chat history")?;

    println!("Cleared {} messages from the conversation history.", removed);
    Ok(())
}

/// Show index readiness, fragment counts and credentials state
#[inline]
pub async fn show_status(config_dir: &Path) -> Result<()> {
    let config = load_config(config_dir)?;
    let history_len = ChatHistory::load(config.history_file()).len();
    let service = RagService::new(config).await?;
    let status = service.status().await?;
    let config = service.config();

    println!("{}", style("Policy assistant status").bold().cyan());
    println!();
    println!("  Documents: {}", config.documents_dir().display());
    println!("  Index: {}", config.index_dir().display());
    if status.ready {
        println!(
            "  Status: {} ({} fragments)",
            style("ready").green(),
            status.fragments
        );
        if status.placeholders > 0 {
            println!(
                "  Placeholder embeddings: {}",
                style(status.placeholders).yellow()
            );
        }
    } else {
        println!("  Status: {}", style("not indexed").yellow());
    }
    println!(
        "  API token: {}",
        if config.has_api_token() {
            style("set").green()
        } else {
            style("missing").red()
        }
    );
    println!("  History: {} messages", history_len);

    Ok(())
}

fn print_answer(answer: &Answer) {
    println!();
    println!("{}", answer.text);
    if !answer.sources.is_empty() {
        println!();
        println!("{}", style("Sources:").bold());
        for fragment in &answer.sources {
            println!("{}", format_source(fragment));
        }
    }
    println!();
}

/// `Source: <file> (page N)` followed by an indented preview line
#[inline]
pub fn format_source(fragment: &Fragment) -> String {
    let location = match fragment.page {
        Some(page) => format!("Source: {} (page {})", fragment.source_name(), page),
        None => format!("Source: {}", fragment.source_name()),
    };
    format!("{}\n  {}", location, fragment.preview(SOURCE_PREVIEW_CHARS))
}
