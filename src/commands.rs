use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use indicatif::ProgressBar;
use std::fs;
use std::time::Duration;
use tracing::info;

use crate::assembler::{ContextAssembler, MSG_MISSING_API_KEY, ensure_records};
use crate::config::{Config, api_key_from_env, get_config_dir};
use crate::embeddings::{EmbeddingClient, EmbeddingRecord};
use crate::generation::GenerationClient;

/// Interactive chat loop: read a line, answer it, repeat until an empty
/// line or "exit".
#[inline]
pub async fn run_chat() -> Result<()> {
    let Some(assembler) = prepare_assembler().await? else {
        return Ok(());
    };

    eprintln!(
        "{}",
        style("Type modern Turkish text to convert; empty line or \"exit\" to quit.").dim()
    );

    loop {
        let line: String = Input::new()
            .with_prompt("you")
            .allow_empty(true)
            .interact_text()?;

        let query = line.trim();
        if query.is_empty() || query == "exit" {
            break;
        }

        let answer = assembler.answer(query).await;
        println!("{} {}", style("scribe:").bold().green(), answer);
    }

    Ok(())
}

/// One-shot conversion of a single piece of text
#[inline]
pub async fn run_ask(text: &str) -> Result<()> {
    let Some(assembler) = prepare_assembler().await? else {
        return Ok(());
    };

    println!("{}", assembler.answer(text).await);
    Ok(())
}

/// Discard the persisted embeddings and rebuild them from the corpus
#[inline]
pub async fn rebuild_index() -> Result<()> {
    let config = load_config()?;
    let Some(api_key) = api_key_from_env() else {
        println!("{MSG_MISSING_API_KEY}");
        return Ok(());
    };

    let cache_path = config.cache_file_path();
    if cache_path.exists() {
        fs::remove_file(&cache_path)
            .with_context(|| format!("Failed to remove {}", cache_path.display()))?;
        info!("Removed stale embedding cache at {}", cache_path.display());
    }

    let embedder = EmbeddingClient::new(&config.gemini, &api_key)?;
    let records = embed_with_progress(&config, &embedder).await;

    if records.is_empty() {
        println!("No embeddings were generated; check the corpus path and logs.");
    } else {
        println!(
            "Indexed {} corpus segments into {}",
            records.len(),
            cache_path.display()
        );
    }

    Ok(())
}

fn load_config() -> Result<Config> {
    let config_dir = get_config_dir()?;
    Config::load(&config_dir).context("Failed to load configuration")
}

/// Build the assembler for a chat session, or return `None` (after telling
/// the user) when no API key is configured.
async fn prepare_assembler() -> Result<Option<ContextAssembler>> {
    let config = load_config()?;

    let Some(api_key) = api_key_from_env() else {
        println!("{MSG_MISSING_API_KEY}");
        return Ok(None);
    };

    let embedder = EmbeddingClient::new(&config.gemini, &api_key)?;
    let generator = GenerationClient::new(&config.gemini, &api_key)?;
    let records = embed_with_progress(&config, &embedder).await;

    if records.is_empty() {
        eprintln!(
            "{}",
            style("No corpus embeddings available; answers will not use retrieved context.")
                .yellow()
        );
    }

    Ok(Some(ContextAssembler::new(embedder, generator, records)))
}

async fn embed_with_progress(
    config: &Config,
    embedder: &EmbeddingClient,
) -> Vec<EmbeddingRecord> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_message("Preparing corpus embeddings...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let records = ensure_records(config, embedder).await;

    spinner.finish_and_clear();
    records
}
