
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input};
use std::path::PathBuf;

use super::settings::api_key_from_env;
use super::{API_KEY_ENV_VAR, Config, ConfigError, GeminiConfig, get_config_dir};

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("Ottoman Scribe Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Gemini Configuration").bold().yellow());
    eprintln!("Configure the remote generation and embedding models.");
    eprintln!();

    configure_gemini(&mut config.gemini)?;
    configure_corpus(&mut config)?;

    eprintln!();
    if api_key_from_env().is_some() {
        eprintln!("{}", style("✓ API key found in the environment").green());
    } else {
        eprintln!(
            "{}",
            style(format!("⚠ Warning: {API_KEY_ENV_VAR} is not set")).yellow()
        );
        eprintln!("You can continue, but set it before chatting.");
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

#[inline]
pub fn show_config() -> Result<()> {
    let config_dir = get_config_dir()?;
    let config = Config::load(&config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Gemini Settings:").bold().yellow());
    eprintln!("  Base URL: {}", style(&config.gemini.base_url).cyan());
    eprintln!(
        "  Generation model: {}",
        style(&config.gemini.generation_model).cyan()
    );
    eprintln!(
        "  Embedding model: {}",
        style(&config.gemini.embedding_model).cyan()
    );
    eprintln!("  Batch size: {}", style(config.gemini.batch_size).cyan());
    eprintln!(
        "  Output token ceiling: {}",
        style(config.gemini.max_output_tokens).cyan()
    );
    eprintln!(
        "  Retry budget: {}",
        style(config.gemini.max_attempts).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Corpus Settings:").bold().yellow());
    match &config.corpus_path {
        Some(path) => eprintln!("  Corpus file: {}", style(path.display()).cyan()),
        None => eprintln!("  Corpus file: {}", style("not configured").yellow()),
    }
    eprintln!(
        "  Segment size: {} chars, overlap {}",
        style(config.chunking.target_size).cyan(),
        style(config.chunking.overlap).cyan()
    );

    eprintln!();
    eprintln!(
        "  API key ({}): {}",
        API_KEY_ENV_VAR,
        if api_key_from_env().is_some() {
            style("set").green()
        } else {
            style("missing").red()
        }
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );
    eprintln!(
        "Embedding cache: {}",
        style(config.cache_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    let config_dir = get_config_dir()?;
    Config::load(&config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: config_dir,
                ..Config::default()
            })
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_gemini(gemini: &mut GeminiConfig) -> Result<()> {
    let generation_model: String = Input::new()
        .with_prompt("Generation model")
        .default(gemini.generation_model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(gemini.embedding_model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let batch_size: usize = Input::new()
        .with_prompt("Embedding batch size")
        .default(gemini.batch_size)
        .validate_with(|input: &usize| -> Result<(), ConfigError> {
            let temp_config = GeminiConfig {
                batch_size: *input,
                ..GeminiConfig::default()
            };
            temp_config.validate()?;
            Ok(())
        })
        .interact_text()?;

    gemini.generation_model = generation_model;
    gemini.embedding_model = embedding_model;
    gemini.batch_size = batch_size;

    Ok(())
}

fn configure_corpus(config: &mut Config) -> Result<()> {
    let current = config
        .corpus_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    let path: String = Input::new()
        .with_prompt("Corpus file path (blank to skip)")
        .default(current)
        .allow_empty(true)
        .interact_text()?;

    let trimmed = path.trim();
    config.corpus_path = if trimmed.is_empty() {
        None
    } else {
        Some(PathBuf::from(trimmed))
    };

    Ok(())
}
