// Configuration management module
// TOML settings under the platform config directory, API key from the
// environment

pub mod interactive;
pub mod settings;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{API_KEY_ENV_VAR, Config, ConfigError, GeminiConfig, api_key_from_env};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_config_dir()
}
