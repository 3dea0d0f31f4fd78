use clap::{Parser, Subcommand};
use ottoman_scribe::Result;
use ottoman_scribe::commands::{rebuild_index, run_ask, run_chat};
use ottoman_scribe::config::{run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "ottoman-scribe")]
#[command(about = "Convert modern Turkish into Ottoman script with retrieval-augmented context")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat,
    /// Convert a single piece of text and exit
    Ask {
        /// Modern Turkish text to convert
        text: String,
    },
    /// Rebuild the corpus embedding cache from scratch
    Index,
    /// Configure models, batch size, and the corpus file
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Chat => {
            run_chat().await?;
        }
        Commands::Ask { text } => {
            run_ask(&text).await?;
        }
        Commands::Index => {
            rebuild_index().await?;
        }
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["ottoman-scribe", "chat"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            matches!(parsed.command, Commands::Chat);
        }
    }

    #[test]
    fn ask_command_carries_the_text() {
        let cli = Cli::try_parse_from(["ottoman-scribe", "ask", "merhaba dünya"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ask { text } = parsed.command {
                assert_eq!(text, "merhaba dünya");
            }
        }
    }

    #[test]
    fn ask_requires_text() {
        let cli = Cli::try_parse_from(["ottoman-scribe", "ask"]);
        assert!(cli.is_err());
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["ottoman-scribe", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show } = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["ottoman-scribe", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["ottoman-scribe", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
