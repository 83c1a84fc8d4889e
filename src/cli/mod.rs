use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ytaudio-bot",
    about = "Telegram bot that turns video links into MP3 audio via yt-dlp and ffmpeg",
    version,
    long_about = "A Telegram bot that listens for messages containing video URLs, downloads the \
audio track with yt-dlp, transcodes it to MP3 with ffmpeg, and sends the result back to the chat."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the bot and poll for messages
    Run,

    /// Manage the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// Check that yt-dlp and ffmpeg are available
    Check,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_subcommand_parses() {
        let cli = Cli::try_parse_from(["ytaudio-bot", "run"]).unwrap();
        assert!(matches!(cli.command, Commands::Run));
        assert!(!cli.verbose);
    }

    #[test]
    fn test_config_show_flag_parses() {
        let cli = Cli::try_parse_from(["ytaudio-bot", "config", "--show"]).unwrap();
        assert!(matches!(cli.command, Commands::Config { show: true }));
    }

    #[test]
    fn test_verbose_is_global() {
        let cli = Cli::try_parse_from(["ytaudio-bot", "run", "--verbose"]).unwrap();
        assert!(cli.verbose);
    }
}
