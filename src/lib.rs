//! ytaudio-bot - a Telegram bot that turns video links into MP3 audio
//!
//! Listens for text messages containing video URLs, downloads the audio track
//! with yt-dlp, transcodes it to MP3 with ffmpeg, and sends the file back to
//! the originating chat.

pub mod cli;
pub mod config;
pub mod pipeline;
pub mod telegram;
pub mod tools;
pub mod utils;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use pipeline::{AudioPipeline, PipelineError, PipelineOutput};
pub use tools::{CommandTools, MediaTools, ToolError};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;
