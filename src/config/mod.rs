use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable consulted for the bot token before the config file
const TOKEN_ENV_VAR: &str = "TELOXIDE_TOKEN";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Telegram connection settings
    pub telegram: TelegramConfig,

    /// External tool settings
    pub tools: ToolsConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token; TELOXIDE_TOKEN overrides this when set
    pub bot_token: Option<String>,

    /// Long-poll timeout for getUpdates, in seconds
    pub poll_timeout_secs: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// yt-dlp binary name or path
    pub yt_dlp_bin: String,

    /// ffmpeg binary name or path
    pub ffmpeg_bin: String,

    /// Deadline for a single tool invocation, in seconds
    pub timeout_secs: u64,

    /// Extra attempts after a failed or timed-out invocation
    pub retries: u32,

    /// Pause between retry attempts, in seconds
    pub retry_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Parent directory for per-request working directories
    pub work_dir: Option<PathBuf>,

    /// Maximum pipelines running at once
    pub max_concurrent_jobs: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig {
                bot_token: None,
                poll_timeout_secs: 60,
            },
            tools: ToolsConfig {
                yt_dlp_bin: "yt-dlp".to_string(),
                ffmpeg_bin: "ffmpeg".to_string(),
                timeout_secs: 600,
                retries: 0,
                retry_delay_secs: 2,
            },
            app: AppConfig {
                work_dir: None,
                max_concurrent_jobs: 3,
            },
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config: Config = serde_yaml::from_str(&content)
                .context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("ytaudio-bot").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.tools.yt_dlp_bin.is_empty() || self.tools.ffmpeg_bin.is_empty() {
            anyhow::bail!("Tool binary names must not be empty");
        }

        if self.tools.timeout_secs == 0 {
            anyhow::bail!("tools.timeout_secs must be at least 1");
        }

        if self.telegram.poll_timeout_secs == 0 {
            anyhow::bail!("telegram.poll_timeout_secs must be at least 1");
        }

        if self.app.max_concurrent_jobs == 0 {
            anyhow::bail!("app.max_concurrent_jobs must be at least 1");
        }

        Ok(())
    }

    /// Resolve the bot token, preferring the environment over the file
    pub fn bot_token(&self) -> Result<String> {
        if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
            if !token.is_empty() {
                return Ok(token);
            }
        }

        self.telegram
            .bot_token
            .clone()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No bot token configured: set {} or telegram.bot_token in the config file",
                    TOKEN_ENV_VAR
                )
            })
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        match &self.telegram.bot_token {
            Some(token) if !token.is_empty() => {
                println!("  Bot Token: {}", mask_token(token));
            }
            _ => println!("  Bot Token: not set"),
        }
        if std::env::var(TOKEN_ENV_VAR).is_ok() {
            println!("  ({} is set and takes precedence)", TOKEN_ENV_VAR);
        }
        println!("  Poll Timeout: {}s", self.telegram.poll_timeout_secs);
        println!("  yt-dlp: {}", self.tools.yt_dlp_bin);
        println!("  ffmpeg: {}", self.tools.ffmpeg_bin);
        println!("  Tool Timeout: {}s", self.tools.timeout_secs);
        println!("  Retries: {}", self.tools.retries);
        match &self.app.work_dir {
            Some(dir) => println!("  Work Dir: {}", dir.display()),
            None => println!("  Work Dir: system temp"),
        }
        println!("  Max Concurrent Jobs: {}", self.app.max_concurrent_jobs);
    }
}

/// Keep the numeric bot id, hide the secret part
fn mask_token(token: &str) -> String {
    match token.split_once(':') {
        Some((id, _)) => format!("{}:***", id),
        None => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_default_config_roundtrips_through_yaml() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.tools.yt_dlp_bin, "yt-dlp");
        assert_eq!(parsed.tools.timeout_secs, 600);
        assert_eq!(parsed.app.max_concurrent_jobs, 3);
        assert_eq!(parsed.telegram.poll_timeout_secs, 60);
    }

    #[test]
    fn test_validate_rejects_zero_jobs() {
        let mut config = Config::default();
        config.app.max_concurrent_jobs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.tools.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("12345:AAH-secret"), "12345:***");
        assert_eq!(mask_token("no-colon"), "***");
    }
}
