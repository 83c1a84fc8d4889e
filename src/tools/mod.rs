use async_trait::async_trait;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::ToolsConfig;

/// How much combined process output to keep in error values
const OUTPUT_TAIL_CHARS: usize = 2048;

/// Errors from a single external tool invocation
#[derive(thiserror::Error, Debug)]
pub enum ToolError {
    #[error("Failed to launch {tool}: {source}")]
    Launch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed with {status}: {output}")]
    Failed {
        tool: String,
        status: std::process::ExitStatus,
        output: String,
    },

    #[error("{tool} timed out after {timeout:?}")]
    Timeout { tool: String, timeout: Duration },
}

impl ToolError {
    /// Whether a retry could plausibly change the outcome
    fn is_transient(&self) -> bool {
        matches!(self, ToolError::Failed { .. } | ToolError::Timeout { .. })
    }
}

/// Trait for the external media tooling behind the pipeline
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaTools: Send + Sync {
    /// Resolve the media title for a URL
    async fn fetch_title(&self, url: &str) -> Result<String, ToolError>;

    /// Download the best audio stream for a URL to the given path
    async fn download_audio(&self, url: &str, media_path: &Path) -> Result<(), ToolError>;

    /// Transcode a downloaded media file to MP3
    async fn transcode_to_mp3(&self, media_path: &Path, audio_path: &Path)
        -> Result<(), ToolError>;
}

/// Media tooling backed by yt-dlp and ffmpeg subprocesses
pub struct CommandTools {
    yt_dlp_bin: String,
    ffmpeg_bin: String,
    timeout: Duration,
    retries: u32,
    retry_delay: Duration,
}

impl CommandTools {
    pub fn new(tools: &ToolsConfig) -> Self {
        Self {
            yt_dlp_bin: tools.yt_dlp_bin.clone(),
            ffmpeg_bin: tools.ffmpeg_bin.clone(),
            timeout: Duration::from_secs(tools.timeout_secs),
            retries: tools.retries,
            retry_delay: Duration::from_secs(tools.retry_delay_secs),
        }
    }

    /// Run a tool to completion, retrying transient failures when configured
    async fn run_tool(&self, bin: &str, args: &[String]) -> Result<Output, ToolError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.run_once(bin, args).await {
                Ok(output) => return Ok(output),
                Err(err) if err.is_transient() && attempt <= self.retries => {
                    tracing::warn!(
                        "{} attempt {} failed, retrying in {:?}: {}",
                        bin,
                        attempt,
                        self.retry_delay,
                        err
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn run_once(&self, bin: &str, args: &[String]) -> Result<Output, ToolError> {
        tracing::debug!("Running {} {}", bin, args.join(" "));

        let mut command = Command::new(bin);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // kill_on_drop so a deadline expiry terminates the child instead
            // of leaving it running unattended
            .kill_on_drop(true);

        let output = match timeout(self.timeout, command.output()).await {
            Ok(spawned) => spawned.map_err(|source| ToolError::Launch {
                tool: bin.to_string(),
                source,
            })?,
            Err(_) => {
                return Err(ToolError::Timeout {
                    tool: bin.to_string(),
                    timeout: self.timeout,
                })
            }
        };

        if !output.status.success() {
            return Err(ToolError::Failed {
                tool: bin.to_string(),
                status: output.status,
                output: combined_output(&output),
            });
        }

        Ok(output)
    }
}

#[async_trait]
impl MediaTools for CommandTools {
    async fn fetch_title(&self, url: &str) -> Result<String, ToolError> {
        let output = self.run_tool(&self.yt_dlp_bin, &title_args(url)).await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn download_audio(&self, url: &str, media_path: &Path) -> Result<(), ToolError> {
        self.run_tool(&self.yt_dlp_bin, &download_args(url, media_path))
            .await?;
        Ok(())
    }

    async fn transcode_to_mp3(
        &self,
        media_path: &Path,
        audio_path: &Path,
    ) -> Result<(), ToolError> {
        self.run_tool(&self.ffmpeg_bin, &transcode_args(media_path, audio_path))
            .await?;
        Ok(())
    }
}

/// Arguments for resolving a media title
fn title_args(url: &str) -> Vec<String> {
    vec!["--get-title".to_string(), url.to_string()]
}

/// Arguments for downloading the best webm audio stream
fn download_args(url: &str, media_path: &Path) -> Vec<String> {
    vec![
        "-f".to_string(),
        "bestaudio[ext=webm]".to_string(),
        "-o".to_string(),
        media_path.to_string_lossy().into_owned(),
        url.to_string(),
    ]
}

/// Arguments for extracting the audio track to MP3 at the best VBR quality
fn transcode_args(media_path: &Path, audio_path: &Path) -> Vec<String> {
    vec![
        "-i".to_string(),
        media_path.to_string_lossy().into_owned(),
        "-q:a".to_string(),
        "0".to_string(),
        "-map".to_string(),
        "a".to_string(),
        audio_path.to_string_lossy().into_owned(),
    ]
}

/// Merge stdout and stderr, keeping only the tail for diagnostics
fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        if !text.trim().is_empty() {
            text.push('\n');
        }
        text.push_str(stderr.trim_end());
    }
    truncate_tail(text.trim(), OUTPUT_TAIL_CHARS)
}

/// Keep the last `max_chars` characters of a string
fn truncate_tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    text.chars().skip(count - max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn quick_tools(retries: u32) -> CommandTools {
        CommandTools {
            yt_dlp_bin: "yt-dlp".to_string(),
            ffmpeg_bin: "ffmpeg".to_string(),
            timeout: Duration::from_millis(500),
            retries,
            retry_delay: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_title_args() {
        assert_eq!(
            title_args("https://example.com/v"),
            vec!["--get-title", "https://example.com/v"]
        );
    }

    #[test]
    fn test_download_args() {
        let path = PathBuf::from("/tmp/work/Song.webm");
        assert_eq!(
            download_args("https://example.com/v", &path),
            vec![
                "-f",
                "bestaudio[ext=webm]",
                "-o",
                "/tmp/work/Song.webm",
                "https://example.com/v"
            ]
        );
    }

    #[test]
    fn test_transcode_args() {
        let input = PathBuf::from("/tmp/work/Song.webm");
        let output = PathBuf::from("/tmp/work/Song.mp3");
        assert_eq!(
            transcode_args(&input, &output),
            vec!["-i", "/tmp/work/Song.webm", "-q:a", "0", "-map", "a", "/tmp/work/Song.mp3"]
        );
    }

    #[test]
    fn test_truncate_tail_keeps_short_text() {
        assert_eq!(truncate_tail("short", 10), "short");
    }

    #[test]
    fn test_truncate_tail_keeps_the_end() {
        assert_eq!(truncate_tail("abcdefgh", 3), "fgh");
    }

    #[tokio::test]
    async fn test_run_tool_success() {
        let tools = quick_tools(0);
        let result = tools.run_tool("true", &[]).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_run_tool_nonzero_exit() {
        let tools = quick_tools(0);
        let err = tools.run_tool("false", &[]).await.unwrap_err();
        assert!(matches!(err, ToolError::Failed { .. }));
    }

    #[tokio::test]
    async fn test_run_tool_missing_binary() {
        let tools = quick_tools(0);
        let err = tools
            .run_tool("definitely-not-a-real-binary", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Launch { .. }));
    }

    #[tokio::test]
    async fn test_run_tool_deadline_expiry() {
        let tools = quick_tools(0);
        let err = tools
            .run_tool("sleep", &["5".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_launch_failure_is_not_retried() {
        // Retries only cover transient failures; a missing binary fails fast
        let tools = quick_tools(3);
        let err = tools
            .run_tool("definitely-not-a-real-binary", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Launch { .. }));
    }

    #[tokio::test]
    async fn test_retry_recovers_after_transient_failure() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("attempted");
        let script = format!(
            "if [ -f '{m}' ]; then exit 0; else touch '{m}'; exit 1; fi",
            m = marker.display()
        );

        let failing = quick_tools(0);
        // Without retries the first non-zero exit is final
        let err = failing
            .run_tool("sh", &["-c".to_string(), script.clone()])
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Failed { .. }));

        fs_err::remove_file(&marker).unwrap();
        let retrying = quick_tools(1);
        let result = retrying.run_tool("sh", &["-c".to_string(), script]).await;
        assert!(result.is_ok());
    }
}
