use std::path::PathBuf;
use tempfile::TempDir;

use crate::config::AppConfig;
use crate::tools::{MediaTools, ToolError};
use crate::utils::sanitize_file_name;

/// Errors from one pipeline run, tagged with the failing stage
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("Failed to create working directory: {0}")]
    Workspace(#[from] std::io::Error),

    #[error("Title lookup failed: {0}")]
    TitleFetch(#[source] ToolError),

    #[error("Audio download failed: {0}")]
    Download(#[source] ToolError),

    #[error("Transcoding failed: {0}")]
    Transcode(#[source] ToolError),
}

/// Product of a successful pipeline run
///
/// Owns the working directory; `discard` removes everything once the
/// audio has been delivered (or delivery has been given up on).
#[derive(Debug)]
pub struct PipelineOutput {
    /// Sanitized media title
    pub title: String,

    /// The produced MP3 file, inside the working directory
    pub audio_path: PathBuf,

    workdir: TempDir,
}

impl PipelineOutput {
    /// Delete the audio file and the working directory
    pub fn discard(self) {
        if let Err(e) = fs_err::remove_file(&self.audio_path) {
            tracing::warn!(
                "Failed to remove audio file {}: {}",
                self.audio_path.display(),
                e
            );
        }
        if let Err(e) = self.workdir.close() {
            tracing::warn!("Failed to remove working directory: {}", e);
        }
    }
}

/// Download-and-transcode pipeline turning a video URL into an MP3
pub struct AudioPipeline {
    tools: Box<dyn MediaTools>,
    work_dir: Option<PathBuf>,
}

impl AudioPipeline {
    /// Create a new pipeline using the given tooling
    pub fn new(tools: Box<dyn MediaTools>, app: &AppConfig) -> Self {
        Self {
            tools,
            work_dir: app.work_dir.clone(),
        }
    }

    /// Run the full pipeline for one URL
    ///
    /// Every invocation gets its own working directory, so concurrent
    /// requests for identically-titled media cannot collide.
    pub async fn run(&self, url: &str) -> Result<PipelineOutput, PipelineError> {
        let workdir = self.create_workdir()?;

        tracing::info!("Resolving title for {}", url);
        let raw_title = self.tools.fetch_title(url).await.map_err(|e| {
            tracing::error!("Title lookup failed for {}: {}", url, e);
            PipelineError::TitleFetch(e)
        })?;
        let title = sanitize_file_name(&raw_title);

        let media_path = workdir.path().join(format!("{}.webm", title));
        tracing::info!("Downloading audio for \"{}\"", title);
        self.tools
            .download_audio(url, &media_path)
            .await
            .map_err(|e| {
                tracing::error!("Audio download failed for {}: {}", url, e);
                PipelineError::Download(e)
            })?;

        let audio_path = workdir.path().join(format!("{}.mp3", title));
        tracing::info!("Transcoding \"{}\" to MP3", title);
        self.tools
            .transcode_to_mp3(&media_path, &audio_path)
            .await
            .map_err(|e| {
                tracing::error!("Transcoding failed for {}: {}", url, e);
                PipelineError::Transcode(e)
            })?;

        // The intermediate download is no longer needed
        if let Err(e) = fs_err::remove_file(&media_path) {
            tracing::warn!(
                "Failed to remove intermediate file {}: {}",
                media_path.display(),
                e
            );
        }

        Ok(PipelineOutput {
            title,
            audio_path,
            workdir,
        })
    }

    fn create_workdir(&self) -> Result<TempDir, PipelineError> {
        let workdir = match &self.work_dir {
            Some(parent) => {
                fs_err::create_dir_all(parent)?;
                TempDir::new_in(parent)?
            }
            None => TempDir::new()?,
        };
        Ok(workdir)
    }
}
