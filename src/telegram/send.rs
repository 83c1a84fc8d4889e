//! Delivery helpers for pipeline results.

use std::path::Path;

use teloxide::prelude::*;
use teloxide::types::InputFile;
use teloxide::RequestError;

/// Fixed reply for any failed request
pub const FAILURE_TEXT: &str = "Sorry, I couldn't download the video.";

/// Send the produced MP3 to `chat_id`.
///
/// The file name shown in the chat comes from the path, so the caller
/// should hand over the sanitized-title path produced by the pipeline.
pub async fn send_audio_file(
    bot: &Bot,
    chat_id: ChatId,
    audio_path: &Path,
) -> Result<(), RequestError> {
    bot.send_audio(chat_id, InputFile::file(audio_path)).await?;
    Ok(())
}

/// Tell `chat_id` that its request failed.
pub async fn send_failure_notice(bot: &Bot, chat_id: ChatId) -> Result<(), RequestError> {
    bot.send_message(chat_id, FAILURE_TEXT).await?;
    Ok(())
}
