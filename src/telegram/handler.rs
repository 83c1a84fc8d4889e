//! Per-message worker: one pipeline run plus result delivery.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::RequestError;
use tracing::{error, info};

use super::action::UploadActionHandle;
use super::send;
use crate::pipeline::{AudioPipeline, PipelineError, PipelineOutput};

/// Where replies for one chat go.
///
/// Seam between the delivery rules and the Telegram API, so the rules
/// are testable without a live bot.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
trait ReplyTarget: Send + Sync {
    async fn send_audio(&self, audio_path: &Path) -> Result<(), RequestError>;
    async fn send_failure(&self) -> Result<(), RequestError>;
}

struct ChatReplies {
    bot: Bot,
    chat_id: ChatId,
}

#[async_trait]
impl ReplyTarget for ChatReplies {
    async fn send_audio(&self, audio_path: &Path) -> Result<(), RequestError> {
        send::send_audio_file(&self.bot, self.chat_id, audio_path).await
    }

    async fn send_failure(&self) -> Result<(), RequestError> {
        send::send_failure_notice(&self.bot, self.chat_id).await
    }
}

/// Process one text message end to end.
///
/// Never returns an error: every failure ends in a logged message and,
/// where possible, the fixed failure notice to the chat.
pub async fn handle_message(
    bot: Bot,
    pipeline: Arc<AudioPipeline>,
    chat_id: ChatId,
    text: String,
) {
    info!("Processing request from chat {}: {}", chat_id.0, text);

    let action = UploadActionHandle::start(bot.clone(), chat_id);
    let result = pipeline.run(&text).await;
    action.stop();

    let replies = ChatReplies { bot, chat_id };
    deliver(&replies, chat_id, result).await;
}

/// Turn a pipeline outcome into replies: the audio file on success, the
/// fixed failure notice on any error.
async fn deliver(
    replies: &dyn ReplyTarget,
    chat_id: ChatId,
    result: Result<PipelineOutput, PipelineError>,
) {
    match result {
        Ok(output) => {
            info!("Sending \"{}\" to chat {}", output.title, chat_id.0);
            if let Err(e) = replies.send_audio(&output.audio_path).await {
                error!("Failed to send audio to chat {}: {}", chat_id.0, e);
            }
            // Artifacts are removed regardless of how the send went
            output.discard();
        }
        Err(e) => {
            error!("Pipeline failed for chat {}: {}", chat_id.0, e);
            if let Err(e) = replies.send_failure().await {
                error!("Failed to send failure notice to chat {}: {}", chat_id.0, e);
            }
        }
    }
}
