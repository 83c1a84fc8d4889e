//! Upload indicator: sends `sendChatAction` while a request is being worked on.
//!
//! Telegram chat actions expire after ~5 seconds, so the action is refreshed
//! every 4s until the handle is stopped.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::ChatAction;

const REFRESH_INTERVAL: Duration = Duration::from_secs(4);

/// Handle to a background upload-indicator task.
///
/// Call `stop()` once the result is ready to abort the loop.
pub struct UploadActionHandle(tokio::task::JoinHandle<()>);

impl UploadActionHandle {
    /// Spawn the indicator loop for `chat_id`.
    ///
    /// Sends `ChatAction::UploadVoice` immediately, then every 4 seconds.
    /// Send failures are ignored; the indicator is cosmetic.
    pub fn start(bot: Bot, chat_id: ChatId) -> Self {
        let handle = tokio::spawn(async move {
            loop {
                let _ = bot.send_chat_action(chat_id, ChatAction::UploadVoice).await;
                tokio::time::sleep(REFRESH_INTERVAL).await;
            }
        });
        UploadActionHandle(handle)
    }

    /// Abort the indicator loop.
    ///
    /// Dropping the handle has the same effect, so a worker that dies
    /// early cannot leak the loop.
    pub fn stop(self) {}
}

impl Drop for UploadActionHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}
