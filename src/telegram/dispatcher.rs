//! Long-poll update loop feeding the per-message workers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use teloxide::prelude::*;
use teloxide::types::{AllowedUpdate, Message, UpdateKind};
use teloxide::{ApiError, RequestError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::handler;
use super::tasks::TaskSet;
use crate::config::Config;
use crate::pipeline::AudioPipeline;

/// Pause after a failed getUpdates call before polling again
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Consumes the update stream and spawns one job per eligible message.
///
/// Runs until the shutdown token is cancelled, then drains in-flight
/// jobs before returning. No job is ever cancelled mid-run.
pub struct UpdateDispatcher {
    bot: Bot,
    pipeline: Arc<AudioPipeline>,
    tasks: TaskSet,
    poll_timeout_secs: u32,
    shutdown: CancellationToken,
}

impl UpdateDispatcher {
    pub fn new(
        bot: Bot,
        pipeline: AudioPipeline,
        config: &Config,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            bot,
            pipeline: Arc::new(pipeline),
            tasks: TaskSet::new(config.app.max_concurrent_jobs),
            poll_timeout_secs: config.telegram.poll_timeout_secs,
            shutdown,
        }
    }

    /// Poll for updates until shutdown, then wait out in-flight work.
    pub async fn run(self) -> crate::Result<()> {
        let me = self
            .bot
            .get_me()
            .await
            .context("getMe failed; is the bot token valid?")?;
        info!(
            "Connected as @{}",
            me.user.username.as_deref().unwrap_or("unknown")
        );

        // Long polling only works without a webhook
        self.bot
            .delete_webhook()
            .send()
            .await
            .context("Failed to clear webhook")?;

        let mut offset: i32 = 0;

        loop {
            let result = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested, stopping update polling");
                    break;
                }
                result = self
                    .bot
                    .get_updates()
                    .offset(offset)
                    .timeout(self.poll_timeout_secs)
                    .allowed_updates(vec![AllowedUpdate::Message])
                    .send() => result,
            };

            match result {
                Ok(updates) => {
                    debug!("Got {} update(s)", updates.len());
                    for update in updates {
                        offset = update.id.as_offset();
                        match update.kind {
                            UpdateKind::Message(msg) => self.dispatch(msg),
                            other => debug!("Ignoring non-message update: {:?}", other),
                        }
                    }
                }
                Err(RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) => {
                    error!("Another instance is polling with this token, stopping");
                    self.shutdown.cancel();
                    break;
                }
                Err(e) => {
                    warn!("getUpdates failed: {}", e);
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                }
            }
        }

        let outstanding = self.tasks.len();
        if outstanding > 0 {
            info!("Waiting for {} outstanding job(s)", outstanding);
        }
        self.tasks.drain().await;
        info!("All jobs finished");
        Ok(())
    }

    /// Spawn a pipeline job for an eligible message.
    fn dispatch(&self, msg: Message) {
        let Some(text) = dispatchable_text(msg.text()) else {
            debug!("Ignoring message {} without text", msg.id.0);
            return;
        };

        debug!("Accepted message {} from chat {}", msg.id.0, msg.chat.id.0);
        let bot = self.bot.clone();
        let pipeline = Arc::clone(&self.pipeline);
        self.tasks
            .spawn(handler::handle_message(bot, pipeline, msg.chat.id, text));
    }
}

/// The text a message must carry to be dispatched.
///
/// Anything non-empty is handed to the pipeline verbatim; there is no
/// URL validation here, bad input simply fails downstream.
fn dispatchable_text(text: Option<&str>) -> Option<String> {
    match text {
        Some(t) if !t.is_empty() => Some(t.to_string()),
        _ => None,
    }
}
