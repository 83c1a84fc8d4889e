use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use teloxide::Bot;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ytaudio_bot::cli::{Cli, Commands};
use ytaudio_bot::config::Config;
use ytaudio_bot::pipeline::AudioPipeline;
use ytaudio_bot::telegram::UpdateDispatcher;
use ytaudio_bot::tools::CommandTools;
use ytaudio_bot::utils;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "ytaudio_bot=debug"
    } else {
        "ytaudio_bot=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().await?;

    match cli.command {
        Commands::Run => run_bot(config).await?,
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                config.save().await?;
                println!("Config file: {}", Config::config_path()?.display());
                println!("Edit it directly; TELOXIDE_TOKEN overrides the stored bot token.");
            }
        }
        Commands::Check => {
            let missing =
                utils::check_dependencies(&config.tools.yt_dlp_bin, &config.tools.ffmpeg_bin).await;
            if missing.is_empty() {
                println!("All external tools are available");
            } else {
                eprintln!("⚠️  Missing tools:");
                for dep in missing {
                    eprintln!("   • {}", dep);
                }
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

async fn run_bot(config: Config) -> Result<()> {
    // Check for required external dependencies (non-fatal in Docker)
    let missing =
        utils::check_dependencies(&config.tools.yt_dlp_bin, &config.tools.ffmpeg_bin).await;
    if !missing.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in &missing {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may still be installed)");
    }

    let token = config.bot_token()?;

    // Client timeout must exceed the long-poll timeout so the HTTP client
    // doesn't abort a getUpdates call the server is still holding open
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(
            u64::from(config.telegram.poll_timeout_secs) + 15,
        ))
        .build()
        .context("Failed to build HTTP client")?;
    let bot = Bot::with_client(token, client);

    let tools = CommandTools::new(&config.tools);
    let pipeline = AudioPipeline::new(Box::new(tools), &config.app);

    let shutdown = CancellationToken::new();
    spawn_shutdown_listener(shutdown.clone());

    UpdateDispatcher::new(bot, pipeline, &config, shutdown)
        .run()
        .await
}

/// Cancel the token on Ctrl-C or SIGTERM.
fn spawn_shutdown_listener(token: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut term = match signal(SignalKind::terminate()) {
                Ok(term) => term,
                Err(e) => {
                    tracing::error!("Failed to install SIGTERM handler: {}", e);
                    return;
                }
            };
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        tracing::error!("Shutdown signal listener failed: {}", e);
                        return;
                    }
                    tracing::info!("Ctrl-C received, shutting down");
                }
                _ = term.recv() => {
                    tracing::info!("SIGTERM received, shutting down");
                }
            }
        }
        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Shutdown signal listener failed: {}", e);
                return;
            }
            tracing::info!("Ctrl-C received, shutting down");
        }
        token.cancel();
    });
}
