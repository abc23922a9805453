//! # clink
//!
//! Plays sounds from a local directory when Twitch chat asks for them.

mod chat;
mod commands;
mod dispatcher;
mod settings;

use anyhow::{anyhow, Context, Result};
use chat::TwitchChat;
use clink_audio::{AudioOutput, Player, TARGET_SAMPLE_RATE};
use clink_core::SoundCatalog;
use commands::CommandMatcher;
use dispatcher::{Dispatch, Dispatcher};
use settings::{SettingsProvider, CONFIG_NAME};
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clink=trace,clink_core=trace,clink_audio=debug".into()),
        )
        .init();

    info!("Starting clink v{}", env!("CARGO_PKG_VERSION"));

    let settings = SettingsProvider::load(CONFIG_NAME)
        .and_then(|provider| provider.settings())
        .context("could not read config file")?;

    let catalog = SoundCatalog::scan(&settings.sounds_dir)
        .and_then(SoundCatalog::require_sounds)
        .context("cannot read sound list")?;

    let output = AudioOutput::open(TARGET_SAMPLE_RATE)
        .with_context(|| format!("cannot init the speaker for rate [{TARGET_SAMPLE_RATE}]"))?;
    info!("Audio output ready on {}", output.device_name());

    let mut dispatcher = Dispatcher::new(
        catalog,
        settings.authorization(),
        CommandMatcher::default(),
        Player::new(output),
    );
    dispatcher
        .play_startup_sound()
        .context("could not configure speaker")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("cannot start async runtime")?;

    let chat = runtime
        .block_on(TwitchChat::connect(
            &settings.irc_address,
            &settings.twitch_username,
        ))
        .context("cannot configure Twitch chat bot")?;

    // Only handle one message at once
    let (tx, mut rx) = mpsc::channel(1);
    let reader = runtime.spawn(chat.run(tx));

    while let Some(message) = rx.blocking_recv() {
        if let Dispatch::Played(report) = dispatcher.handle(&message) {
            debug!(
                "Played {} frames of {}",
                report.frames,
                report.path.display()
            );
        }
    }

    runtime
        .block_on(reader)
        .map_err(|e| anyhow!("chat task failed: {e}"))?
        .context("chat connection ended")?;

    Ok(())
}
