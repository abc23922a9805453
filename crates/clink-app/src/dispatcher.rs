//! Routes chat messages to sound playback.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use clink_audio::{OutputDevice, PlaybackReport, Player};
use clink_core::{AuthorizationConfig, ChatMessage, Error, Result, SoundCatalog};
use tracing::{debug, error, info, trace};

use crate::commands::CommandMatcher;

/// Catalog name of the sound played once at startup.
pub const STARTUP_SOUND: &str = "startup";

/// What happened to a chat message.
#[derive(Debug)]
pub enum Dispatch {
    /// Sender may not play sounds.
    Unauthorized,
    /// Not one of the recognized commands.
    Unrecognized,
    /// Recognized command without a sound file.
    Unavailable,
    Played(PlaybackReport),
    /// Playback failed; the bot keeps running.
    Failed,
}

/// Authorizes, matches, and plays chat commands one at a time.
pub struct Dispatcher<D> {
    catalog: SoundCatalog,
    auth: AuthorizationConfig,
    commands: CommandMatcher,
    player: Player<D>,
}

impl<D: OutputDevice> Dispatcher<D> {
    pub const fn new(
        catalog: SoundCatalog,
        auth: AuthorizationConfig,
        commands: CommandMatcher,
        player: Player<D>,
    ) -> Self {
        Self {
            catalog,
            auth,
            commands,
            player,
        }
    }

    /// Play the startup sound, failing if it is missing or unplayable.
    pub fn play_startup_sound(&mut self) -> Result<PlaybackReport> {
        let entry = self
            .catalog
            .get(STARTUP_SOUND)
            .ok_or_else(|| Error::StartupSoundMissing(STARTUP_SOUND.to_string()))?;
        self.player.play(&entry.path)
    }

    /// Handle one chat message, blocking while its sound plays.
    pub fn handle(&mut self, message: &ChatMessage) -> Dispatch {
        trace!(
            "received message [{}] from [{}]",
            message.text,
            message.username
        );

        if !self.auth.is_authorized(&message.username) {
            trace!("user [{}] is not authorized to play a sound", message.username);
            return Dispatch::Unauthorized;
        }

        let Some(command) = self.commands.match_command(&message.text) else {
            trace!("unhandled [{}]", CommandMatcher::token(&message.text));
            return Dispatch::Unrecognized;
        };

        let Some(entry) = self.catalog.get(&command) else {
            debug!(
                "user [{}] wanted to play unknown sound: [{}]",
                message.username, command
            );
            return Dispatch::Unavailable;
        };

        info!("[{}] asks to play [{}]", message.username, command);
        match self.player.play(&entry.path) {
            Ok(report) => Dispatch::Played(report),
            Err(e) => {
                error!("cannot play sound [{}]: {e}", entry.path.display());
                Dispatch::Failed
            }
        }
    }

    /// Get the player.
    #[cfg(test)]
    pub const fn player(&self) -> &Player<D> {
        &self.player
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clink_audio::testing::{tone_sample, write_wav, RecordingDevice};
    use clink_audio::{PlaybackState, TARGET_SAMPLE_RATE};
    use std::path::Path;

    fn dispatcher(dir: &Path, allowed: &[&str]) -> Dispatcher<RecordingDevice> {
        let catalog = SoundCatalog::scan(dir).unwrap();
        Dispatcher::new(
            catalog,
            AuthorizationConfig::new("streamer", allowed),
            CommandMatcher::default(),
            Player::new(RecordingDevice::new(TARGET_SAMPLE_RATE, 2)),
        )
    }

    fn rendered(dispatcher: &Dispatcher<RecordingDevice>) -> usize {
        dispatcher.player().device().rendered().len()
    }

    #[test]
    fn test_owner_plays_ding() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("ding.wav"), TARGET_SAMPLE_RATE, 1, 2_205);
        std::fs::write(dir.path().join("applause.mp3"), b"").unwrap();

        let mut dispatcher = dispatcher(dir.path(), &[]);
        let outcome = dispatcher.handle(&ChatMessage::new("Streamer", "!ding"));

        let Dispatch::Played(report) = outcome else {
            panic!("expected playback, got {outcome:?}");
        };
        assert_eq!(report.path, dir.path().join("ding.wav"));
        assert!(!report.resampled);

        let rendered = dispatcher.player().device().rendered();
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0].sample_rate, TARGET_SAMPLE_RATE);
        assert_eq!(rendered[0].frames, 2_205);

        // The decoded tone, copied onto both device channels
        for (i, frame) in rendered[0].samples.chunks_exact(2).enumerate() {
            let expected = tone_sample(TARGET_SAMPLE_RATE, i);
            assert!((frame[0] - expected).abs() < 1e-3, "frame {i}");
            assert!((frame[1] - expected).abs() < 1e-3, "frame {i}");
        }
    }

    #[test]
    fn test_unlisted_user_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("ding.wav"), 44_100, 1, 441);
        write_wav(&dir.path().join("applause.wav"), 44_100, 1, 441);

        let mut dispatcher = dispatcher(dir.path(), &["alice"]);
        let outcome = dispatcher.handle(&ChatMessage::new("bob", "!applause"));

        assert!(matches!(outcome, Dispatch::Unauthorized));
        assert_eq!(rendered(&dispatcher), 0);

        let outcome = dispatcher.handle(&ChatMessage::new("Alice", "!applause"));
        assert!(matches!(outcome, Dispatch::Played(_)));
        assert_eq!(rendered(&dispatcher), 1);
    }

    #[test]
    fn test_unknown_command_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("ding.wav"), 44_100, 1, 441);

        let mut dispatcher = dispatcher(dir.path(), &[]);
        let outcome = dispatcher.handle(&ChatMessage::new("viewer", "!unknown"));

        assert!(matches!(outcome, Dispatch::Unrecognized));
        assert_eq!(rendered(&dispatcher), 0);
        assert_eq!(dispatcher.player().state(), PlaybackState::Idle);
    }

    #[test]
    fn test_catalog_file_outside_command_set_is_not_playable() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("secret.wav"), 44_100, 1, 441);
        write_wav(&dir.path().join("startup.wav"), 44_100, 1, 441);

        let mut dispatcher = dispatcher(dir.path(), &[]);
        assert!(matches!(
            dispatcher.handle(&ChatMessage::new("streamer", "!secret")),
            Dispatch::Unrecognized
        ));
        assert!(matches!(
            dispatcher.handle(&ChatMessage::new("streamer", "!startup")),
            Dispatch::Unrecognized
        ));
        assert_eq!(rendered(&dispatcher), 0);
    }

    #[test]
    fn test_recognized_command_without_file() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("ding.wav"), 44_100, 1, 441);

        let mut dispatcher = dispatcher(dir.path(), &[]);
        let outcome = dispatcher.handle(&ChatMessage::new("viewer", "!airhorn"));

        assert!(matches!(outcome, Dispatch::Unavailable));
        assert_eq!(rendered(&dispatcher), 0);
    }

    #[test]
    fn test_broken_sound_does_not_stop_the_bot() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("airhorn.wav"), b"garbage").unwrap();
        write_wav(&dir.path().join("ding.wav"), 44_100, 2, 441);

        let mut dispatcher = dispatcher(dir.path(), &[]);
        assert!(matches!(
            dispatcher.handle(&ChatMessage::new("viewer", "!airhorn")),
            Dispatch::Failed
        ));
        assert_eq!(dispatcher.player().state(), PlaybackState::Idle);

        assert!(matches!(
            dispatcher.handle(&ChatMessage::new("viewer", "!ding")),
            Dispatch::Played(_)
        ));
        assert_eq!(rendered(&dispatcher), 1);
    }

    #[test]
    fn test_startup_sound() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("startup.wav"), 48_000, 2, 4_800);

        let mut dispatcher = dispatcher(dir.path(), &[]);
        let report = dispatcher.play_startup_sound().unwrap();
        assert!(report.resampled);
        assert_eq!(report.frames, 4_410);
        assert_eq!(rendered(&dispatcher), 1);
    }

    #[test]
    fn test_missing_startup_sound() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("ding.wav"), 44_100, 1, 441);

        let mut dispatcher = dispatcher(dir.path(), &[]);
        assert!(matches!(
            dispatcher.play_startup_sound(),
            Err(Error::StartupSoundMissing(_))
        ));
    }
}
