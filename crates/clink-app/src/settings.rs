//! Settings loaded from `config.toml` and the environment.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::path::PathBuf;

use clink_core::{AuthorizationConfig, Error, Result};
use config::{Config, ConfigError, Environment, File};

/// Name of the settings file, looked up in the working directory.
pub const CONFIG_NAME: &str = "config";

/// Prefix of environment overrides, e.g. `CLINK_TWITCH_USERNAME`.
const ENV_PREFIX: &str = "CLINK";

/// Typed view of the bot settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Channel to join; also the owner identity, always authorized.
    pub twitch_username: String,
    /// Extra users allowed to play sounds. Empty means everyone.
    pub twitch_authorized_users: Vec<String>,
    pub sounds_dir: PathBuf,
    pub irc_address: String,
}

fn default_sounds_dir() -> PathBuf {
    PathBuf::from("sounds")
}

fn default_irc_address() -> String {
    "irc.chat.twitch.tv:6667".to_string()
}

/// Key/value access to the raw configuration.
pub struct SettingsProvider {
    config: Config,
}

impl SettingsProvider {
    /// Read `<name>.toml` layered with `CLINK_*` environment variables.
    pub fn load(name: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name(name).required(true))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("twitch_authorized_users"),
            )
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self { config })
    }

    /// Parse settings from TOML text, without environment overrides.
    #[cfg(test)]
    pub fn from_toml(text: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(text, config::FileFormat::Toml))
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self { config })
    }

    /// Get a string value.
    pub fn get_string(&self, key: &str) -> Result<String> {
        self.config
            .get_string(key)
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Get a string value if the key is set.
    pub fn get_optional_string(&self, key: &str) -> Result<Option<String>> {
        match self.config.get_string(key) {
            Ok(value) => Ok(Some(value)),
            Err(ConfigError::NotFound(_)) => Ok(None),
            Err(e) => Err(Error::Config(e.to_string())),
        }
    }

    /// Get a list of strings; a missing key is an empty list.
    ///
    /// A plain string is accepted too and split on commas, so
    /// `twitch_authorized_users = "alice, bob"` works like an array.
    pub fn get_string_list(&self, key: &str) -> Result<Vec<String>> {
        match self.config.get_array(key) {
            Ok(values) => values
                .into_iter()
                .map(|v| v.into_string().map_err(|e| Error::Config(e.to_string())))
                .collect(),
            Err(ConfigError::NotFound(_)) => Ok(Vec::new()),
            Err(ConfigError::Type { .. }) => Ok(self
                .get_string(key)?
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()),
            Err(e) => Err(Error::Config(e.to_string())),
        }
    }

    /// Read the typed settings, filling in defaults for optional keys.
    pub fn settings(&self) -> Result<Settings> {
        Ok(Settings {
            twitch_username: self.get_string("twitch_username")?,
            twitch_authorized_users: self.get_string_list("twitch_authorized_users")?,
            sounds_dir: self
                .get_optional_string("sounds_dir")?
                .map_or_else(default_sounds_dir, PathBuf::from),
            irc_address: self
                .get_optional_string("irc_address")?
                .unwrap_or_else(default_irc_address),
        })
    }
}

impl Settings {
    /// Who may trigger sounds.
    pub fn authorization(&self) -> AuthorizationConfig {
        AuthorizationConfig::new(&self.twitch_username, &self.twitch_authorized_users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_settings() {
        let provider = SettingsProvider::from_toml(
            r#"
            twitch_username = "Streamer"
            twitch_authorized_users = ["alice", "Bob"]
            sounds_dir = "/srv/sounds"
            "#,
        )
        .unwrap();

        assert_eq!(provider.get_string("twitch_username").unwrap(), "Streamer");
        assert_eq!(
            provider.get_string_list("twitch_authorized_users").unwrap(),
            vec!["alice", "Bob"]
        );

        let settings = provider.settings().unwrap();
        assert_eq!(settings.sounds_dir, PathBuf::from("/srv/sounds"));
        assert_eq!(settings.irc_address, "irc.chat.twitch.tv:6667");

        let auth = settings.authorization();
        assert!(auth.is_authorized("streamer"));
        assert!(auth.is_authorized("bob"));
        assert!(!auth.is_authorized("carol"));
    }

    #[test]
    fn test_missing_list_allows_everyone() {
        let provider = SettingsProvider::from_toml(r#"twitch_username = "streamer""#).unwrap();
        assert!(provider
            .get_string_list("twitch_authorized_users")
            .unwrap()
            .is_empty());

        let settings = provider.settings().unwrap();
        assert_eq!(settings.sounds_dir, PathBuf::from("sounds"));
        assert!(settings.authorization().is_authorized("anyone"));
    }

    #[test]
    fn test_scalar_list_is_split_on_commas() {
        let provider = SettingsProvider::from_toml(
            r#"
            twitch_username = "streamer"
            twitch_authorized_users = "alice"
            "#,
        )
        .unwrap();
        assert_eq!(
            provider.get_string_list("twitch_authorized_users").unwrap(),
            vec!["alice"]
        );

        let provider = SettingsProvider::from_toml(
            r#"
            twitch_username = "streamer"
            twitch_authorized_users = "alice, Bob,"
            "#,
        )
        .unwrap();
        let auth = provider.settings().unwrap().authorization();
        assert!(auth.is_authorized("bob"));
        assert!(!auth.is_authorized("carol"));
    }

    #[test]
    fn test_missing_username_is_config_error() {
        let provider = SettingsProvider::from_toml("sounds_dir = \"sounds\"").unwrap();
        assert!(matches!(provider.settings(), Err(Error::Config(_))));
        assert!(matches!(
            provider.get_string("twitch_username"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let name = dir.path().join("config");
        let result = SettingsProvider::load(name.to_str().unwrap());
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
