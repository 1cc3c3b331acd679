//! `$HELM_HOME/config.toml` loading with command-line overrides.

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::access::AccessGate;
use crate::access::AllowAll;
use crate::access::TokenGate;
use crate::channel::ChannelOptions;
use crate::console::ConsoleEndpoints;
use crate::console::ConsoleSettings;
use crate::console::StartRequest;
use crate::log::DEFAULT_LOG_CAPACITY;
use crate::suggest::DEFAULT_COMMANDS;
use crate::suggest::SuggestionEngine;
use crate::tree::mock::DEFAULT_MOCK_LATENCY;

pub const CONFIG_TOML_FILE: &str = "config.toml";
pub const HELM_HOME_ENV_VAR: &str = "HELM_HOME";

const DEFAULT_SERVER_URL: &str = "ws://localhost:8080";
const DEFAULT_CONTROL_PATH: &str = "server";
const DEFAULT_CONSOLE_PATH: &str = "console";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine the home directory; set {HELM_HOME_ENV_VAR}")]
    NoHome,
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid server url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Raw file contents. Every field is optional; defaults live in [`Config`].
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ConfigToml {
    #[serde(default)]
    pub server: ServerToml,
    #[serde(default)]
    pub reconnect: ReconnectToml,
    #[serde(default)]
    pub console: ConsoleToml,
    #[serde(default)]
    pub drive: DriveToml,
    #[serde(default)]
    pub access: AccessToml,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ServerToml {
    pub url: Option<String>,
    pub control_path: Option<String>,
    pub console_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ReconnectToml {
    pub enabled: Option<bool>,
    pub attempts: Option<u32>,
    pub delay_ms: Option<u64>,
    pub auto_connect: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ConsoleToml {
    pub commands: Option<Vec<String>>,
    pub log_capacity: Option<usize>,
    pub start: Option<StartRequest>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct DriveToml {
    pub root: Option<PathBuf>,
    pub mock_latency_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AccessToml {
    pub token: Option<String>,
}

/// Values supplied on the command line; they win over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub server_url: Option<String>,
    pub drive_root: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub helm_home: PathBuf,
    pub server_url: String,
    pub control_path: String,
    pub console_path: String,
    pub channel: ChannelOptions,
    pub commands: Vec<String>,
    pub console: ConsoleSettings,
    /// Local directory served by the drive; the mock drive when unset.
    pub drive_root: Option<PathBuf>,
    pub mock_latency: Duration,
    pub access_token: Option<String>,
}

impl Config {
    /// Load `config.toml` from `helm_home` (or the override path) and apply
    /// `overrides`. A missing file yields the defaults.
    pub fn load(helm_home: PathBuf, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let path = overrides
            .config_path
            .clone()
            .unwrap_or_else(|| helm_home.join(CONFIG_TOML_FILE));
        let toml = load_config_toml(&path)?;
        Self::from_toml(toml, helm_home, overrides)
    }

    pub fn from_toml(
        toml: ConfigToml,
        helm_home: PathBuf,
        overrides: ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let server_url = overrides
            .server_url
            .or(toml.server.url)
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        Url::parse(&server_url).map_err(|source| ConfigError::InvalidUrl {
            url: server_url.clone(),
            source,
        })?;

        let defaults = ChannelOptions::default();
        let channel = ChannelOptions {
            auto_connect: toml.reconnect.auto_connect.unwrap_or(defaults.auto_connect),
            reconnection: toml.reconnect.enabled.unwrap_or(defaults.reconnection),
            reconnection_attempts: toml
                .reconnect
                .attempts
                .unwrap_or(defaults.reconnection_attempts),
            reconnection_delay: toml
                .reconnect
                .delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.reconnection_delay),
        };

        let commands = toml
            .console
            .commands
            .unwrap_or_else(|| DEFAULT_COMMANDS.iter().map(|cmd| cmd.to_string()).collect());

        Ok(Self {
            helm_home,
            server_url,
            control_path: toml
                .server
                .control_path
                .unwrap_or_else(|| DEFAULT_CONTROL_PATH.to_string()),
            console_path: toml
                .server
                .console_path
                .unwrap_or_else(|| DEFAULT_CONSOLE_PATH.to_string()),
            channel,
            commands,
            console: ConsoleSettings {
                log_capacity: toml.console.log_capacity.unwrap_or(DEFAULT_LOG_CAPACITY),
                start: toml.console.start.unwrap_or_default(),
            },
            drive_root: overrides.drive_root.or(toml.drive.root),
            mock_latency: toml
                .drive
                .mock_latency_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_MOCK_LATENCY),
            access_token: toml.access.token.filter(|token| !token.is_empty()),
        })
    }

    pub fn endpoints(&self) -> ConsoleEndpoints {
        ConsoleEndpoints::from_base(&self.server_url, &self.control_path, &self.console_path)
    }

    pub fn suggestion_engine(&self) -> SuggestionEngine {
        SuggestionEngine::new(self.commands.iter().cloned())
    }

    pub fn log_dir(&self) -> PathBuf {
        self.helm_home.join("log")
    }

    /// Token gate when a token is configured, otherwise everyone is let in.
    pub fn access_gate(&self) -> Box<dyn AccessGate> {
        match &self.access_token {
            Some(token) => Box::new(TokenGate::from_env(token.clone())),
            None => Box::new(AllowAll),
        }
    }
}

fn load_config_toml(path: &Path) -> Result<ConfigToml, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("{} not found, using defaults", path.display());
            return Ok(ConfigToml::default());
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// `$HELM_HOME` when set, otherwise `~/.helm`. The directory need not exist.
pub fn find_helm_home() -> Result<PathBuf, ConfigError> {
    if let Some(home) = std::env::var_os(HELM_HOME_ENV_VAR).filter(|home| !home.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    let mut home = dirs::home_dir().ok_or(ConfigError::NoHome)?;
    home.push(".helm");
    Ok(home)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn missing_file_uses_defaults() {
        let home = tempdir().expect("tempdir");
        let config =
            Config::load(home.path().to_path_buf(), ConfigOverrides::default()).expect("load");
        assert_eq!(config.server_url, "ws://localhost:8080");
        assert_eq!(config.channel, ChannelOptions::default());
        assert_eq!(config.console.log_capacity, 1000);
        assert_eq!(config.console.start, StartRequest::default());
        assert_eq!(config.commands.len(), DEFAULT_COMMANDS.len());
        assert_eq!(config.mock_latency, Duration::from_millis(1500));
        assert_eq!(config.log_dir(), home.path().join("log"));
        let endpoints = config.endpoints();
        assert_eq!(endpoints.control.url, "ws://localhost:8080/server");
        assert_eq!(endpoints.stream.url, "ws://localhost:8080/console");
    }

    #[test]
    fn file_values_and_overrides_merge() {
        let home = tempdir().expect("tempdir");
        std::fs::write(
            home.path().join(CONFIG_TOML_FILE),
            r#"
[server]
url = "ws://mc.example:9000"
console_path = "logs"

[reconnect]
enabled = false
attempts = 9
delay_ms = 250

[console]
commands = ["list", "stop"]
log_capacity = 50

[console.start]
command = "./start.sh"
arguments = []

[drive]
root = "/srv/minecraft"
mock_latency_ms = 0

[access]
token = "hunter2"
"#,
        )
        .expect("write config");

        let overrides = ConfigOverrides {
            server_url: Some("wss://override.example".to_string()),
            ..ConfigOverrides::default()
        };
        let config = Config::load(home.path().to_path_buf(), overrides).expect("load");
        assert_eq!(config.server_url, "wss://override.example");
        assert_eq!(config.console_path, "logs");
        assert_eq!(config.control_path, "server");
        assert_eq!(
            config.channel,
            ChannelOptions {
                auto_connect: true,
                reconnection: false,
                reconnection_attempts: 9,
                reconnection_delay: Duration::from_millis(250),
            }
        );
        assert_eq!(config.suggestion_engine().vocabulary(), ["list", "stop"]);
        assert_eq!(config.console.log_capacity, 50);
        assert_eq!(config.console.start.command, "./start.sh");
        assert_eq!(config.drive_root, Some(PathBuf::from("/srv/minecraft")));
        assert_eq!(config.mock_latency, Duration::ZERO);
        assert_eq!(config.access_token.as_deref(), Some("hunter2"));
    }

    #[test]
    fn explicit_config_path_wins() {
        let home = tempdir().expect("tempdir");
        let other = home.path().join("other.toml");
        std::fs::write(&other, "[drive]\nroot = \"/data\"\n").expect("write");
        let overrides = ConfigOverrides {
            config_path: Some(other),
            drive_root: Some(PathBuf::from("/cli")),
            ..ConfigOverrides::default()
        };
        let config = Config::load(home.path().to_path_buf(), overrides).expect("load");
        assert_eq!(config.drive_root, Some(PathBuf::from("/cli")));
    }

    #[test]
    fn malformed_inputs_are_reported() {
        let home = tempdir().expect("tempdir");
        std::fs::write(home.path().join(CONFIG_TOML_FILE), "[server\nurl = 1").expect("write");
        assert_matches!(
            Config::load(home.path().to_path_buf(), ConfigOverrides::default()),
            Err(ConfigError::Parse { .. })
        );

        let overrides = ConfigOverrides {
            server_url: Some("not a url".to_string()),
            ..ConfigOverrides::default()
        };
        assert_matches!(
            Config::from_toml(ConfigToml::default(), PathBuf::from("/tmp"), overrides),
            Err(ConfigError::InvalidUrl { url, .. }) if url == "not a url"
        );
    }
}
