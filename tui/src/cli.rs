use std::path::PathBuf;

use clap::Parser;
use helm_core::config::ConfigOverrides;

#[derive(Parser, Debug, Default)]
#[command(version, about = "Operator console for a remote game server")]
pub struct Cli {
    /// Read configuration from this file instead of `$HELM_HOME/config.toml`.
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Base URL of the server, e.g. `ws://localhost:8080`.
    #[arg(long = "url", value_name = "URL")]
    pub url: Option<String>,

    /// Serve this local directory in the drive view.
    #[arg(long = "drive-root", value_name = "DIR")]
    pub drive_root: Option<PathBuf>,

    /// Talk to an in-process demo server instead of the network.
    #[arg(long, default_value_t = false)]
    pub demo: bool,
}

impl Cli {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            config_path: self.config.clone(),
            server_url: self.url.clone(),
            drive_root: self.drive_root.clone(),
        }
    }
}
