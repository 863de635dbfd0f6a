// Settings - layered configuration for the CLI
//
// Precedence (lowest first): built-in defaults, TOML file, BLACKBOX__* env
// vars, then BBEMU which forces the emulator with its frame period.

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use blackbox_infra_emu::{EmulatorConfig, DEFAULT_MS_PER_FRAME, FRAME_PERIOD_ENV};
use blackbox_infra_usb::UsbConfig;

const ENV_PREFIX: &str = "BLACKBOX";
const CONFIG_FILE: &str = "config.toml";

/// Which device implementation to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Usb,
    Emulator,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub backend: BackendKind,
    pub usb: UsbConfig,
    pub emulator: EmulatorConfig,
}

/// Platform config file, e.g. ~/.config/blackbox/config.toml
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "blackbox", "blackbox").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

impl Settings {
    /// Load settings from all layers
    ///
    /// An explicit `path` must exist; the platform default is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let bbemu = std::env::var(FRAME_PERIOD_ENV).ok();
        Self::load_with(path, Environment::with_prefix(ENV_PREFIX), bbemu.as_deref())
    }

    pub(crate) fn load_with(
        path: Option<&Path>,
        environment: Environment,
        bbemu: Option<&str>,
    ) -> Result<Self> {
        let mut builder = Config::builder();

        match path {
            Some(path) => {
                builder = builder.add_source(File::from(path).required(true));
            }
            None => {
                if let Some(default) = default_config_path() {
                    builder = builder.add_source(File::from(default).required(false));
                }
            }
        }

        let config = builder
            .add_source(
                environment
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?;

        let mut settings: Settings = config
            .try_deserialize()
            .context("Invalid configuration")?;

        // Zero means "default" here too, as it does for BBEMU
        if settings.emulator.ms_per_frame == 0 {
            settings.emulator.ms_per_frame = DEFAULT_MS_PER_FRAME;
        }

        if bbemu.is_some() {
            settings.backend = BackendKind::Emulator;
            settings.emulator = EmulatorConfig::parse(bbemu);
        }

        Ok(settings)
    }
}
