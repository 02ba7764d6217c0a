use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use config::{Config, ConfigError, Environment, File, FileFormat};
use log::debug;
use serde::Deserialize;

const CONFIG_FILE: &str = ".contentfetch/config.toml";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ContentfetchConfig {
    pub git_executable: Option<PathBuf>,
    pub lock_dir: Option<PathBuf>,
    pub yield_output: Option<bool>,
}

impl ContentfetchConfig {
    /// Loads `file` (or `$HOME/.contentfetch/config.toml` when not given),
    /// overridden by `CONTENTFETCH_*` environment variables.
    ///
    /// A missing default file is not an error, a missing explicit one is.
    pub fn load(file: Option<&Path>) -> anyhow::Result<Self> {
        let (file, required) = match file {
            Some(file) => (Some(file.to_path_buf()), true),
            None => (home::home_dir().map(|home| home.join(CONFIG_FILE)), false),
        };
        let raw_config = RawConfig::load(file.as_deref(), required, None)?;

        Ok(Self {
            git_executable: raw_config.git.executable,
            lock_dir: raw_config.lock.dir,
            yield_output: raw_config.progress.raw,
        })
    }
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct RawConfig {
    #[serde(default)]
    git: GitConfig,
    #[serde(default)]
    lock: LockConfig,
    #[serde(default)]
    progress: ProgressConfig,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct GitConfig {
    executable: Option<PathBuf>,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct LockConfig {
    dir: Option<PathBuf>,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct ProgressConfig {
    raw: Option<bool>,
}

impl RawConfig {
    fn load(
        file: Option<&Path>,
        required: bool,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(file) = file {
            debug!("Reading configuration from {}", file.display());
            builder = builder.add_source(
                File::from(file)
                    .format(FileFormat::Toml)
                    .required(required),
            );
        }
        builder
            .add_source(
                Environment::with_prefix("CONTENTFETCH")
                    .separator("_")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()
    }
}
