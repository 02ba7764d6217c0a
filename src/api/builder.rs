use std::{env, path::PathBuf};

use home::home_dir;

use crate::{
    config::ContentfetchConfig,
    git::{GitProvider, DEFAULT_GIT_EXECUTABLE},
    provider::ProviderRegistry,
    Contentfetch,
};

#[derive(Default)]
pub struct ContentfetchBuilder {
    config_file: Option<PathBuf>,
    git_executable: Option<PathBuf>,
    lock_directory: Option<PathBuf>,
    yield_output: Option<bool>,
    skip_config: bool,
}

impl ContentfetchBuilder {
    /// Configuration file to read instead of `$HOME/.contentfetch/config.toml`.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Ignore configuration files and `CONTENTFETCH_*` variables, only the
    /// values set on the builder and the defaults are used.
    pub fn skip_config(mut self) -> Self {
        self.skip_config = true;
        self
    }

    /// Path of the git executable.
    ///
    /// Defaults to `git`, looked up in `PATH`.
    pub fn git_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.git_executable = Some(path.into());
        self
    }

    /// Directory holding the per-target lock files.
    ///
    /// Defaults to `$HOME/.contentfetch/locks`, or a directory under the
    /// system temporary directory when there is no home.
    pub fn lock_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_directory = Some(path.into());
        self
    }

    /// Report every line of git output instead of a curated subset.
    pub fn yield_output(mut self, yield_output: bool) -> Self {
        self.yield_output = Some(yield_output);
        self
    }

    pub fn try_build(self) -> anyhow::Result<Contentfetch> {
        let Self {
            config_file,
            git_executable,
            lock_directory,
            yield_output,
            skip_config,
        } = self;

        let config = if skip_config {
            ContentfetchConfig::default()
        } else {
            ContentfetchConfig::load(config_file.as_deref())?
        };

        let git_executable = git_executable
            .or(config.git_executable)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_GIT_EXECUTABLE));
        let lock_directory = lock_directory
            .or(config.lock_dir)
            .unwrap_or_else(default_lock_directory);
        let yield_output = yield_output.or(config.yield_output).unwrap_or(false);

        let git = GitProvider::new(git_executable).with_lock_dir(lock_directory);

        Ok(Contentfetch {
            registry: ProviderRegistry::with_default_providers(git),
            yield_output,
        })
    }
}

/// Lock files are never removed, one empty file per fetched target.
fn default_lock_directory() -> PathBuf {
    match home_dir() {
        Some(home) => home.join(".contentfetch/locks"),
        None => env::temp_dir().join("contentfetch-locks"),
    }
}
