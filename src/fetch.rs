use std::{path::PathBuf, process::ExitStatus};

use log::trace;
use thiserror::Error;

/// Lazy, one-shot sequence of progress messages produced by a provider.
///
/// An `Err` item is always the last one: once a step fails nothing else is
/// attempted and the iterator is exhausted.
pub type Progress = Box<dyn Iterator<Item = Result<String, FetchError>> + Send>;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Cloning {repo} failed with {status}: {stderr}")]
    Clone {
        repo: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("Checking out {reference} failed with {status}: {stderr}")]
    Checkout {
        reference: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("Failed to run {program}: {error}")]
    Spawn {
        program: String,
        #[source]
        error: std::io::Error,
    },
    #[error("Output directory {path} cannot be locked: {error}")]
    Lock {
        path: PathBuf,
        #[source]
        error: crate::flock::Error,
    },
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
}

/// Consumes `progress` to the end, handing every message to `on_line`.
pub fn drain<F>(progress: Progress, mut on_line: F) -> Result<(), FetchError>
where
    F: FnMut(&str),
{
    for message in progress {
        let message = message?;
        trace!("{}", message);
        on_line(&message);
    }
    Ok(())
}
