use std::{
    ffi::OsStr,
    io::BufReader,
    path::Path,
    process::{Child, Command, ExitStatus, Output, Stdio},
    sync::mpsc::{sync_channel, Receiver, SyncSender},
    thread::{self, JoinHandle},
};

use log::{debug, trace, warn};

use super::progress::{OutputLines, ProgressFilter};
use crate::fetch::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// A running git command whose stdout and stderr are drained line by line.
///
/// Both pipes feed a rendezvous channel, so at most one line is handed over
/// at a time and nothing is queued beyond what the OS pipe holds.
pub(super) struct GitProcess {
    child: Child,
    lines: Receiver<(Stream, String)>,
    readers: Vec<JoinHandle<()>>,
    diagnostics: Vec<String>,
}

pub(super) struct Finished {
    pub status: ExitStatus,
    pub stderr: String,
}

impl GitProcess {
    pub(super) fn spawn<I, S>(git: &Path, args: I, cwd: Option<&Path>) -> Result<Self, FetchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = git_command(git, args, cwd);
        debug!("Running {:?}", command);
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| FetchError::Spawn {
                program: git.display().to_string(),
                error,
            })?;

        let (sender, lines) = sync_channel(0);
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward(stdout, Stream::Stdout, sender.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward(stderr, Stream::Stderr, sender));
        }

        Ok(Self {
            child,
            lines,
            readers,
            diagnostics: Vec::new(),
        })
    }

    /// Blocks until git prints another line. `None` once both pipes are closed.
    ///
    /// Lines from stderr are also kept, except meter redraws, to explain a
    /// failure later on.
    pub(super) fn next_line(&mut self, filter: &ProgressFilter) -> Option<String> {
        let (stream, line) = self.lines.recv().ok()?;
        trace!("git {:?}: {}", stream, line);
        if stream == Stream::Stderr && !filter.is_intermediate(&line) {
            self.diagnostics.push(line.clone());
        }
        Some(line)
    }

    pub(super) fn wait(mut self) -> Result<Finished, FetchError> {
        for reader in self.readers.drain(..) {
            if reader.join().is_err() {
                warn!("A git output reader panicked, some output may be missing");
            }
        }
        let status = self.child.wait()?;
        debug!("git exited with {}", status);
        Ok(Finished {
            status,
            stderr: self.diagnostics.join("\n"),
        })
    }
}

/// Runs a short git command to completion, capturing its output.
pub(super) fn run<I, S>(git: &Path, args: I, cwd: &Path) -> Result<Output, FetchError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = git_command(git, args, Some(cwd));
    debug!("Running {:?}", command);
    command
        .stdin(Stdio::null())
        .output()
        .map_err(|error| FetchError::Spawn {
            program: git.display().to_string(),
            error,
        })
}

fn git_command<I, S>(git: &Path, args: I, cwd: Option<&Path>) -> Command
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(git);
    command.args(args).env("LC_ALL", "C");
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }
    command
}

fn forward<R>(pipe: R, stream: Stream, sender: SyncSender<(Stream, String)>) -> JoinHandle<()>
where
    R: std::io::Read + Send + 'static,
{
    thread::spawn(move || {
        for line in OutputLines::new(BufReader::new(pipe)) {
            if sender.send((stream, line)).is_err() {
                break;
            }
        }
    })
}
