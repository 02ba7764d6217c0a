use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

use git2::{Oid, Repository};
use log::{debug, info, warn};

use super::{
    command::{self, Finished, GitProcess},
    progress::ProgressFilter,
};
use crate::{
    fetch::{FetchError, Progress},
    flock::FileLock,
    model::Specification,
    provider::ContentProvider,
};

pub const DEFAULT_GIT_EXECUTABLE: &str = "git";

/// Clones repositories with the `git` executable.
///
/// Meant to be the last provider tried: it claims every source and lets git
/// report unusable ones while fetching.
#[derive(Debug, Clone)]
pub struct GitProvider {
    git: PathBuf,
    lock_dir: Option<PathBuf>,
}

impl Default for GitProvider {
    fn default() -> Self {
        Self::new(DEFAULT_GIT_EXECUTABLE)
    }
}

impl GitProvider {
    pub fn new(git: impl Into<PathBuf>) -> Self {
        Self {
            git: git.into(),
            lock_dir: None,
        }
    }

    /// Serializes fetches into the same output directory through lock files
    /// kept in `lock_dir`.
    pub fn with_lock_dir(mut self, lock_dir: impl Into<PathBuf>) -> Self {
        self.lock_dir = Some(lock_dir.into());
        self
    }
}

impl ContentProvider for GitProvider {
    fn name(&self) -> &str {
        "git"
    }

    fn detect(&self, _source: &str, _reference: Option<&str>) -> bool {
        true
    }

    fn fetch(
        &self,
        specification: &Specification,
        output_dir: &Path,
        yield_output: bool,
    ) -> Progress {
        Box::new(GitFetch {
            git: self.git.clone(),
            lock_dir: self.lock_dir.clone(),
            specification: specification.clone(),
            output_dir: output_dir.to_path_buf(),
            filter: ProgressFilter::new(yield_output),
            state: State::NotStarted,
            _lock: None,
        })
    }

    fn content_id(&self, output_dir: &Path) -> Option<String> {
        match head_commit(output_dir) {
            Ok(oid) => Some(oid.to_string()),
            Err(error) => {
                debug!(
                    "No commit checked out in {}: {}",
                    output_dir.display(),
                    error
                );
                None
            }
        }
    }
}

fn head_commit(path: &Path) -> Result<Oid, git2::Error> {
    let repo = Repository::open(path)?;
    let head = repo.head()?;
    let commit = head.peel_to_commit()?;
    Ok(commit.id())
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Clone,
    Checkout,
    Submodules,
}

enum State {
    NotStarted,
    Running(Step, GitProcess),
    Done,
}

/// One fetch, advanced step by step as the caller pulls messages.
struct GitFetch {
    git: PathBuf,
    lock_dir: Option<PathBuf>,
    specification: Specification,
    output_dir: PathBuf,
    filter: ProgressFilter,
    state: State,
    _lock: Option<FileLock>,
}

type Transition = Result<(State, Option<String>), FetchError>;

impl Iterator for GitFetch {
    type Item = Result<String, FetchError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let transition = match std::mem::replace(&mut self.state, State::Done) {
                State::Done => return None,
                State::NotStarted => self.start_clone(),
                State::Running(step, mut process) => match process.next_line(&self.filter) {
                    Some(line) => {
                        let message = self.filter.accept(&line).then_some(line);
                        Ok((State::Running(step, process), message))
                    }
                    None => self.finish(step, process),
                },
            };

            match transition {
                Ok((state, message)) => {
                    self.state = state;
                    if let Some(message) = message {
                        return Some(Ok(message));
                    }
                }
                Err(error) => {
                    warn!("Fetching {} failed: {}", self.specification, error);
                    self._lock = None;
                    return Some(Err(error));
                }
            }
        }
    }
}

impl GitFetch {
    fn start_clone(&mut self) -> Transition {
        std::fs::create_dir_all(&self.output_dir)?;
        if let Some(lock_dir) = &self.lock_dir {
            let lock =
                FileLock::for_target(lock_dir, &self.output_dir).map_err(|error| {
                    FetchError::Lock {
                        path: self.output_dir.clone(),
                        error,
                    }
                })?;
            self._lock = Some(lock);
        }

        info!(
            "Cloning {} into {}",
            self.specification.repo,
            self.output_dir.display()
        );
        let process = GitProcess::spawn(
            &self.git,
            [
                OsStr::new("clone"),
                OsStr::new("--progress"),
                OsStr::new("--recursive"),
                OsStr::new("--"),
                OsStr::new(&self.specification.repo),
                self.output_dir.as_os_str(),
            ],
            None,
        )?;
        Ok((State::Running(Step::Clone, process), None))
    }

    fn finish(&mut self, step: Step, process: GitProcess) -> Transition {
        let Finished { status, stderr } = process.wait()?;
        debug!("{:?} step of {} finished", step, self.specification);

        match step {
            Step::Clone if !status.success() => Err(FetchError::Clone {
                repo: self.specification.repo.clone(),
                status,
                stderr,
            }),
            Step::Clone => match self.specification.reference.clone() {
                Some(reference) => self.start_checkout(reference),
                None => Ok(self.complete()),
            },
            Step::Checkout | Step::Submodules if !status.success() => {
                Err(FetchError::Checkout {
                    reference: self.specification.reference.clone().unwrap_or_default(),
                    status,
                    stderr,
                })
            }
            Step::Checkout => self.start_submodules(),
            Step::Submodules => Ok(self.complete()),
        }
    }

    fn start_checkout(&mut self, reference: String) -> Transition {
        let commit = self.resolve_reference(&reference)?;
        info!(
            "Checking out {} ({}) in {}",
            reference,
            commit,
            self.output_dir.display()
        );
        let process = GitProcess::spawn(
            &self.git,
            ["checkout", "--detach", commit.as_str()],
            Some(&self.output_dir),
        )?;
        Ok((
            State::Running(Step::Checkout, process),
            Some(format!("Checking out {reference}...")),
        ))
    }

    /// Branches other than the default one only exist as remote-tracking
    /// branches right after a clone, so `origin/<reference>` is tried too.
    fn resolve_reference(&self, reference: &str) -> Result<String, FetchError> {
        let revision = format!("{reference}^{{commit}}");
        let local = command::run(
            &self.git,
            ["rev-parse", "--verify", revision.as_str()],
            &self.output_dir,
        )?;
        if local.status.success() {
            return Ok(String::from_utf8_lossy(&local.stdout).trim().to_owned());
        }

        let remote_revision = format!("origin/{revision}");
        let remote = command::run(
            &self.git,
            ["rev-parse", "--verify", remote_revision.as_str()],
            &self.output_dir,
        )?;
        if remote.status.success() {
            debug!("{} resolved as a remote-tracking branch", reference);
            return Ok(String::from_utf8_lossy(&remote.stdout).trim().to_owned());
        }

        Err(FetchError::Checkout {
            reference: reference.to_owned(),
            status: local.status,
            stderr: String::from_utf8_lossy(&local.stderr).trim().to_owned(),
        })
    }

    fn start_submodules(&mut self) -> Transition {
        if !self.output_dir.join(".gitmodules").exists() {
            return Ok(self.complete());
        }
        let process = GitProcess::spawn(
            &self.git,
            ["submodule", "update", "--init", "--recursive"],
            Some(&self.output_dir),
        )?;
        Ok((State::Running(Step::Submodules, process), None))
    }

    fn complete(&mut self) -> (State, Option<String>) {
        info!(
            "Fetched {} into {}",
            self.specification,
            self.output_dir.display()
        );
        self._lock = None;
        (State::Done, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        time::Duration,
    };

    use git2::{Commit, Signature};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn commit_file(repo: &Repository, name: &str, content: &str, message: &str) -> Oid {
        let workdir = repo.workdir().unwrap();
        std::fs::write(workdir.join(name), content).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let signature = Signature::now("Test", "test@example.com").unwrap();
        let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<&Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .unwrap()
    }

    fn upstream() -> (TempDir, Repository, Oid) {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let commit = commit_file(&repo, "test", "Hello", "Test commit");
        (dir, repo, commit)
    }

    fn spec(repo: &Path, reference: Option<&str>) -> Specification {
        Specification::new(repo.to_string_lossy(), reference.map(str::to_owned))
    }

    fn run_git(dir: &Path, args: &[&str]) {
        let status = std::process::Command::new("git")
            .args(["-c", "protocol.file.allow=always"])
            .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
            .args(args)
            .current_dir(dir)
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed with {status}");
    }

    /// Local submodule clones need the `file` transport, refused by default
    /// since git 2.38.
    #[cfg(unix)]
    fn git_allowing_file_transport(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("git");
        std::fs::write(
            &script,
            "#!/bin/sh\nexec git -c protocol.file.allow=always \"$@\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    fn read(dir: &Path, name: &str) -> String {
        std::fs::read_to_string(dir.join(name)).unwrap()
    }

    #[test]
    fn detect_always_accepts() {
        let provider = GitProvider::default();
        assert!(provider.detect("/tmp/doesnt-exist", Some("1234")));
        assert!(provider.detect("/tmp/doesnt-exist", None));
        assert!(provider.detect("/etc", Some("1234")));
        assert!(provider.detect("https://example.com/path/here", None));
        assert!(provider.detect("", None));
    }

    #[test]
    fn clone_local_repository() {
        let (upstream_dir, _repo, _) = upstream();
        let output = tempfile::tempdir().unwrap();

        let messages = GitProvider::default()
            .fetch(&spec(upstream_dir.path(), None), output.path(), false)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(read(output.path(), "test"), "Hello");
        assert!(messages.iter().any(|m| m.starts_with("Cloning into")));
    }

    #[test]
    fn clone_creates_missing_output_directory() {
        let (upstream_dir, _repo, _) = upstream();
        let output = tempfile::tempdir().unwrap();
        let target = output.path().join("nested").join("clone");

        for message in GitProvider::default().fetch(&spec(upstream_dir.path(), None), &target, true)
        {
            message.unwrap();
        }

        assert_eq!(read(&target, "test"), "Hello");
    }

    #[test]
    fn clone_missing_repository() {
        let missing = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();

        let results: Vec<_> = GitProvider::default()
            .fetch(&spec(&missing.path().join("nope"), None), output.path(), false)
            .collect();

        let (last, before) = results.split_last().unwrap();
        assert!(before.iter().all(Result::is_ok));
        match last {
            Err(FetchError::Clone { status, stderr, .. }) => {
                assert!(!status.success());
                assert!(!stderr.is_empty());
            }
            other => panic!("expected a clone failure, got {other:?}"),
        }
        assert!(!output.path().join(".git").exists());
    }

    #[test]
    fn checkout_reference() {
        let (upstream_dir, repo, first) = upstream();
        commit_file(&repo, "test", "Bye", "Second commit");
        let output = tempfile::tempdir().unwrap();
        let provider = GitProvider::default();

        let messages = provider
            .fetch(
                &spec(upstream_dir.path(), Some(&first.to_string())),
                output.path(),
                false,
            )
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(read(output.path(), "test"), "Hello");
        assert_eq!(provider.content_id(output.path()), Some(first.to_string()));
        assert!(Repository::open(output.path()).unwrap().head_detached().unwrap());
        assert!(messages.contains(&format!("Checking out {first}...")));
    }

    #[test]
    fn checkout_remote_branch() {
        let (upstream_dir, repo, first) = upstream();
        repo.branch("feature", &repo.find_commit(first).unwrap(), false)
            .unwrap();
        commit_file(&repo, "test", "Bye", "Second commit");
        let output = tempfile::tempdir().unwrap();

        for message in GitProvider::default().fetch(
            &spec(upstream_dir.path(), Some("feature")),
            output.path(),
            false,
        ) {
            message.unwrap();
        }

        assert_eq!(read(output.path(), "test"), "Hello");
    }

    #[test]
    fn checkout_missing_reference() {
        let (upstream_dir, _repo, _) = upstream();
        let output = tempfile::tempdir().unwrap();

        let results: Vec<_> = GitProvider::default()
            .fetch(
                &spec(upstream_dir.path(), Some("does-not-exist")),
                output.path(),
                false,
            )
            .collect();

        match results.last() {
            Some(Err(FetchError::Checkout { reference, .. })) => {
                assert_eq!(reference, "does-not-exist")
            }
            other => panic!("expected a checkout failure, got {other:?}"),
        }
        assert_eq!(read(output.path(), "test"), "Hello");
    }

    #[test]
    fn progress_is_one_shot() {
        let (upstream_dir, _repo, _) = upstream();
        let output = tempfile::tempdir().unwrap();
        let mut progress =
            GitProvider::default().fetch(&spec(upstream_dir.path(), None), output.path(), true);

        for message in progress.by_ref() {
            message.unwrap();
        }

        assert!(progress.next().is_none());
        assert!(progress.next().is_none());
        assert_eq!(read(output.path(), "test"), "Hello");
    }

    #[test]
    fn concurrent_fetches_into_distinct_directories() {
        let (upstream_dir, _repo, _) = upstream();
        let outputs = [tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap()];
        let provider = GitProvider::default();
        let specification = spec(upstream_dir.path(), None);

        std::thread::scope(|scope| {
            for output in &outputs {
                let progress = provider.fetch(&specification, output.path(), false);
                scope.spawn(move || {
                    for message in progress {
                        message.unwrap();
                    }
                });
            }
        });

        assert_eq!(read(outputs[0].path(), "test"), "Hello");
        assert_eq!(read(outputs[0].path(), "test"), read(outputs[1].path(), "test"));
    }

    #[test]
    fn lock_file_reusable_after_fetch() {
        let (upstream_dir, _repo, _) = upstream();
        let output = tempfile::tempdir().unwrap();
        let locks = tempfile::tempdir().unwrap();

        let provider = GitProvider::default().with_lock_dir(locks.path());
        for message in provider.fetch(&spec(upstream_dir.path(), None), output.path(), false) {
            message.unwrap();
        }

        let lock_files = std::fs::read_dir(locks.path()).unwrap().count();
        assert_eq!(lock_files, 1);
        FileLock::for_target(locks.path(), output.path()).unwrap();
    }

    #[test]
    fn fetch_waits_for_target_lock() {
        let (upstream_dir, _repo, _) = upstream();
        let output = tempfile::tempdir().unwrap();
        let locks = tempfile::tempdir().unwrap();
        let lock = FileLock::for_target(locks.path(), output.path()).unwrap();

        let mut progress = GitProvider::default().with_lock_dir(locks.path()).fetch(
            &spec(upstream_dir.path(), None),
            output.path(),
            false,
        );
        let started = Arc::new(AtomicBool::new(false));
        let fetching = std::thread::spawn({
            let started = Arc::clone(&started);
            move || {
                let first = progress.next();
                started.store(true, Ordering::SeqCst);
                for message in progress {
                    message.unwrap();
                }
                first
            }
        });

        std::thread::sleep(Duration::from_millis(1500));
        assert!(!started.load(Ordering::SeqCst));
        assert!(!output.path().join(".git").exists());

        drop(lock);
        let first = fetching.join().unwrap();
        assert!(matches!(first, Some(Ok(_))));
        assert_eq!(read(output.path(), "test"), "Hello");
    }

    #[cfg(unix)]
    #[test]
    fn checkout_initializes_submodules_of_reference() {
        let (inner_dir, _inner, _) = upstream();
        let (outer_dir, outer, _) = upstream();
        let inner_path = inner_dir.path().to_string_lossy().into_owned();
        run_git(
            outer_dir.path(),
            &["submodule", "add", inner_path.as_str(), "lib/inner"],
        );
        run_git(outer_dir.path(), &["commit", "-m", "Add submodule"]);
        let with_submodule = outer.head().unwrap().peel_to_commit().unwrap().id();
        run_git(outer_dir.path(), &["rm", "lib/inner"]);
        run_git(outer_dir.path(), &["commit", "-m", "Remove submodule"]);

        let bin = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let provider = GitProvider::new(git_allowing_file_transport(bin.path()));

        let messages = provider
            .fetch(
                &spec(outer_dir.path(), Some(&with_submodule.to_string())),
                output.path(),
                false,
            )
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(read(&output.path().join("lib").join("inner"), "test"), "Hello");
        assert_eq!(
            provider.content_id(output.path()),
            Some(with_submodule.to_string())
        );
        assert!(messages.contains(&format!("Checking out {with_submodule}...")));
    }

    #[test]
    fn missing_git_executable() {
        let (upstream_dir, _repo, _) = upstream();
        let output = tempfile::tempdir().unwrap();

        let mut progress = GitProvider::new("/nonexistent/bin/git").fetch(
            &spec(upstream_dir.path(), None),
            output.path(),
            false,
        );

        assert!(matches!(progress.next(), Some(Err(FetchError::Spawn { .. }))));
        assert!(progress.next().is_none());
    }

    #[test]
    fn content_id_without_repository() {
        let output = tempfile::tempdir().unwrap();
        assert_eq!(GitProvider::default().content_id(output.path()), None);
    }
}
