use crate::{ChangeSet, FileChange, StatusCode};
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("not in a git repository")]
    NotARepo,
    #[error("could not enumerate changes: {0}")]
    SourceUnavailable(String),
    #[error("failed to {op} {path}: {reason}")]
    OperationFailed {
        op: &'static str,
        path: String,
        reason: String,
    },
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GitError>;

/// External actor that owns the change set and the mutating operations.
///
/// The actor is the source of truth: implementations never cache beyond one
/// `list_changes` call, and enumeration failure is an error, never an empty
/// set.
pub trait ChangeSource {
    fn list_changes(&mut self) -> Result<ChangeSet>;
    fn stage(&mut self, path: &str) -> Result<()>;
    fn unstage(&mut self, path: &str) -> Result<()>;
    fn discard(&mut self, change: &FileChange) -> Result<()>;
    fn stage_all(&mut self) -> Result<()>;
    fn unstage_all(&mut self) -> Result<()>;
}

/// `ChangeSource` backed by shell invocations of git, rooted at one repo.
pub struct GitChangeSource {
    repo_root: PathBuf,
}

impl GitChangeSource {
    /// Discover the repository containing the current directory.
    pub fn discover() -> Result<Self> {
        let output = Command::new("git")
            .arg("rev-parse")
            .arg("--show-toplevel")
            .output()?;

        if !output.status.success() {
            return Err(GitError::NotARepo);
        }

        let root = String::from_utf8(output.stdout)?.trim().to_string();
        Ok(Self::new(PathBuf::from(root)))
    }

    pub fn new(repo_root: PathBuf) -> Self {
        Self { repo_root }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    fn git(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.repo_root);
        cmd
    }

    fn run_op(&self, op: &'static str, path: &str, args: &[&str]) -> Result<()> {
        let output = self.git().args(args).output()?;
        if !output.status.success() {
            return Err(GitError::OperationFailed {
                op,
                path: path.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    fn porcelain(&self) -> Result<String> {
        let output = self
            .git()
            .arg("status")
            .arg("--porcelain")
            .arg("--untracked-files=all")
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitError::SourceUnavailable(stderr.trim().to_string()));
        }

        String::from_utf8(output.stdout).map_err(GitError::from)
    }

    /// SHA-256 over the porcelain output.
    ///
    /// Cheap staleness probe: the host loop compares fingerprints to detect
    /// changes made outside the picker (editors, other git invocations).
    pub fn fingerprint(&self) -> Result<String> {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(self.porcelain()?.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Unified diff text for one change, for the preview pane.
    ///
    /// Staged entries diff against the index, unstaged against the worktree.
    /// Untracked files are diffed against /dev/null so new content previews
    /// as additions.
    pub fn diff(&self, change: &FileChange) -> Result<String> {
        let output = if change.status == StatusCode::Untracked {
            // --no-index exits 1 when the files differ; only >1 is an error
            let output = self
                .git()
                .args(["diff", "--no-index", "--", "/dev/null", &change.path])
                .output()?;
            if !matches!(output.status.code(), Some(0) | Some(1)) {
                return Err(GitError::OperationFailed {
                    op: "diff",
                    path: change.path.clone(),
                    reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
            output
        } else {
            let mut cmd = self.git();
            cmd.arg("diff");
            if change.staged {
                cmd.arg("--cached");
            }
            cmd.arg("--").arg(&change.path);
            let output = cmd.output()?;
            if !output.status.success() {
                return Err(GitError::OperationFailed {
                    op: "diff",
                    path: change.path.clone(),
                    reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
            output
        };

        String::from_utf8(output.stdout).map_err(GitError::from)
    }
}

impl ChangeSource for GitChangeSource {
    fn list_changes(&mut self) -> Result<ChangeSet> {
        Ok(parse_porcelain(&self.porcelain()?))
    }

    fn stage(&mut self, path: &str) -> Result<()> {
        self.run_op("stage", path, &["add", "--", path])
    }

    fn unstage(&mut self, path: &str) -> Result<()> {
        self.run_op("unstage", path, &["restore", "--staged", "--", path])
    }

    fn discard(&mut self, change: &FileChange) -> Result<()> {
        if change.status == StatusCode::Untracked {
            self.run_op("discard", &change.path, &["clean", "-fq", "--", &change.path])
        } else {
            self.run_op("discard", &change.path, &["restore", "--", &change.path])
        }
    }

    fn stage_all(&mut self) -> Result<()> {
        self.run_op("stage", ".", &["add", "--all"])
    }

    fn unstage_all(&mut self) -> Result<()> {
        self.run_op("unstage", ".", &["restore", "--staged", "--", "."])
    }
}

/// Parse `git status --porcelain` output into the two partitions.
///
/// A line with both columns set produces one entry per partition (partially
/// staged file). Rename/copy lines keep only the new path. Conflicted files
/// produce a single unstaged entry: half a conflict cannot be staged.
pub fn parse_porcelain(input: &str) -> ChangeSet {
    let mut set = ChangeSet::default();

    for line in input.lines() {
        if line.len() < 4 {
            continue;
        }

        let mut chars = line.chars();
        let x = chars.next().unwrap_or(' ');
        let y = chars.next().unwrap_or(' ');
        let path = clean_path(&line[3..]);
        if path.is_empty() {
            continue;
        }

        if is_conflict(x, y) {
            set.unstaged.push(FileChange {
                path,
                status: StatusCode::Conflicted,
                staged: false,
            });
            continue;
        }

        if x == '?' && y == '?' {
            set.unstaged.push(FileChange {
                path,
                status: StatusCode::Untracked,
                staged: false,
            });
            continue;
        }

        if x == '!' && y == '!' {
            set.unstaged.push(FileChange {
                path,
                status: StatusCode::Ignored,
                staged: false,
            });
            continue;
        }

        if let Some(status) = index_status(x) {
            set.staged.push(FileChange {
                path: path.clone(),
                status,
                staged: true,
            });
        }

        if let Some(status) = worktree_status(y) {
            set.unstaged.push(FileChange {
                path,
                status,
                staged: false,
            });
        }
    }

    set
}

/// Strip porcelain quoting and reduce rename lines to the new path.
fn clean_path(raw: &str) -> String {
    let raw = match raw.rsplit_once(" -> ") {
        Some((_, new_path)) => new_path,
        None => raw,
    };

    // git quotes paths containing special characters
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        raw[1..raw.len() - 1]
            .replace("\\\"", "\"")
            .replace("\\\\", "\\")
    } else {
        raw.to_string()
    }
}

fn is_conflict(x: char, y: char) -> bool {
    x == 'U' || y == 'U' || (x == 'A' && y == 'A') || (x == 'D' && y == 'D')
}

fn index_status(x: char) -> Option<StatusCode> {
    match x {
        'M' | 'T' => Some(StatusCode::Modified),
        'A' => Some(StatusCode::Added),
        'D' => Some(StatusCode::Deleted),
        'R' => Some(StatusCode::Renamed),
        'C' => Some(StatusCode::Copied),
        _ => None,
    }
}

fn worktree_status(y: char) -> Option<StatusCode> {
    match y {
        'M' | 'T' => Some(StatusCode::Modified),
        'D' => Some(StatusCode::Deleted),
        'A' => Some(StatusCode::Added),
        'R' => Some(StatusCode::Renamed),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_unstaged_modification() {
        let set = parse_porcelain(" M src/lib.rs\n");
        assert!(set.staged.is_empty());
        assert_eq!(set.unstaged.len(), 1);
        assert_eq!(set.unstaged[0].path, "src/lib.rs");
        assert_eq!(set.unstaged[0].status, StatusCode::Modified);
        assert!(!set.unstaged[0].staged);
    }

    #[test]
    fn parse_staged_addition() {
        let set = parse_porcelain("A  new.txt\n");
        assert_eq!(set.staged.len(), 1);
        assert!(set.unstaged.is_empty());
        assert_eq!(set.staged[0].status, StatusCode::Added);
        assert!(set.staged[0].staged);
    }

    #[test]
    fn parse_partially_staged_file() {
        // staged modification with further worktree edits
        let set = parse_porcelain("MM src/main.rs\n");
        assert_eq!(set.staged.len(), 1);
        assert_eq!(set.unstaged.len(), 1);
        assert_eq!(set.staged[0].path, set.unstaged[0].path);
        assert!(set.staged[0].staged);
        assert!(!set.unstaged[0].staged);
    }

    #[test]
    fn parse_untracked() {
        let set = parse_porcelain("?? notes.md\n");
        assert!(set.staged.is_empty());
        assert_eq!(set.unstaged[0].status, StatusCode::Untracked);
    }

    #[test]
    fn parse_rename_keeps_new_path() {
        let set = parse_porcelain("R  old.txt -> new.txt\n");
        assert_eq!(set.staged.len(), 1);
        assert_eq!(set.staged[0].path, "new.txt");
        assert_eq!(set.staged[0].status, StatusCode::Renamed);
    }

    #[test]
    fn parse_conflict_is_single_unstaged_entry() {
        let set = parse_porcelain("UU merged.rs\n");
        assert!(set.staged.is_empty());
        assert_eq!(set.unstaged.len(), 1);
        assert_eq!(set.unstaged[0].status, StatusCode::Conflicted);

        let set = parse_porcelain("AA both-added.rs\n");
        assert_eq!(set.unstaged[0].status, StatusCode::Conflicted);
    }

    #[test]
    fn parse_quoted_path() {
        let set = parse_porcelain(" M \"with space.txt\"\n");
        assert_eq!(set.unstaged[0].path, "with space.txt");
    }

    #[test]
    fn parse_preserves_source_order() {
        let set = parse_porcelain(" M b.txt\n M a.txt\nM  z.txt\nM  c.txt\n");
        let unstaged: Vec<_> = set.unstaged.iter().map(|c| c.path.as_str()).collect();
        let staged: Vec<_> = set.staged.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(unstaged, vec!["b.txt", "a.txt"]);
        assert_eq!(staged, vec!["z.txt", "c.txt"]);
    }

    #[test]
    fn parse_empty_output() {
        assert!(parse_porcelain("").is_empty());
        assert!(parse_porcelain("\n").is_empty());
    }

    #[test]
    fn parse_ignores_malformed_lines() {
        let set = parse_porcelain("M\nxx\n");
        assert!(set.is_empty());
    }
}
