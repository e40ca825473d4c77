pub mod cli;
pub mod git;
pub mod highlight;
pub mod picker;
pub mod tui;

/// Kind of pending change, as reported by `git status --porcelain`.
///
/// Staged entries use the index column (M/A/D/R/C), unstaged entries the
/// worktree column (M/D), plus the untracked/ignored/conflict markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Modified,
    Added,
    Deleted,
    Renamed,
    Copied,
    Untracked,
    Ignored,
    Conflicted,
}

impl StatusCode {
    /// Single-character symbol shown next to the file name.
    pub fn symbol(self) -> char {
        match self {
            StatusCode::Modified => 'M',
            StatusCode::Added => 'A',
            StatusCode::Deleted => 'D',
            StatusCode::Renamed => 'R',
            StatusCode::Copied => 'C',
            StatusCode::Untracked => '?',
            StatusCode::Ignored => '!',
            StatusCode::Conflicted => 'U',
        }
    }
}

/// One pending change in the working tree or index.
///
/// Identity is `(path, staged)`: a partially staged file appears once in each
/// partition with the same path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub status: StatusCode,
    pub staged: bool,
}

impl FileChange {
    /// File name component, for the list label.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Directory prefix (with trailing slash), empty for top-level files.
    pub fn dir_prefix(&self) -> &str {
        match self.path.rfind('/') {
            Some(idx) => &self.path[..idx + 1],
            None => "",
        }
    }
}

/// Current change set, partitioned into staged and unstaged entries.
///
/// The two partitions are never mixed and keep the order git emitted them in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub staged: Vec<FileChange>,
    pub unstaged: Vec<FileChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty() && self.unstaged.is_empty()
    }

    pub fn len(&self) -> usize {
        self.staged.len() + self.unstaged.len()
    }
}
