use git_stage_picker::StatusCode;
use git_stage_picker::git::{ChangeSource, GitChangeSource};
use git_stage_picker::picker::{Picker, PickerError, RebuildOutcome};
use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Duration;
use tempfile::TempDir;

fn git_available() -> bool {
    Command::new("git").arg("--version").output().is_ok()
}

fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Create a repository with one committed file, `tracked.txt`.
fn init_repo() -> TempDir {
    let temp = tempfile::tempdir().unwrap();
    let dir = temp.path();
    git(dir, &["init", "-q"]);
    git(dir, &["config", "user.email", "picker@example.com"]);
    git(dir, &["config", "user.name", "Picker Test"]);
    fs::write(dir.join("tracked.txt"), "one\n").unwrap();
    git(dir, &["add", "."]);
    git(dir, &["commit", "-qm", "init"]);
    temp
}

fn source_for(temp: &TempDir) -> GitChangeSource {
    GitChangeSource::new(temp.path().to_path_buf())
}

fn open_picker(temp: &TempDir) -> Picker<GitChangeSource> {
    Picker::open(source_for(temp), Duration::from_millis(50)).unwrap()
}

#[test]
fn open_fails_on_clean_repo() {
    if !git_available() {
        return;
    }
    let temp = init_repo();
    let result = Picker::open(source_for(&temp), Duration::from_millis(50));
    assert!(matches!(result, Err(PickerError::NoChanges)));
}

#[test]
fn toggle_stages_a_real_file() {
    if !git_available() {
        return;
    }
    let temp = init_repo();
    fs::write(temp.path().join("tracked.txt"), "one\ntwo\n").unwrap();

    let mut picker = open_picker(&temp);
    assert_eq!(picker.staged_count(), 0);
    assert_eq!(picker.unstaged_count(), 1);

    assert_eq!(picker.toggle_focused().unwrap(), RebuildOutcome::Open);
    assert_eq!(picker.staged_count(), 1);
    assert_eq!(picker.unstaged_count(), 0);
    assert!(picker.focused_file().unwrap().staged);

    // and back
    assert_eq!(picker.toggle_focused().unwrap(), RebuildOutcome::Open);
    assert_eq!(picker.staged_count(), 0);
    assert_eq!(picker.unstaged_count(), 1);
}

#[test]
fn discarding_last_change_closes_picker() {
    if !git_available() {
        return;
    }
    let temp = init_repo();
    fs::write(temp.path().join("tracked.txt"), "changed\n").unwrap();

    let mut picker = open_picker(&temp);
    assert_eq!(picker.discard_focused().unwrap(), RebuildOutcome::Closed);
    assert!(!picker.is_open());

    let content = fs::read_to_string(temp.path().join("tracked.txt")).unwrap();
    assert_eq!(content, "one\n");
}

#[test]
fn discarding_untracked_file_deletes_it() {
    if !git_available() {
        return;
    }
    let temp = init_repo();
    let new_file = temp.path().join("scratch.txt");
    fs::write(&new_file, "temporary\n").unwrap();

    let mut picker = open_picker(&temp);
    assert_eq!(
        picker.focused_file().unwrap().status,
        StatusCode::Untracked
    );

    assert_eq!(picker.discard_focused().unwrap(), RebuildOutcome::Closed);
    assert!(!new_file.exists());
}

#[test]
fn partially_staged_file_appears_in_both_groups() {
    if !git_available() {
        return;
    }
    let temp = init_repo();
    fs::write(temp.path().join("tracked.txt"), "one\ntwo\n").unwrap();
    git(temp.path(), &["add", "tracked.txt"]);
    fs::write(temp.path().join("tracked.txt"), "one\ntwo\nthree\n").unwrap();

    let picker = open_picker(&temp);
    assert_eq!(picker.staged_count(), 1);
    assert_eq!(picker.unstaged_count(), 1);
}

#[test]
fn fingerprint_tracks_external_mutation() {
    if !git_available() {
        return;
    }
    let temp = init_repo();
    let source = source_for(&temp);
    let clean = source.fingerprint().unwrap();

    fs::write(temp.path().join("tracked.txt"), "changed\n").unwrap();
    let dirty = source.fingerprint().unwrap();
    assert_ne!(clean, dirty);

    // fingerprint is stable while nothing changes
    assert_eq!(dirty, source.fingerprint().unwrap());
}

#[test]
fn diff_preview_shows_added_lines() {
    if !git_available() {
        return;
    }
    let temp = init_repo();
    fs::write(temp.path().join("tracked.txt"), "one\ntwo\n").unwrap();

    let mut source = source_for(&temp);
    let set = source.list_changes().unwrap();
    let diff = source.diff(&set.unstaged[0]).unwrap();
    assert!(diff.contains("+two"));

    // untracked files preview against /dev/null
    fs::write(temp.path().join("fresh.txt"), "hello\n").unwrap();
    let set = source.list_changes().unwrap();
    let untracked = set
        .unstaged
        .iter()
        .find(|c| c.status == StatusCode::Untracked)
        .unwrap();
    let diff = source.diff(untracked).unwrap();
    assert!(diff.contains("+hello"));
}

#[test]
fn stage_all_then_unstage_all_round_trip() {
    if !git_available() {
        return;
    }
    let temp = init_repo();
    fs::write(temp.path().join("tracked.txt"), "changed\n").unwrap();
    fs::write(temp.path().join("extra.txt"), "new\n").unwrap();

    let mut picker = open_picker(&temp);
    assert_eq!(picker.unstaged_count(), 2);

    assert_eq!(picker.stage_all().unwrap(), RebuildOutcome::Open);
    assert_eq!(picker.staged_count(), 2);
    assert_eq!(picker.unstaged_count(), 0);

    assert_eq!(picker.unstage_all().unwrap(), RebuildOutcome::Open);
    assert_eq!(picker.staged_count(), 0);
    assert_eq!(picker.unstaged_count(), 2);
}
