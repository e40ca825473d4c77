use anyhow::{Result, bail};
use std::time::Duration;

use git_stage_picker::ChangeSet;
use git_stage_picker::cli::{self, Commands};
use git_stage_picker::git::{ChangeSource, GitChangeSource};
use git_stage_picker::picker::{Picker, PickerError};
use git_stage_picker::tui::run_tui;

fn main() -> Result<()> {
    let args = cli::parse_args();
    let mut source = GitChangeSource::discover()?;

    match args.command {
        None => {
            let debounce = Duration::from_millis(args.debounce_ms);
            match Picker::open(source, debounce) {
                Ok(picker) => {
                    if let Some(message) = run_tui(picker)? {
                        println!("{}", message);
                    }
                }
                Err(PickerError::NoChanges) => {
                    println!("No changes");
                }
                Err(PickerError::Git(err)) => return Err(err.into()),
            }
        }
        Some(Commands::Status) => {
            let set = source.list_changes()?;
            print_status(&set);
        }
        Some(Commands::Stage(args)) => {
            for path in &args.paths {
                source.stage(path)?;
            }
        }
        Some(Commands::Unstage(args)) => {
            for path in &args.paths {
                source.unstage(path)?;
            }
        }
        Some(Commands::StageAll) => {
            source.stage_all()?;
        }
        Some(Commands::UnstageAll) => {
            source.unstage_all()?;
        }
        Some(Commands::Discard(args)) => {
            if !args.force {
                bail!("discard is irreversible; pass --force to confirm");
            }
            let set = source.list_changes()?;
            for path in &args.paths {
                // honor the untracked/tracked split git itself reports
                let change = set
                    .unstaged
                    .iter()
                    .find(|c| &c.path == path)
                    .cloned()
                    .unwrap_or_else(|| git_stage_picker::FileChange {
                        path: path.clone(),
                        status: git_stage_picker::StatusCode::Modified,
                        staged: false,
                    });
                source.discard(&change)?;
            }
        }
    }

    Ok(())
}

/// Print the grouped change list, mirroring the picker's layout.
fn print_status(set: &ChangeSet) {
    if set.is_empty() {
        println!("No changes");
        return;
    }

    if !set.staged.is_empty() {
        println!("Staged Changes ({}):", set.staged.len());
        for change in &set.staged {
            println!("  {}  {}", change.status.symbol(), change.path);
        }
    }

    if !set.unstaged.is_empty() {
        println!("Changes ({}):", set.unstaged.len());
        for change in &set.unstaged {
            println!("  {}  {}", change.status.symbol(), change.path);
        }
    }
}
