use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "git-stage-picker",
    about = "Interactive picker for staging, unstaging and discarding files"
)]
pub struct Cli {
    /// Debounce window for external refresh, in milliseconds.
    #[arg(long, default_value = "50")]
    pub debounce_ms: u64,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the grouped change list without opening the picker.
    Status,
    /// Stage the given paths.
    Stage(PathArgs),
    /// Unstage the given paths.
    Unstage(PathArgs),
    /// Stage every pending change.
    StageAll,
    /// Unstage everything.
    UnstageAll,
    /// Discard working-tree changes for the given paths (irreversible).
    Discard(DiscardArgs),
}

#[derive(Args, Debug)]
pub struct PathArgs {
    /// Paths relative to the repository root.
    #[arg(required = true)]
    pub paths: Vec<String>,
}

#[derive(Args, Debug)]
pub struct DiscardArgs {
    /// Paths relative to the repository root.
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// Required confirmation: discard cannot be undone.
    #[arg(short, long)]
    pub force: bool,
}

/// Parse CLI arguments.
pub fn parse_args() -> Cli {
    Cli::parse()
}
