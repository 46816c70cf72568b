use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "vidseek",
    about = "Keyword search over the spoken words of a video folder"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Select the active video folder and load its index
    Open {
        /// Folder containing the videos
        folder: PathBuf,
    },
    /// Transcribe and index the videos of the active folder
    Build(BuildArgs),
    /// Clear the index and rebuild it from scratch
    Rebuild(FolderArgs),
    /// Search the index of the active folder
    Search(SearchArgs),
    /// List every indexed word
    Words(WordsArgs),
    /// Play a clip from the results of a search
    Play(PlayArgs),
    /// Translate a piece of text with the configured translator
    Translate {
        /// Text to translate
        text: String,
    },
    /// Show the active folder and index statistics
    Status(StatusArgs),
    /// Read and write settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Start an interactive session
    Shell(FolderArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Build --

#[derive(Debug, Parser)]
pub struct FolderArgs {
    /// Use this folder instead of the active one
    #[arg(short, long)]
    pub folder: Option<PathBuf>,
}

#[derive(Debug, Parser)]
pub struct BuildArgs {
    /// Discard the existing index before building
    #[arg(long)]
    pub rebuild: bool,

    #[command(flatten)]
    pub folder: FolderArgs,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search query
    pub query: String,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub folder: FolderArgs,
}

#[derive(Debug, Parser)]
pub struct WordsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub folder: FolderArgs,
}

// -- Play --

#[derive(Debug, Parser)]
pub struct PlayArgs {
    /// The search query
    pub query: String,

    /// 1-based position in the result list
    pub position: usize,

    /// Do not translate the segment text
    #[arg(long)]
    pub no_translate: bool,

    #[command(flatten)]
    pub folder: FolderArgs,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Config --

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the value of a setting
    Get {
        /// Setting name
        key: String,
    },
    /// Store a setting
    Set {
        /// Setting name
        key: String,
        /// New value
        value: String,
    },
    /// Remove a stored setting (revert to default)
    Unset {
        /// Setting name
        key: String,
    },
    /// List all settings with their effective values
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "vidseek",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn parse_build_defaults() {
        let cli = Cli::parse_from(["vidseek", "build"]);
        match cli.command {
            Command::Build(args) => {
                assert!(!args.rebuild);
                assert!(args.folder.folder.is_none());
            }
            _ => panic!("expected build command"),
        }
    }

    #[test]
    fn parse_play_position() {
        let cli = Cli::parse_from([
            "vidseek",
            "play",
            "hello world",
            "3",
            "--no-translate",
            "--folder",
            "/videos",
        ]);
        match cli.command {
            Command::Play(args) => {
                assert_eq!(args.query, "hello world");
                assert_eq!(args.position, 3);
                assert!(args.no_translate);
                assert_eq!(args.folder.folder, Some(PathBuf::from("/videos")));
            }
            _ => panic!("expected play command"),
        }
    }

    #[test]
    fn quiet_and_verbose_conflict() {
        assert!(Cli::try_parse_from(["vidseek", "-q", "-v", "status"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli =
            Cli::parse_from(["vidseek", "search", "hi", "--json", "-vv"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Search(args) => assert!(args.json),
            _ => panic!("expected search command"),
        }
    }
}
