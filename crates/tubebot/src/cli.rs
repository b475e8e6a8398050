use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tubebot")]
#[command(author, version, about = "Telegram bot that downloads YouTube videos and sends them back", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Run the bot (default)
    Run,

    /// Download one video without Telegram
    Download {
        /// Video URL
        url: String,

        /// Resolution, e.g. 720p (default: configured default resolution)
        #[arg(short, long)]
        quality: Option<String>,

        /// Output directory (default: current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check a batch file and print what would be downloaded
    CheckBatch {
        /// Text file with one link per line
        file: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_no_command_defaults_to_none() {
        let cli = Cli::try_parse_from(["tubebot"]).unwrap();
        assert_eq!(cli.command, None);
    }

    #[test]
    fn test_download_arguments() {
        let cli = Cli::try_parse_from(["tubebot", "download", "https://youtu.be/abc", "-q", "480p", "-o", "/tmp/out"])
            .unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Download {
                url: "https://youtu.be/abc".to_string(),
                quality: Some("480p".to_string()),
                output: Some(PathBuf::from("/tmp/out")),
            })
        );
    }

    #[test]
    fn test_check_batch_requires_file() {
        assert!(Cli::try_parse_from(["tubebot", "check-batch"]).is_err());
        let cli = Cli::try_parse_from(["tubebot", "check-batch", "links.txt"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::CheckBatch {
                file: PathBuf::from("links.txt")
            })
        );
    }
}
