use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace). `RUST_LOG` overrides it.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// JSON pipeline configuration. Falls back to BATCHSTITCH_CONFIG, then to
    /// the built-in defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Split an upload into students and write one stitched text file per student.
    #[command(alias = "s")]
    Stitch {
        /// Archives and/or folders making up the upload. Folders are read the
        /// way a browser folder drop reports them.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Directory receiving `<student>.txt` files. Created if missing.
        #[arg(short, long)]
        output: PathBuf,

        /// Language code (e.g. PY, JA, CP). Detected from file names when omitted.
        #[arg(short, long)]
        language: Option<String>,

        /// Show a progress bar on stderr.
        #[arg(long)]
        progress: bool,
    },

    /// Print the language the upload would be stitched as.
    #[command(alias = "d")]
    Detect {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// List the files inside one archive.
    #[command(alias = "l")]
    List {
        /// The archive file to list contents of.
        #[arg(required = true)]
        archive: PathBuf,
    },

    /// Report, for each uploaded archive and for the loose files together,
    /// whether it is a single submission or a batch, and where its root is.
    #[command(alias = "c")]
    Classify {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
}

/// Parses command-line arguments using `clap`.
pub fn run() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stitch_with_globals() {
        let args = Args::try_parse_from([
            "batchstitch", "-vv", "stitch", "batch", "-o", "out", "--language", "PY",
        ])
        .unwrap();
        assert_eq!(args.verbose, 2);
        match args.command {
            Commands::Stitch { inputs, output, language, progress } => {
                assert_eq!(inputs, [PathBuf::from("batch")]);
                assert_eq!(output, PathBuf::from("out"));
                assert_eq!(language.as_deref(), Some("PY"));
                assert!(!progress);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn stitch_requires_output() {
        assert!(Args::try_parse_from(["batchstitch", "stitch", "batch"]).is_err());
    }

    #[test]
    fn config_is_global() {
        let args =
            Args::try_parse_from(["batchstitch", "list", "a.zip", "--config", "c.json"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("c.json")));
    }
}
