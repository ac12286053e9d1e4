use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "zipsplice")]
#[command(version)]
#[command(about = "Append to finished ZIP archives in place", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipsplice add out.zip src/ README.md      create out.zip, or splice into it if it exists\n  \
  zipsplice add out.zip --entry notes.txt=/tmp/n   splice /tmp/n as notes.txt\n  \
  zipsplice list --local out.zip            show spliced entries too\n\n\
Set RUST_LOG=debug to trace record offsets.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', global = true, action = clap::ArgAction::Count)]
    pub quiet: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an archive, or splice files into an existing one
    Add {
        /// ZIP file path
        #[arg(value_name = "ARCHIVE", env = "ZIPSPLICE_ARCHIVE")]
        archive: PathBuf,

        /// Files or directories to add
        #[arg(value_name = "SOURCES")]
        sources: Vec<PathBuf>,

        /// Splice PATH under NAME instead of its base name
        #[arg(long = "entry", value_name = "NAME=PATH", value_parser = parse_entry)]
        entries: Vec<(String, PathBuf)>,

        /// Unix timestamp to stamp spliced entries with (default: now)
        #[arg(long, value_name = "SECS")]
        timestamp: Option<u32>,
    },

    /// Extract all entries
    Extract {
        /// ZIP file path
        #[arg(value_name = "ARCHIVE", env = "ZIPSPLICE_ARCHIVE")]
        archive: PathBuf,

        /// Extract files into exdir
        #[arg(short = 'd', value_name = "DIR", env = "ZIPSPLICE_DEST", default_value = ".")]
        extract_dir: PathBuf,
    },

    /// List entries
    List {
        /// ZIP file path
        #[arg(value_name = "ARCHIVE", env = "ZIPSPLICE_ARCHIVE")]
        archive: PathBuf,

        /// List verbosely
        #[arg(short = 'v')]
        verbose: bool,

        /// Walk local headers instead of the central directory
        #[arg(long)]
        local: bool,
    },

    /// Exit with success if the file is a ZIP archive
    Check {
        /// ZIP file path
        #[arg(value_name = "ARCHIVE", env = "ZIPSPLICE_ARCHIVE")]
        archive: PathBuf,
    },
}

fn parse_entry(s: &str) -> Result<(String, PathBuf), String> {
    match s.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected NAME=PATH, got `{s}`")),
    }
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }
}
