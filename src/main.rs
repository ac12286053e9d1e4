//! Main entry point for the zipsplice CLI application.
//!
//! This binary provides a command-line interface for creating, splicing,
//! listing and extracting ZIP archives.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::{Path, PathBuf};

use zipsplice::cli::Command;
use zipsplice::zip::{AppendEntry, ArchiveSplicer, EntrySource};
use zipsplice::{
    ArchiveOutcome, Cli, LocalFileReader, ZipExtractor, ZipFileEntry, create_or_append_entries,
    extract_archive,
};

/// Application entry point.
///
/// Initializes logging from `RUST_LOG`, parses command-line arguments and
/// dispatches to the handler for the chosen subcommand.
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match &cli.command {
        Command::Add {
            archive,
            sources,
            entries,
            timestamp,
        } => add(&cli, archive, sources, entries, *timestamp),
        Command::Extract {
            archive,
            extract_dir,
        } => extract(&cli, archive, extract_dir),
        Command::List {
            archive,
            verbose,
            local,
        } => list(archive, *verbose, *local),
        Command::Check { archive } => {
            if !zipsplice::is_archive(archive) {
                bail!("{} is not a ZIP archive", archive.display());
            }
            if !cli.is_quiet() {
                println!("{}: ok", archive.display());
            }
            Ok(())
        }
    }
}

/// Create `archive` from `sources`, or splice into it when it already exists.
///
/// Explicit `--entry` pairs follow the positional sources under their own names.
fn add(
    cli: &Cli,
    archive: &Path,
    sources: &[PathBuf],
    named: &[(String, PathBuf)],
    timestamp: Option<u32>,
) -> Result<()> {
    if sources.is_empty() && named.is_empty() {
        bail!("nothing to add");
    }

    let named: Vec<_> = named
        .iter()
        .map(|(name, path)| AppendEntry::new(name.clone(), EntrySource::Path(path.clone())))
        .collect();

    let mut splicer = ArchiveSplicer::new();
    if let Some(secs) = timestamp {
        splicer = splicer.with_timestamp(secs);
    }

    let outcome = create_or_append_entries(archive, sources, &named, &splicer)
        .with_context(|| format!("failed to add to {}", archive.display()))?;

    if cli.is_quiet() {
        return Ok(());
    }
    match outcome {
        ArchiveOutcome::Created => println!("  created: {}", archive.display()),
        ArchiveOutcome::Appended(report) => {
            for name in &report.appended {
                println!("  spliced: {name}");
            }
            for path in &report.skipped {
                eprintln!("Skipping: {} (unreadable)", path.display());
            }
            if !cli.is_very_quiet() {
                println!(
                    "\nInserted {} above the central directory (now at {:#x})",
                    format_size(report.inserted_len as u64),
                    report.cd_offset
                );
            }
        }
    }
    Ok(())
}

/// Extract every entry into `extract_dir`.
fn extract(cli: &Cli, archive: &Path, extract_dir: &Path) -> Result<()> {
    let written = extract_archive(archive, extract_dir)
        .with_context(|| format!("failed to extract {}", archive.display()))?;

    if !cli.is_quiet() {
        for path in &written {
            println!("  inflated: {}", path.display());
        }
    }
    Ok(())
}

/// List files in the ZIP archive.
///
/// Supports two output formats:
/// - Simple format: Just file names, one per line
/// - Verbose format (`-v`): Detailed table with size, compression ratio, and timestamps
///
/// With `local`, entries come from walking local headers, which includes
/// spliced entries the central directory does not index.
fn list(archive: &Path, verbose: bool, local: bool) -> Result<()> {
    let reader = LocalFileReader::new(archive)
        .with_context(|| format!("cannot open {}", archive.display()))?;
    let extractor = ZipExtractor::new(reader);
    let entries = if local {
        extractor.parser().local_entries()?
    } else {
        extractor.list_files()?
    };

    if verbose {
        print_table(&entries);
    } else {
        for entry in &entries {
            println!("{}", entry.file_name);
        }
    }
    Ok(())
}

fn print_table(entries: &[ZipFileEntry]) {
    println!(
        "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
        "Length", "Size", "Cmpr", "Date", "Time"
    );
    println!("{}", "-".repeat(70));

    // Track totals for summary line
    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in entries {
        let (year, month, day) = entry.mod_date();
        let (hour, minute, _second) = entry.mod_time();

        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            entry.uncompressed_size,
            entry.compressed_size,
            ratio(entry.compressed_size, entry.uncompressed_size),
            year,
            month,
            day,
            hour,
            minute,
            entry.file_name
        );

        if !entry.is_directory {
            total_uncompressed += entry.uncompressed_size;
            total_compressed += entry.compressed_size;
            file_count += 1;
        }
    }

    println!("{}", "-".repeat(70));
    println!(
        "{:>10}  {:>10}  {}  {:>21}  {} files",
        total_uncompressed,
        total_compressed,
        ratio(total_compressed, total_uncompressed),
        "",
        file_count
    );
}

/// Compression ratio as percentage saved. Deflate can grow tiny inputs.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 && compressed <= uncompressed {
        format!("{:>4}%", 100 - (compressed * 100 / uncompressed))
    } else {
        "  0%".to_string()
    }
}

/// Format a byte size into a human-readable string.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(format_size(500), "500 bytes");
/// assert_eq!(format_size(1536), "1.50 KB");
/// assert_eq!(format_size(1048576), "1.00 MB");
/// ```
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
