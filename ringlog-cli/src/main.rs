//! CLI for the ringlog shared ring-buffer log.
//!
//! Provides commands for writing to, exporting, tailing and inspecting
//! ringlog files.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use ringlog::{CAPACITY, Cursor, LINE_CAPACITY, SCHEMA_VERSION, Store, export, follow};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// ringlog: shared memory-mapped ring-buffer log CLI.
#[derive(Parser)]
#[command(name = "ringlog", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Append one line to a log, creating the log if needed.
    Write {
        /// Path to the log file.
        #[arg(env = "RINGLOG_PATH")]
        path: PathBuf,

        /// Tag stored in front of the message.
        #[arg(long, default_value = "CLI")]
        tag: String,

        /// Message text; multiple words are joined with spaces.
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },

    /// Merge one or more existing logs by timestamp and print them as text.
    Export {
        /// Logs to export, as `PATH` or `PATH=LABEL`.
        #[arg(required = true, num_args = 1.., value_parser = parse_source)]
        sources: Vec<Source>,

        /// Destination file; `-` or omitted writes to stdout.
        #[arg(long, short)]
        out: Option<PathBuf>,
    },

    /// Print lines as they are appended to an existing log.
    Follow {
        /// Path to the log file.
        #[arg(env = "RINGLOG_PATH")]
        path: PathBuf,

        /// Poll interval in milliseconds.
        #[arg(long, default_value = "100")]
        interval_ms: u64,

        /// JSON file the follow position is loaded from and saved to.
        #[arg(long)]
        cursor_file: Option<PathBuf>,

        /// Poll once and exit.
        #[arg(long)]
        once: bool,
    },

    /// Display log layout and fill level. Never creates or resets the file.
    Info {
        /// Path to the log file.
        #[arg(env = "RINGLOG_PATH")]
        path: PathBuf,

        /// Output format.
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Output format for `info`.
#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable text.
    Text,
    /// A single JSON object.
    Json,
}

/// One export source given on the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Source {
    path: PathBuf,
    label: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Write { path, tag, message } => cmd_write(&path, &tag, &message.join(" ")),
        Commands::Export { sources, out } => cmd_export(&sources, out.as_deref()),
        Commands::Follow {
            path,
            interval_ms,
            cursor_file,
            once,
        } => cmd_follow(&path, interval_ms, cursor_file.as_deref(), once),
        Commands::Info { path, format } => cmd_info(&path, &format),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Implements `ringlog write <path> <message...>`.
fn cmd_write(path: &Path, tag: &str, message: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open(path)?;
    if store.was_reinitialized() {
        debug!(path = %path.display(), "started a new log");
    }
    store.append(tag, message);
    store.close();
    Ok(())
}

/// Implements `ringlog export <path[=label]>...`.
fn cmd_export(sources: &[Source], out: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let stores = sources
        .iter()
        .map(|source| Store::open_existing(&source.path))
        .collect::<Result<Vec<_>, _>>()?;
    let labelled: Vec<_> = stores
        .iter()
        .zip(sources)
        .map(|(store, source)| (store, source.label.as_str()))
        .collect();

    match out {
        Some(path) if path != Path::new("-") => {
            let written = export::export_to_path(&labelled, path)?;
            eprintln!("Exported {written} lines to {}", path.display());
        }
        _ => {
            export::export_to_writer(&labelled, io::stdout().lock())?;
        }
    }
    Ok(())
}

/// Implements `ringlog follow <path>`.
fn cmd_follow(
    path: &Path,
    interval_ms: u64,
    cursor_file: Option<&Path>,
    once: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open_existing(path)?;
    let mut cursor = match cursor_file {
        Some(file) => Cursor::load_or_tail(file)?,
        None => Cursor::Tail,
    };
    let interval = Duration::from_millis(interval_ms);

    loop {
        let batch = follow(&store, cursor);
        if batch.lapped() {
            warn!(skipped = batch.skipped, "follower fell behind, lines were lost");
        }

        if !batch.entries.is_empty() {
            let mut stdout = io::stdout().lock();
            for line in &batch.entries {
                writeln!(stdout, "{}", line.render(None))?;
            }
            stdout.flush()?;
        }

        if batch.cursor != cursor
            && let Some(file) = cursor_file
        {
            batch.cursor.save(file)?;
        }
        cursor = batch.cursor;

        if once {
            return Ok(());
        }
        thread::sleep(interval);
    }
}

/// Implements `ringlog info <path>`.
fn cmd_info(path: &Path, format: &OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open_existing(path)?;
    let snapshot = store.snapshot();
    let file_size = std::fs::metadata(path)?.len();

    let oldest = snapshot.iter().next();
    let newest = snapshot.iter().last();

    match format {
        OutputFormat::Text => {
            println!("Log: {}", path.display());
            println!("  Schema version: {SCHEMA_VERSION}");
            println!("  Capacity: {CAPACITY} lines of {LINE_CAPACITY} bytes");
            println!("  File size: {} ({file_size} bytes)", format_bytes(file_size));
            println!("  Appends since init: {}", snapshot.next_index());
            println!("  Live lines: {}", snapshot.live_len());
            if let (Some(oldest), Some(newest)) = (oldest, newest) {
                println!("  Oldest: {}", oldest.render(None));
                println!("  Newest: {}", newest.render(None));
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "path": path.display().to_string(),
                "schema_version": SCHEMA_VERSION,
                "capacity": CAPACITY,
                "line_capacity": LINE_CAPACITY,
                "file_size": file_size,
                "next_index": snapshot.next_index(),
                "live_lines": snapshot.live_len(),
                "oldest_ns": oldest.map(|line| line.timestamp_ns()),
                "newest_ns": newest.map(|line| line.timestamp_ns()),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Parses `PATH` or `PATH=LABEL`. Without a label the file stem is used.
fn parse_source(arg: &str) -> Result<Source, String> {
    let (path, label) = match arg.rsplit_once('=') {
        Some((path, label)) if !path.is_empty() && !label.is_empty() => (path, Some(label)),
        Some(_) => return Err(format!("expected PATH or PATH=LABEL, got '{arg}'")),
        None => (arg, None),
    };

    let path = PathBuf::from(path);
    let label = match label {
        Some(label) => label.to_string(),
        None => path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .ok_or_else(|| format!("cannot derive a label from '{arg}'"))?,
    };
    Ok(Source { path, label })
}

/// Formats a byte count as a human-readable string.
#[allow(clippy::cast_precision_loss)] // Byte counts are display-only
fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_048_576 {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_source_with_label() {
        let source = parse_source("/var/log/net.log=NET").unwrap();
        assert_eq!(source.path, PathBuf::from("/var/log/net.log"));
        assert_eq!(source.label, "NET");
    }

    #[test]
    fn test_parse_source_defaults_to_file_stem() {
        let source = parse_source("/var/log/tunnel.log").unwrap();
        assert_eq!(source.label, "tunnel");
    }

    #[test]
    fn test_parse_source_rejects_empty_parts() {
        assert!(parse_source("=NET").is_err());
        assert!(parse_source("/var/log/net.log=").is_err());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(1_065_024), "1.0 MB");
    }

    #[test]
    fn test_cli_parses_commands() {
        let args = ["ringlog", "write", "/tmp/a.log", "--tag", "APP", "hello", "world"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Write { path, tag, message } => {
                assert_eq!(path, PathBuf::from("/tmp/a.log"));
                assert_eq!(tag, "APP");
                assert_eq!(message, vec!["hello", "world"]);
            }
            _ => panic!("expected write command"),
        }

        let args = ["ringlog", "export", "a.log=APP", "b.log", "--out", "-"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Export { sources, out } => {
                assert_eq!(sources.len(), 2);
                assert_eq!(sources[1].label, "b");
                assert_eq!(out, Some(PathBuf::from("-")));
            }
            _ => panic!("expected export command"),
        }
    }

    #[test]
    fn test_write_then_export_to_file() {
        let temp_dir = tempdir().unwrap();
        let log = temp_dir.path().join("app.log");
        let out = temp_dir.path().join("out.txt");

        cmd_write(&log, "APP", "first").unwrap();
        cmd_write(&log, "APP", "second").unwrap();

        let sources = vec![Source {
            path: log,
            label: "app".to_string(),
        }];
        cmd_export(&sources, Some(&out)).unwrap();

        let contents = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(": [APP] first"));
        assert!(lines[1].ends_with(": [APP] second"));
    }

    #[test]
    fn test_follow_once_saves_cursor() {
        let temp_dir = tempdir().unwrap();
        let log = temp_dir.path().join("app.log");
        let cursor_file = temp_dir.path().join("cursor.json");

        cmd_write(&log, "APP", "before").unwrap();
        cmd_follow(&log, 1, Some(&cursor_file), true).unwrap();

        assert_eq!(Cursor::load_or_tail(&cursor_file).unwrap(), Cursor::At(1));
    }

    #[test]
    fn test_read_commands_leave_foreign_file_alone() {
        let temp_dir = tempdir().unwrap();
        let notes = temp_dir.path().join("notes.txt");
        std::fs::write(&notes, "precious user data\n").unwrap();

        assert!(cmd_info(&notes, &OutputFormat::Text).is_err());
        assert!(cmd_follow(&notes, 1, None, true).is_err());
        let sources = vec![Source {
            path: notes.clone(),
            label: "notes".to_string(),
        }];
        assert!(cmd_export(&sources, Some(&temp_dir.path().join("out.txt"))).is_err());

        assert_eq!(std::fs::read_to_string(&notes).unwrap(), "precious user data\n");
    }

    #[test]
    fn test_read_commands_do_not_create_missing_log() {
        let temp_dir = tempdir().unwrap();
        let missing = temp_dir.path().join("typo.log");

        let sources = vec![Source {
            path: missing.clone(),
            label: "typo".to_string(),
        }];
        let err = cmd_export(&sources, Some(&temp_dir.path().join("out.txt"))).unwrap_err();
        assert!(err.to_string().contains("failed to access log file"));
        assert!(cmd_info(&missing, &OutputFormat::Json).is_err());
        assert!(cmd_follow(&missing, 1, None, true).is_err());

        assert!(!missing.exists());
    }
}
