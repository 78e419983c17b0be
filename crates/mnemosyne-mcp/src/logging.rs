//! Process-wide log sink.
//!
//! Stdout carries the protocol, so every log line goes to an append-only
//! file instead. The sink is created once from `main` and lives for the rest
//! of the process.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ServerConfig;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed to open log file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid log filter {filter:?}: {message}")]
    Filter { filter: String, message: String },

    #[error("global subscriber already installed: {0}")]
    AlreadyInstalled(String),
}

/// Opens the log file, records the startup banner and installs the global
/// `tracing` subscriber.
pub fn init(config: &ServerConfig) -> Result<(), LogError> {
    let filter = EnvFilter::try_new(&config.log_filter).map_err(|err| LogError::Filter {
        filter: config.log_filter.clone(),
        message: err.to_string(),
    })?;

    let mut file = open_append(&config.log_file)?;
    write_banner(&mut file).map_err(|source| LogError::Open {
        path: config.log_file.clone(),
        source,
    })?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true),
        )
        .try_init()
        .map_err(|err| LogError::AlreadyInstalled(err.to_string()))
}

fn open_append(path: &Path) -> Result<File, LogError> {
    let open = || -> io::Result<File> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        OpenOptions::new().create(true).append(true).open(path)
    };
    open().map_err(|source| LogError::Open {
        path: path.to_path_buf(),
        source,
    })
}

fn write_banner<W: Write>(out: &mut W) -> io::Result<()> {
    let cwd = std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "<unknown>".to_string());
    writeln!(
        out,
        "Server started at {}, on {cwd}",
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    )?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_is_a_single_line() {
        let mut out = Vec::new();
        write_banner(&mut out).expect("banner");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.starts_with("Server started at "), "{text}");
        assert!(text.contains(", on "));
        assert_eq!(text.matches('\n').count(), 1);
    }

    #[test]
    fn log_file_is_appended_not_truncated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("logs").join("server.log");

        for _ in 0..2 {
            let mut file = open_append(&path).expect("open");
            write_banner(&mut file).expect("banner");
        }
        let text = fs::read_to_string(&path).expect("read log");
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn bad_filter_is_rejected_before_touching_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = ServerConfig {
            log_file: dir.path().join("server.log"),
            log_filter: "mnemosyne=notalevel".to_string(),
            ..ServerConfig::default()
        };
        assert!(matches!(init(&config), Err(LogError::Filter { .. })));
        assert!(!config.log_file.exists());
    }
}
