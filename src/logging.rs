//! Logging setup on top of tracing-subscriber
//!
//! Console logs go to stderr so stdout stays clean for run summaries and
//! listings. An optional log file rotates daily; either sink can emit JSON.
//! `RUST_LOG` still wins for per-module filtering.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::LoggingSettings;
use crate::error::{Error, Result};

/// Crates whose chatter is capped at warn
const QUIET_DEPENDENCIES: &[&str] = &["hyper", "reqwest", "rustls", "h2"];

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

/// Keeps the file writer alive; drop it last to flush buffered lines
pub struct LogGuards {
    pub level: Level,
    _file: Option<WorkerGuard>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sink {
    Console,
    File,
}

pub fn init_logging(settings: &LoggingSettings, verbose: u8, quiet: bool) -> Result<LogGuards> {
    let level = effective_level(&settings.level, verbose, quiet);

    let (file_layer, file_guard) = match settings.file.as_deref() {
        Some(path) => {
            let (writer, guard) = rolling_writer(path, settings.max_files)?;
            (Some(sink_layer(writer, Sink::File, settings.json_format)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter_for(level)?)
        .with(sink_layer(std::io::stderr, Sink::Console, settings.json_format))
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Internal(format!("Failed to initialize logging: {}", e)))?;

    tracing::debug!(%level, file = ?settings.file, json = settings.json_format, "Logging initialized");

    Ok(LogGuards {
        level,
        _file: file_guard,
    })
}

/// `-q` beats `-v`, and either beats the configured level
fn effective_level(configured: &str, verbose: u8, quiet: bool) -> Level {
    match (quiet, verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => configured.parse().unwrap_or(Level::INFO),
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    }
}

fn filter_for(level: Level) -> Result<EnvFilter> {
    let level = level.to_string().to_lowercase();
    let mut directives = vec![format!("workshop_pilot={}", level)];
    directives.extend(QUIET_DEPENDENCIES.iter().map(|name| format!("{}=warn", name)));

    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));
    for text in directives {
        let directive = text
            .parse()
            .map_err(|e| Error::Internal(format!("Invalid log directive '{}': {}", text, e)))?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

/// One formatting layer for either sink.
///
/// Files never get ANSI colours and always carry targets and thread ids, so
/// interleaved persona workers can be told apart.
fn sink_layer<S, W>(writer: W, sink: Sink, json: bool) -> BoxedLayer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let to_file = sink == Sink::File;
    let base = fmt::layer().with_writer(writer);

    match (json, to_file) {
        (true, _) => Box::new(
            base.json()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(to_file)
                .with_line_number(to_file)
                .with_span_events(FmtSpan::CLOSE)
                .with_ansi(false),
        ),
        (false, true) => Box::new(base.with_target(true).with_thread_ids(true).with_ansi(false)),
        (false, false) => Box::new(base.with_target(false).with_ansi(true).compact()),
    }
}

/// Split `dir/pilot.log` into the directory and the rotation prefix
fn split_log_path(log_file: &str) -> (PathBuf, String) {
    let path = Path::new(log_file);
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let prefix = path
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("pilot")
        .to_string();
    (directory, prefix)
}

fn rolling_writer(
    log_file: &str,
    max_files: u32,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let (directory, prefix) = split_log_path(log_file);
    fs::create_dir_all(&directory).map_err(|source| Error::IoWrite {
        path: directory.clone(),
        source,
    })?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .max_log_files(max_files.max(1) as usize)
        .build(&directory)
        .map_err(|e| Error::Internal(format!("Failed to create log file appender: {}", e)))?;

    Ok(tracing_appender::non_blocking(appender))
}
