mod diff;
mod error;
mod fetch;
mod fs;
mod script;

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use docbridge_config::{Config, LoadOptions};
use docbridge_core::{ErrorKind, MemoryDocument, OperationResult, Session};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::diff::diff_document;
use crate::fetch::HttpFetcher;
use crate::fs::write_atomic;

const LOG_ENV: &str = "DOCBRIDGE_LOG";

#[derive(Parser, Debug)]
#[command(author, version, about = "Replay document operations against a text document", long_about = None)]
struct Cli {
    /// Plain-text document, one paragraph per line
    #[arg(value_name = "DOCUMENT")]
    document: PathBuf,

    /// NDJSON operation script (use '-' for stdin, the default)
    #[arg(long, value_name = "PATH", allow_hyphen_values = true)]
    script: Option<PathBuf>,

    /// Explicit configuration file, applied over discovered ones
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Initial selection as character offsets
    #[arg(long, value_name = "START:END", value_parser = parse_selection)]
    select: Option<(usize, usize)>,

    /// Write the edited document back to DOCUMENT
    #[arg(long = "in-place")]
    in_place: bool,

    /// Skip the .bak copy when writing in place
    #[arg(long = "no-backup", requires = "in_place")]
    no_backup: bool,

    /// Print a unified diff of the document to stderr
    #[arg(long)]
    diff: bool,

    /// Log at debug level unless DOCBRIDGE_LOG says otherwise
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Do not print result lines
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(ErrorKind::Runtime.exit_code())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let mut options = LoadOptions::default();
    if let Some(path) = &cli.config {
        options = options.with_override_path(path.clone());
    }
    let config = Config::load(options).context("failed to load configuration")?;
    debug!(layers = config.sources.layers.len(), "configuration loaded");

    let original = std::fs::read_to_string(&cli.document)
        .with_context(|| format!("failed to read {}", cli.document.display()))?;
    let mut document = MemoryDocument::from_text(&original);
    if let Some((start, end)) = cli.select {
        if let Err(err) = document.set_selection(start, end) {
            eprintln!("error: invalid --select {start}:{end}: {}", err.message);
            return Ok(ExitCode::from(err.kind.exit_code()));
        }
    }

    let mut session = Session::new(document).with_settings(config.bridge_settings());
    if config.pictures.allow_remote {
        let timeout = Duration::from_secs(config.pictures.fetch_timeout_secs);
        session = session.with_fetcher(Box::new(HttpFetcher::new(timeout)?));
    }

    let script = read_script(cli.script.as_deref())?;
    let mut last_failure: Option<ErrorKind> = None;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in script::parse(&script) {
        let result = match &line.request {
            Ok(request) => session.dispatch(request),
            Err(err) => OperationResult::failure(err),
        };
        if let Some(kind) = result.code {
            warn!(line = line.number, code = %kind, "operation failed");
            last_failure = Some(kind);
        }
        if !cli.quiet {
            let encoded = serde_json::to_string(&result).context("failed to encode result")?;
            writeln!(out, "{encoded}").context("failed to write result")?;
        }
    }
    out.flush().context("failed to flush results")?;

    let document = session.close();
    let modified = render(&document, &original);

    if cli.diff {
        let label = cli.document.display().to_string();
        if let Some(diff) = diff_document(&original, &modified, &label) {
            debug!(paragraphs = diff.changed_paragraphs, "document changed");
            eprint!("{}", diff.unified);
        }
    }

    if cli.in_place && modified != original {
        write_atomic(&cli.document, &modified, !cli.no_backup)?;
    }

    Ok(last_failure.map_or(ExitCode::SUCCESS, |kind| ExitCode::from(kind.exit_code())))
}

fn read_script(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display())),
        _ => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read script from stdin")?;
            Ok(buffer)
        }
    }
}

/// Document text as it would be saved, keeping the original trailing newline.
fn render(document: &MemoryDocument, original: &str) -> String {
    let mut text = document.plain_text();
    if original.ends_with('\n') && !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

fn parse_selection(value: &str) -> Result<(usize, usize), String> {
    let (start, end) = value
        .split_once(':')
        .ok_or_else(|| format!("expected START:END, got '{value}'"))?;
    let start = start
        .trim()
        .parse::<usize>()
        .map_err(|err| format!("invalid start '{start}': {err}"))?;
    let end = end
        .trim()
        .parse::<usize>()
        .map_err(|err| format!("invalid end '{end}': {err}"))?;
    if end < start {
        return Err(format!("selection end {end} is before start {start}"));
    }
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_selection_offsets() {
        assert_eq!(parse_selection("3:7"), Ok((3, 7)));
        assert_eq!(parse_selection("0:0"), Ok((0, 0)));
        assert!(parse_selection("7:3").is_err());
        assert!(parse_selection("7").is_err());
        assert!(parse_selection("a:b").is_err());
    }

    #[test]
    fn render_keeps_trailing_newline() {
        let document = MemoryDocument::from_text("one\ntwo\n");
        assert_eq!(render(&document, "one\ntwo\n"), "one\ntwo\n");
        assert_eq!(render(&document, "one\ntwo"), "one\ntwo");
    }
}
