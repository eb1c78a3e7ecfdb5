//! keepfetch CLI - command-line front end for the keepfetch library.
//!
//! Parses flags, merges them over the config file, installs logging and runs
//! one download session with an interactive (or external) captcha solver.

mod error;
mod progress;
mod solver;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use keepfetch::api::ReqwestHostingApi;
use keepfetch::captcha::{CaptchaSolver, CommandSolver};
use keepfetch::config::{parse_size, ConfigFile, SessionConfig};
use keepfetch::logging::{init_logging, LoggingConfig};
use keepfetch::session::Session;

use crate::error::CliError;
use crate::solver::PromptSolver;

/// Default log level for the CLI; the progress bar carries the detail.
const DEFAULT_CLI_LOG_LEVEL: &str = "warn";

#[derive(Parser, Debug)]
#[command(
    name = "keepfetch",
    version,
    about = "Resumable segmented downloads from captcha-gated file hosts"
)]
struct Args {
    /// Share link (https://k2s.cc/file/<id>) or bare file id.
    url: String,

    /// Output file name (defaults to the name reported by the host).
    #[arg(short, long)]
    filename: Option<PathBuf>,

    /// Chunk size, e.g. 20MB or 512KB.
    #[arg(short, long, value_parser = parse_size_arg)]
    split_size: Option<u64>,

    /// Concurrent chunk transfers (also the number of URLs requested).
    #[arg(short, long)]
    threads: Option<usize>,

    /// Connect directly instead of through validated proxies.
    #[arg(long)]
    no_proxy: bool,

    /// Re-validate the proxy list before starting.
    #[arg(long)]
    refresh: bool,

    /// External program that prints the captcha answer for an image path.
    #[arg(long)]
    solver_command: Option<String>,

    /// Configuration file (defaults to the platform config directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

fn parse_size_arg(s: &str) -> Result<u64, String> {
    match parse_size(s) {
        Ok(0) => Err("size must be greater than zero".to_string()),
        Ok(size) => Ok(size),
        Err(e) => Err(e.to_string()),
    }
}

impl Args {
    /// Layer flags over the file configuration.
    fn session_config(&self, file: &ConfigFile) -> SessionConfig {
        let mut config = file.to_session_config();
        if let Some(name) = &self.filename {
            config = config.with_output(name);
        }
        if let Some(size) = self.split_size {
            config = config.with_chunk_size(size);
        }
        if let Some(threads) = self.threads {
            config = config.with_concurrency(threads);
        }
        if self.no_proxy {
            config = config.with_proxies(false);
        }
        if self.refresh {
            config = config.with_refresh_proxies(true);
        }
        config
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(path) => {
            println!("Download complete: {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<PathBuf, CliError> {
    let file = match &args.config {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };

    let _logging = init_logging(&LoggingConfig {
        directory: file.logging.directory.clone(),
        level: file
            .logging
            .level
            .clone()
            .or_else(|| Some(DEFAULT_CLI_LOG_LEVEL.to_string())),
        verbose: args.verbose,
    })?;

    let config = args.session_config(&file);
    tracing::debug!(?config, "Session configuration");

    let solver: Arc<dyn CaptchaSolver> = match &args.solver_command {
        Some(command) => Arc::new(
            CommandSolver::from_command_line(command, &config.work_dir)
                .ok_or_else(|| CliError::Config("--solver-command is empty".to_string()))?,
        ),
        None => Arc::new(PromptSolver::new(&config.work_dir)),
    };

    let api = Arc::new(ReqwestHostingApi::new(config.request_timeout));
    let bar = progress::create_bar(&args.url);
    let session = Session::new(config, api, solver).with_progress(progress::callback(bar.clone()));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let result = runtime.block_on(session.run(&args.url));
    bar.finish_and_clear();

    let outcome = result?;
    tracing::info!(
        sha256 = %outcome.assembly.sha256,
        bytes = outcome.assembly.bytes,
        "Download finished"
    );
    Ok(outcome.assembly.path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = Args::try_parse_from([
            "keepfetch",
            "https://k2s.cc/file/abc",
            "--split-size",
            "5MB",
            "--threads",
            "8",
            "--no-proxy",
            "--refresh",
            "-f",
            "out.bin",
        ])
        .unwrap();

        let config = args.session_config(&ConfigFile::default());

        assert_eq!(config.chunk_size, 5 * 1024 * 1024);
        assert_eq!(config.concurrency, 8);
        assert!(!config.use_proxies);
        assert!(config.refresh_proxies);
        assert_eq!(config.output, Some(PathBuf::from("out.bin")));
    }

    #[test]
    fn test_defaults_come_from_config() {
        let args = Args::try_parse_from(["keepfetch", "abc"]).unwrap();
        let config = args.session_config(&ConfigFile::default());

        assert_eq!(config.chunk_size, 20 * 1024 * 1024);
        assert_eq!(config.concurrency, 5);
        assert!(config.use_proxies);
        assert!(config.output.is_none());
    }

    #[test]
    fn test_rejects_bad_split_size() {
        assert!(Args::try_parse_from(["keepfetch", "abc", "--split-size", "lots"]).is_err());
        assert!(Args::try_parse_from(["keepfetch", "abc", "--split-size", "0"]).is_err());
    }
}
