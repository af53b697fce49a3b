//! cip-e2e - end-to-end tests for the container image promoter
//!
//! Runs a suite of promotion tests against live registries. Each test clears
//! the registries it names, checks their snapshots, promotes a manifest for
//! real and checks the snapshots again.
//!
//! ## Flags
//!
//! - `-tests`: the e2e suite (YAML) to load
//! - `-repo-root`: checkout of the promoter repository
//! - `-key-file`: service account key to activate before the first test
//!
//! Single-dash long flags (`-tests=...`) are accepted alongside `--tests=...`.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tracing::{error, info, Level};

use cip_e2e_core::{version, HarnessError};
use cip_e2e_runner::{
    HarnessConfig, Orchestrator, SuiteFailure, SuiteReport, SystemExecutor, TestOutcome,
    ToolPaths,
};

/// Exit status when a snapshot did not match its expectation.
const EXIT_MISMATCH: u8 = 1;

/// Exit status for every other failure.
const EXIT_FAILURE: u8 = 255;

#[derive(Parser, Debug)]
#[command(name = "cip-e2e")]
#[command(version = version::GIT_DESCRIBE)]
#[command(about = "End-to-end tests for the container image promoter", long_about = None)]
struct Cli {
    /// The e2e suite (YAML) to load (REQUIRED)
    #[arg(long)]
    tests: Option<PathBuf>,

    /// Absolute path to the promoter repository (REQUIRED)
    #[arg(long)]
    repo_root: Option<PathBuf>,

    /// JSON key file of the service account to activate before testing
    #[arg(long)]
    key_file: Option<PathBuf>,

    /// Kill any external command running longer than this; 0 waits forever
    #[arg(long, env = "CIP_E2E_COMMAND_TIMEOUT_SECS", default_value_t = 0)]
    command_timeout_secs: u64,

    /// Build tool used for the promoter and the golden image
    #[arg(long, env = "CIP_E2E_BAZEL", default_value = "bazel")]
    bazel: String,

    /// Tool used to assemble the golden manifest list
    #[arg(long, env = "CIP_E2E_DOCKER", default_value = "docker")]
    docker: String,

    /// Tool used for authentication and registry cleanup
    #[arg(long, env = "CIP_E2E_GCLOUD", default_value = "gcloud")]
    gcloud: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn tools(&self) -> ToolPaths {
        ToolPaths {
            bazel: self.bazel.clone(),
            docker: self.docker.clone(),
            gcloud: self.gcloud.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = normalize_flags(std::env::args_os());
    if args.len() <= 1 {
        print!("{}", version::banner());
        eprintln!("{}", Cli::command().render_help());
        return ExitCode::SUCCESS;
    }

    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_FAILURE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    cip_e2e_core::init_tracing(cli.json, level);

    match run(cli).await {
        Ok(report) => {
            print_passed(&report.tests);
            println!(
                "All {} e2e tests passed in {}ms (run {})",
                report.tests.len(),
                report.duration_ms,
                report.run_id
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            if let Some(failure) = err.downcast_ref::<SuiteFailure>() {
                print_passed(&failure.passed);
                if failure.is_mismatch() {
                    println!("{}", failure.error);
                }
            }
            error!(error = %format!("{err:#}"), "e2e run failed");
            ExitCode::from(exit_code(&err))
        }
    }
}

async fn run(cli: Cli) -> Result<SuiteReport> {
    let tools = cli.tools();
    let tests = cli
        .tests
        .ok_or_else(|| HarnessError::Config("-tests=... flag is required".to_string()))?;
    let repo_root = cli
        .repo_root
        .ok_or_else(|| HarnessError::Config("-repo-root=... flag is required".to_string()))?;
    let pwd = working_dir()?;

    let config = HarnessConfig::new(repo_root, pwd)
        .with_tools(tools)
        .with_timeout_secs(cli.command_timeout_secs);
    let executor = Arc::new(SystemExecutor::with_timeout(config.command_timeout));
    let orchestrator = Orchestrator::new(executor, config);
    info!(run_id = %orchestrator.run_id(), tests = %tests.display(), "starting e2e run");

    let suite = orchestrator.load(&tests)?;
    if let Some(key_file) = &cli.key_file {
        orchestrator.authenticate(key_file).await?;
    }
    Ok(orchestrator.run_suite(&suite).await?)
}

/// Directory holding `workspace_status.sh`: `$PWD`, else the process cwd.
fn working_dir() -> Result<PathBuf> {
    match std::env::var_os("PWD") {
        Some(pwd) if !pwd.is_empty() => Ok(PathBuf::from(pwd)),
        _ => std::env::current_dir().context("could not determine the working directory"),
    }
}

fn print_passed(tests: &[TestOutcome]) {
    for test in tests {
        println!("e2e test '{}': OK", test.name);
    }
}

fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<SuiteFailure>() {
        Some(failure) if failure.is_mismatch() => EXIT_MISMATCH,
        _ => EXIT_FAILURE,
    }
}

/// Rewrite single-dash long flags (`-tests=x`, `-help`) as `--tests=x`.
///
/// Short flags (`-v`), values and everything after `--` pass through.
fn normalize_flags<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut out = Vec::new();
    let mut passthrough = false;
    for (i, arg) in args.into_iter().enumerate() {
        if i == 0 || passthrough {
            out.push(arg);
            continue;
        }
        let rewritten = match arg.to_str() {
            Some("--") => {
                passthrough = true;
                None
            }
            Some(s) if is_single_dash_long(s) => Some(OsString::from(format!("-{s}"))),
            _ => None,
        };
        out.push(rewritten.unwrap_or(arg));
    }
    out
}

fn is_single_dash_long(arg: &str) -> bool {
    let Some(rest) = arg.strip_prefix('-') else {
        return false;
    };
    let name = rest.split('=').next().unwrap_or_default();
    !rest.starts_with('-') && name.len() > 1 && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}
