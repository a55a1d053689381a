//! `locksmith` — the operator-facing CLI.
//!
//! `locksmith run -- <child> [args...]` preloads the verifier ahead of a
//! child process's threading library and forwards its exit status.
//! `locksmith config` prints the configuration a shim loaded right now
//! would resolve from the current environment.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use locksmith_collab::Config;

/// Environment variable that overrides shim discovery; set this when the
/// `locksmith-shim` cdylib is not installed next to this binary.
const SHIM_PATH_VAR: &str = "LOCKSMITH_SHIM_PATH";

#[derive(Parser)]
#[command(name = "locksmith", about = "Runtime lock-discipline verifier for POSIX threads")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run `child` with the verifier preloaded ahead of its threading library.
    Run {
        /// Explicit path to the locksmith-shim cdylib; defaults to looking
        /// next to this binary, then `LOCKSMITH_SHIM_PATH`.
        #[arg(long)]
        shim: Option<PathBuf>,
        /// The child program and its arguments.
        #[arg(last = true, required = true)]
        child: Vec<String>,
    },
    /// Resolve and print the configuration the shim would see right now.
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    match cli.command {
        Cmd::Run { shim, child } => run(shim, child),
        Cmd::Config => print_config(),
    }
}

fn run(shim: Option<PathBuf>, child: Vec<String>) -> Result<()> {
    let Some((program, args)) = child.split_first() else {
        bail!("no child command given; usage: locksmith run -- <child> [args...]");
    };
    let shim_path = shim.or_else(env_shim_path).or_else(default_shim_path).context(
        "could not locate the locksmith-shim cdylib; pass --shim or set LOCKSMITH_SHIM_PATH",
    )?;
    if !shim_path.is_file() {
        bail!("resolved shim path {} does not exist", shim_path.display());
    }

    let mut cmd = Command::new(program);
    cmd.args(args);
    prepend_preload(&mut cmd, &shim_path);
    forward_env(&mut cmd);

    let status = cmd.status().with_context(|| format!("failed to spawn {program:?}"))?;
    std::process::exit(status.code().unwrap_or(1));
}

fn print_config() -> Result<()> {
    let config = Config::from_env();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn env_shim_path() -> Option<PathBuf> {
    std::env::var_os(SHIM_PATH_VAR).map(PathBuf::from)
}

fn default_shim_path() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let dir = exe.parent()?;
    Some(dir.join(shim_file_name()))
}

#[cfg(target_os = "macos")]
fn shim_file_name() -> &'static str {
    "liblocksmith_shim.dylib"
}

#[cfg(all(unix, not(target_os = "macos")))]
fn shim_file_name() -> &'static str {
    "liblocksmith_shim.so"
}

#[cfg(windows)]
fn shim_file_name() -> &'static str {
    "locksmith_shim.dll"
}

#[cfg(target_os = "macos")]
fn prepend_preload(cmd: &mut Command, shim_path: &Path) {
    cmd.env("DYLD_INSERT_LIBRARIES", shim_path);
}

#[cfg(all(unix, not(target_os = "macos")))]
fn prepend_preload(cmd: &mut Command, shim_path: &Path) {
    cmd.env("LD_PRELOAD", shim_path);
}

#[cfg(windows)]
fn prepend_preload(_cmd: &mut Command, _shim_path: &Path) {
    // No preload-style injection on this platform; left for a future
    // AppInit_DLLs-based shim loader.
}

fn forward_env(cmd: &mut Command) {
    for (key, value) in std::env::vars_os() {
        if key.to_string_lossy().starts_with("LKSMITH_") {
            cmd.env(key, value);
        }
    }
}
