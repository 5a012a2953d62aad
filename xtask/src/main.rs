//! Build automation for the mysql-pool workspace.
//!
//! Run with `cargo xtask <command>`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use xshell::{cmd, Shell};

/// The mysql-pool integration suites that drive the whole stack against
/// the in-memory mock driver. `cargo xtask scenarios` runs exactly these,
/// which is what to reach for when touching the acquire/release or
/// health-worker paths.
const SCENARIO_SUITES: &[&str] = &[
    "pool_lifecycle",
    "reconnect",
    "health_worker",
    "reconfigure",
];

#[derive(Parser)]
#[command(name = "xtask", about = "Build automation for mysql-pool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Format check, lints, then the full test suite
    Ci,
    /// Check formatting
    Fmt,
    /// Clippy over every target, warnings denied
    Lint,
    /// Unit tests and integration suites for every crate
    Test,
    /// Only the mock-driver scenario suites of mysql-pool
    Scenarios {
        /// Filter passed through to the test harness
        filter: Option<String>,
    },
    /// API documentation for the workspace crates
    Doc,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;
    sh.change_dir(workspace_root()?);

    match cli.command {
        Command::Ci => {
            fmt(&sh)?;
            lint(&sh)?;
            test(&sh)?;
            println!("xtask: ci green");
            Ok(())
        }
        Command::Fmt => fmt(&sh),
        Command::Lint => lint(&sh),
        Command::Test => test(&sh),
        Command::Scenarios { filter } => scenarios(&sh, filter.as_deref()),
        Command::Doc => doc(&sh),
    }
}

/// The workspace root is one level above this crate; no cargo invocation
/// needed to find it.
fn workspace_root() -> Result<PathBuf> {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(Path::to_path_buf)
        .context("xtask crate has no parent directory")
}

fn fmt(sh: &Shell) -> Result<()> {
    println!("xtask: checking formatting");
    cmd!(sh, "cargo fmt --all -- --check").run()?;
    Ok(())
}

fn lint(sh: &Shell) -> Result<()> {
    println!("xtask: linting");
    cmd!(sh, "cargo clippy --workspace --all-targets -- -D warnings").run()?;
    Ok(())
}

fn test(sh: &Shell) -> Result<()> {
    println!("xtask: running the full test suite");
    cmd!(sh, "cargo test --workspace").run()?;
    Ok(())
}

fn scenarios(sh: &Shell, filter: Option<&str>) -> Result<()> {
    for suite in SCENARIO_SUITES.iter().copied() {
        println!("xtask: scenario suite {suite}");
        let mut run = cmd!(sh, "cargo test -p mysql-pool --test {suite}");
        if let Some(filter) = filter {
            run = run.arg(filter);
        }
        run.run()?;
    }
    Ok(())
}

fn doc(sh: &Shell) -> Result<()> {
    println!("xtask: building documentation");
    cmd!(sh, "cargo doc --workspace --no-deps").run()?;
    Ok(())
}
