use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::Path;
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace automation for chronicle")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all checks: fmt, clippy, tests, doc, smoke
    Check,
    /// Run cargo fmt --check on all crates
    Fmt,
    /// Run clippy on all crates
    Clippy,
    /// Run all tests
    Test,
    /// Build rustdoc for the workspace
    Doc,
    /// Drive the CLI through create, diff, restore, and verify on a scratch store
    Smoke,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check => {
            cargo("fmt", &["fmt", "--all", "--", "--check"])?;
            cargo("clippy", &CLIPPY)?;
            cargo("test", &["test", "--workspace"])?;
            cargo("doc", &["doc", "--workspace", "--no-deps"])?;
            run_smoke()?;
        }
        Commands::Fmt => cargo("fmt", &["fmt", "--all", "--", "--check"])?,
        Commands::Clippy => cargo("clippy", &CLIPPY)?,
        Commands::Test => cargo("test", &["test", "--workspace"])?,
        Commands::Doc => cargo("doc", &["doc", "--workspace", "--no-deps"])?,
        Commands::Smoke => run_smoke()?,
    }

    Ok(())
}

const CLIPPY: [&str; 6] = [
    "clippy",
    "--workspace",
    "--all-targets",
    "--",
    "-D",
    "warnings",
];

fn cargo(step: &str, args: &[&str]) -> Result<()> {
    println!("==> Running cargo {}", args.join(" "));
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        anyhow::bail!("cargo {step} failed");
    }
    Ok(())
}

fn run_smoke() -> Result<()> {
    println!("==> Running CLI smoke test");
    let scratch = tempfile::tempdir()?;
    let store = scratch.path().join("store");
    let first = scratch.path().join("v1.json");
    let second = scratch.path().join("v2.json");
    std::fs::write(&first, r#"{"title":"Animals","words":["hello","world"]}"#)?;
    std::fs::write(
        &second,
        r#"{"title":"Animals (edited)","words":["hello","world","game"]}"#,
    )?;

    chronicle(&store, &["create", "smoke", path_arg(&first)?])?;
    chronicle(
        &store,
        &["create", "smoke", path_arg(&second)?, "--kind", "minor"],
    )?;
    chronicle(&store, &["diff", "smoke", "1.0.0", "1.1.0"])?;
    chronicle(
        &store,
        &[
            "restore",
            "smoke",
            "1.0.0",
            "--strategy",
            "selective",
            "--path",
            "words",
        ],
    )?;
    chronicle(&store, &["history", "smoke"])?;
    chronicle(&store, &["verify"])?;
    Ok(())
}

fn chronicle(store: &Path, args: &[&str]) -> Result<()> {
    let status = Command::new("cargo")
        .args(["run", "--quiet", "--package", "chronicle-cli", "--"])
        .arg("--store")
        .arg(store)
        .args(args)
        .status()?;
    if !status.success() {
        anyhow::bail!("chronicle {} failed", args.join(" "));
    }
    Ok(())
}

fn path_arg(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| anyhow::anyhow!("non-UTF-8 path {}", path.display()))
}
