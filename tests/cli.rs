use std::fs;
use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use predicates::prelude::*;

macro_rules! cargo_run {
    ($cmd:expr, $($args:expr),*) => {
        {
            let mut cmd = Command::cargo_bin($cmd)?;
            $(cmd.arg($args);)*
            cmd.assert()
        }
    };
}

#[test]
fn help_lists_subcommands() -> Result<()> {
    cargo_run!("facesort", "--help")
        .success()
        .stdout(predicate::str::contains("export"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("recognise"))
        .stdout(predicate::str::contains("clean"));
    Ok(())
}

#[test]
fn clean_removes_results_dir() -> Result<()> {
    let tmp = assert_fs::TempDir::new()?;
    let results = tmp.path().join("results");
    fs::create_dir_all(results.join("alice"))?;
    fs::write(results.join("alice/1.jpg"), b"x")?;

    cargo_run!("facesort", "clean", &results).success();
    assert!(!results.exists());
    Ok(())
}

#[test]
fn clean_all_also_removes_cache() -> Result<()> {
    let tmp = assert_fs::TempDir::new()?;
    let results = tmp.path().join("results");
    let cache = tmp.path().join("embeddings_cache.bin");
    fs::create_dir_all(&results)?;
    fs::write(&cache, b"x")?;

    cargo_run!("facesort", "clean", &results, "--all", "--cache-path", &cache).success();
    assert!(!results.exists());
    assert!(!cache.exists());
    Ok(())
}

#[test]
fn clean_cache_only_keeps_results() -> Result<()> {
    let tmp = assert_fs::TempDir::new()?;
    let results = tmp.path().join("results");
    let cache = tmp.path().join("embeddings_cache.bin");
    fs::create_dir_all(&results)?;
    fs::write(&cache, b"x")?;

    cargo_run!("facesort", "clean", &results, "--cache", "--cache-path", &cache).success();
    assert!(results.exists());
    assert!(!cache.exists());
    Ok(())
}

#[test]
fn validate_fails_on_missing_model() -> Result<()> {
    let tmp = assert_fs::TempDir::new()?;
    cargo_run!(
        "facesort",
        "validate",
        "--detector",
        "/nonexistent/det.onnx",
        "--recognizer",
        "/nonexistent/rec.onnx",
        tmp.path()
    )
    .failure();
    Ok(())
}
