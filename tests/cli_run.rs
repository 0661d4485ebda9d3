#![cfg(unix)]

mod common;
use crate::common::{init_tracing, with_timeout};

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use runwire::cli::CliArgs;
use runwire::run;

fn args_for(file: &NamedTempFile, dry_run: bool) -> CliArgs {
    CliArgs {
        config: file.path().to_path_buf(),
        log_level: None,
        dry_run,
        poll_interval: Duration::from_millis(50),
    }
}

fn config(body: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{body}").unwrap();
    file
}

#[tokio::test]
async fn successful_pipeline_exits_zero() {
    init_tracing();
    let file = config("[[step]]\nname = \"hello\"\ncmd = \"echo hello from cli\"\n");
    let code = with_timeout(run(args_for(&file, false))).await.unwrap();
    assert_eq!(code, 0);
}

#[tokio::test]
async fn failing_pipeline_exits_one() {
    init_tracing();
    let file = config("[[step]]\nname = \"boom\"\ncmd = \"exit 4\"\n");
    let code = with_timeout(run(args_for(&file, false))).await.unwrap();
    assert_eq!(code, 1);
}

#[tokio::test]
async fn dry_run_does_not_execute() {
    init_tracing();
    let marker = tempfile::tempdir().unwrap();
    let touched = marker.path().join("touched");
    let file = config(&format!(
        "[[step]]\nname = \"touch\"\ncmd = \"touch {}\"\n",
        touched.display()
    ));

    let code = with_timeout(run(args_for(&file, true))).await.unwrap();
    assert_eq!(code, 0);
    assert!(!touched.exists());
}

#[tokio::test]
async fn invalid_config_is_an_error() {
    init_tracing();
    let file = config("[pipeline]\nname = \"nothing\"\n");
    assert!(run(args_for(&file, false)).await.is_err());
}
