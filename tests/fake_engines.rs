//! End-to-end delivery tests against small shell scripts posing as engines.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use execjs::process::session::SessionState;
use execjs::{DeliveryMode, Descriptor, Error, ExternalRuntime};
use serde_json::json;
use tempfile::TempDir;

/// Echoes its program back, so the source decides what the "engine" prints.
const CAT_ENGINE: &str = "#!/bin/sh\ncat\n";

const FAILING_ENGINE: &str = "#!/bin/sh\ncat > /dev/null\necho 'SyntaxError: nope' >&2\nexit 3\n";

const TEMPFILE_ENGINE: &str = "#!/bin/sh\ncat \"$1\"\nprintf '[\"ok\",\"%s\"]\\n' \"$1\"\n";

const FAILING_TEMPFILE_ENGINE: &str = "#!/bin/sh\necho \"$1\" >&2\nexit 1\n";

const CWD_ENGINE: &str = "#!/bin/sh\ncat > /dev/null\nprintf '[\"ok\",\"%s\"]\\n' \"$(pwd -P)\"\n";

/// A line-oriented REPL: `emit X` prints X, `set V`/`get` keep state across
/// statements, quoted lines are printed back like a string literal's value.
const REPL_ENGINE: &str = r#"#!/bin/sh
printf 'Fake REPL v0\n> '
while IFS= read -r line; do
  case "$line" in
    emit\ *) printf '%s\n' "${line#emit }" ;;
    set\ *) val="${line#set }" ;;
    get) printf '["ok",%s]\n' "$val" ;;
    hang) sleep 2 ;;
    quit) exit 0 ;;
    \'*) printf '%s\n' "$line" ;;
  esac
  printf '> '
done
"#;

fn engine(dir: &TempDir, name: &str, script: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn runtime(path: &Path, runner: &'static str, mode: DeliveryMode) -> ExternalRuntime {
    ExternalRuntime::new(
        Descriptor::new("Fake", [path.to_string_lossy().into_owned()], runner).mode(mode),
    )
}

#[tokio::test]
async fn pipe_mode_returns_result_value() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let rt = runtime(&engine(&dir, "cat-engine", CAT_ENGINE), "#{source}", DeliveryMode::Pipe);
    assert!(rt.is_available());

    let value = rt.exec(r#"["ok",["red","yellow","blue"]]"#).await?;
    assert_eq!(value, json!(["red", "yellow", "blue"]));
    Ok(())
}

#[tokio::test]
async fn banner_before_result_is_ignored() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let rt = runtime(
        &engine(&dir, "cat-engine", CAT_ENGINE),
        "Engine 1.0 (c) nobody\n#{source}\n",
        DeliveryMode::Pipe,
    );
    assert_eq!(rt.exec(r#"["ok",42]"#).await?, json!(42));
    Ok(())
}

#[tokio::test]
async fn header_is_sent_before_source() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let rt = runtime(&engine(&dir, "cat-engine", CAT_ENGINE), "#{source}", DeliveryMode::Pipe);
    let ctx = rt.compile(r#"["ok","from header"]"#)?;
    // The source has no `]`, so the header's line is the last result line.
    assert_eq!(ctx.exec("trailing noise").await?, json!("from header"));
    Ok(())
}

#[tokio::test]
async fn error_status_is_a_program_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let rt = runtime(&engine(&dir, "cat-engine", CAT_ENGINE), "#{source}", DeliveryMode::Pipe);
    match rt.exec(r#"["err","Error: boom"]"#).await {
        Err(Error::ProgramError(value)) => assert_eq!(value, json!("Error: boom")),
        other => panic!("unexpected: {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn output_without_result_is_malformed() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let rt = runtime(&engine(&dir, "cat-engine", CAT_ENGINE), "#{source}", DeliveryMode::Pipe);
    assert!(matches!(
        rt.exec("nothing to see").await,
        Err(Error::MalformedOutput { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn non_zero_exit_carries_status_and_stderr() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let rt = runtime(&engine(&dir, "bad-engine", FAILING_ENGINE), "#{source}", DeliveryMode::Pipe);
    match rt.exec("return 1").await {
        Err(Error::ProcessExitedWithNonZeroStatus { status, stderr, .. }) => {
            assert_eq!(status, 3);
            assert_eq!(stderr.trim(), "SyntaxError: nope");
        }
        other => panic!("unexpected: {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn flattened_input_arrives_on_one_line() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = engine(&dir, "cat-engine", CAT_ENGINE);
    let rt = ExternalRuntime::new(
        Descriptor::new("Flat", [path.to_string_lossy().into_owned()], "#{source}").flatten_input(true),
    );
    assert_eq!(rt.exec("[\"ok\",\n\"one line\"\n]").await?, json!("one line"));
    Ok(())
}

#[tokio::test]
async fn tempfile_is_removed_after_success() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let rt = runtime(&engine(&dir, "file-engine", TEMPFILE_ENGINE), "#{source}", DeliveryMode::TempFile);

    let value = rt.exec("var x = 1;").await?;
    let path = PathBuf::from(value.as_str().unwrap());
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("execjs"));
    assert!(name.ends_with(".js"));
    assert!(!path.exists());
    Ok(())
}

#[tokio::test]
async fn tempfile_is_removed_after_failure() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let rt = runtime(
        &engine(&dir, "bad-file-engine", FAILING_TEMPFILE_ENGINE),
        "#{source}",
        DeliveryMode::TempFile,
    );

    match rt.exec("return 1").await {
        Err(Error::ProcessExitedWithNonZeroStatus { status, stderr, .. }) => {
            assert_eq!(status, 1);
            assert!(!Path::new(stderr.trim()).exists());
        }
        other => panic!("unexpected: {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn context_runs_in_its_working_directory() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let work = tempfile::tempdir()?;
    let rt = runtime(&engine(&dir, "cwd-engine", CWD_ENGINE), "#{source}", DeliveryMode::Pipe);

    let ctx = rt.compile("")?.current_dir(work.path());
    let value = ctx.exec("").await?;
    assert_eq!(
        PathBuf::from(value.as_str().unwrap()),
        work.path().canonicalize()?
    );
    Ok(())
}

#[tokio::test]
async fn session_mode_reuses_one_process() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let rt = runtime(&engine(&dir, "repl", REPL_ENGINE), "#{source}", DeliveryMode::Session);

    assert_eq!(rt.exec(r#"emit ["ok",1]"#).await?, json!(1));
    rt.exec(r#"set "kept""#).await.ok();
    // A second context shares the same live session and its state.
    let ctx = rt.compile("")?;
    assert_eq!(ctx.exec("get").await?, json!("kept"));

    let handle = rt.session().await?;
    assert_eq!(handle.lock().await.state(), SessionState::Ready);
    rt.close_session().await;
    assert_eq!(handle.lock().await.state(), SessionState::Closed);
    Ok(())
}

#[tokio::test]
async fn explicit_session_overrides_pipe_delivery() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let rt = runtime(&engine(&dir, "repl", REPL_ENGINE), "#{source}", DeliveryMode::Pipe);

    rt.session().await?;
    let ctx = rt.compile("")?;
    ctx.exec("set 7").await.ok();
    assert_eq!(ctx.exec("get").await?, json!(7));
    rt.close_session().await;
    Ok(())
}

#[tokio::test]
async fn dead_session_is_not_reused() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let rt = runtime(&engine(&dir, "repl", REPL_ENGINE), "#{source}", DeliveryMode::Session);

    assert!(matches!(rt.exec("quit").await, Err(Error::SessionClosed)));
    assert!(matches!(rt.exec(r#"emit ["ok",1]"#).await, Err(Error::SessionClosed)));

    rt.close_session().await;
    assert_eq!(rt.exec(r#"emit ["ok",2]"#).await?, json!(2));
    rt.close_session().await;
    Ok(())
}

#[tokio::test]
async fn abandoned_statement_leaves_session_busy() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let rt = runtime(&engine(&dir, "repl", REPL_ENGINE), "#{source}", DeliveryMode::Session);
    let ctx = rt.compile("")?;

    let timed_out = tokio::time::timeout(Duration::from_millis(200), ctx.exec("hang")).await;
    assert!(timed_out.is_err());
    assert!(matches!(ctx.exec("get").await, Err(Error::SessionBusy)));

    rt.close_session().await;
    Ok(())
}
