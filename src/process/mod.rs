//! Engine process transport: one-shot pipe and temp-file delivery.
//!
//! Both strategies spawn one process per evaluation and block until it exits.
//! The long-lived interactive alternative lives in [`session`].

use std::io::{self, Write};
use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::error::{Error, Result};
use crate::runtime::Encoding;

pub mod session;

/// A spawned engine with its stdin/stdout taken for interactive use.
#[derive(Debug)]
pub struct ProcessHandle {
    pub child: Child,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
}

/// Captured result of a one-shot engine run.
#[derive(Debug, Clone)]
pub struct Output {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl Output {
    /// Stdout of a successful run; a non-zero status is always fatal.
    pub fn into_stdout(self) -> Result<String> {
        if self.status != 0 {
            return Err(Error::ProcessExitedWithNonZeroStatus {
                status: self.status,
                stdout: self.stdout,
                stderr: self.stderr,
            });
        }
        Ok(self.stdout)
    }
}

/// Spawn `argv`, feed `input` on stdin and collect output until exit.
pub async fn run_with_pipe(
    argv: &[String],
    cwd: Option<&Path>,
    input: &str,
    encoding: Encoding,
) -> Result<Output> {
    let cmd = command(argv, cwd)?;
    run(cmd, Some(encoding.encode(input)), encoding).await
}

/// Write `program` to a fresh `execjs*.js` temp file and run `argv` with the
/// file's path appended. The file is removed on every exit path.
pub async fn run_with_tempfile(
    argv: &[String],
    cwd: Option<&Path>,
    program: &str,
    encoding: Encoding,
) -> Result<Output> {
    let mut file = tempfile::Builder::new()
        .prefix("execjs")
        .suffix(".js")
        .tempfile()?;
    file.write_all(&encoding.encode(program))?;
    file.flush()?;
    // Close our handle so the engine can open the file on every platform.
    let path = file.into_temp_path();
    tracing::debug!(path = %path.display(), "wrote runner to temp file");

    let mut full = argv.to_vec();
    full.push(path.to_string_lossy().into_owned());
    let result = match command(&full, cwd) {
        Ok(cmd) => run(cmd, None, encoding).await,
        Err(e) => Err(e),
    };

    if let Err(e) = path.close() {
        tracing::warn!("failed to remove runner temp file: {}", e);
    }
    result
}

/// Join all lines without separators, for engines that evaluate their
/// standard input one line at a time.
pub fn flatten_lines(text: &str) -> String {
    text.split(['\r', '\n']).collect()
}

fn command(argv: &[String], cwd: Option<&Path>) -> Result<Command> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty engine command"))?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    Ok(cmd)
}

async fn run(mut cmd: Command, input: Option<Vec<u8>>, encoding: Encoding) -> Result<Output> {
    cmd.stdin(if input.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    tracing::debug!(command = ?cmd.as_std(), "spawning engine");

    let mut child = cmd.spawn()?;
    let stdin = child.stdin.take();

    // Feed stdin while draining stdout/stderr so neither side can stall the other.
    let feed = async move {
        if let (Some(mut stdin), Some(bytes)) = (stdin, input) {
            if let Err(e) = stdin.write_all(&bytes).await {
                tracing::warn!("failed to write program to engine stdin: {}", e);
            }
        }
    };
    let (_, out) = tokio::join!(feed, child.wait_with_output());
    let out = out?;

    let status = out.status.code().unwrap_or(-1);
    tracing::debug!(status, "engine exited");
    Ok(Output {
        status,
        stdout: encoding.decode(&out.stdout),
        stderr: encoding.decode(&out.stderr),
    })
}
