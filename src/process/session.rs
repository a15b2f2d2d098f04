//! Long-lived interactive engine sessions.
//!
//! A session drives an engine's REPL over plain pipes. After the startup
//! prompt has been seen, each submission is the compiled program followed by
//! a string-literal statement holding a unique sentinel. The REPL prints the
//! literal back once the program has run, so everything read before the
//! sentinel belongs to that program.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::process::Stdio;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use super::ProcessHandle;
use crate::error::{Error, Result};
use crate::runtime::Encoding;

#[cfg(windows)]
const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
const LINE_ENDING: &str = "\n";

const READ_CHUNK: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unstarted,
    Ready,
    AwaitingResponse,
    Closed,
}

/// One interactive engine process. Not safe to share without a lock; callers
/// reach it through the runtime's `Arc<Mutex<Session>>`.
#[derive(Debug)]
pub struct Session {
    argv: Vec<String>,
    prompt: String,
    continuation_prompt: Option<String>,
    encoding: Encoding,
    state: SessionState,
    process: Option<ProcessHandle>,
    buffer: Vec<u8>,
    nonce: u64,
    submissions: u64,
}

impl Session {
    pub fn new(
        argv: Vec<String>,
        prompt: impl Into<String>,
        continuation_prompt: Option<String>,
        encoding: Encoding,
    ) -> Self {
        Self {
            argv,
            prompt: prompt.into(),
            continuation_prompt,
            encoding,
            state: SessionState::Unstarted,
            process: None,
            buffer: Vec::new(),
            nonce: new_nonce(),
            submissions: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Spawn the engine and wait for its first prompt.
    pub async fn start(&mut self) -> Result<()> {
        match self.state {
            SessionState::Unstarted => {}
            SessionState::Closed => return Err(Error::SessionClosed),
            _ => return Ok(()),
        }

        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty engine command")
            })?;
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        tracing::debug!(command = ?cmd.as_std(), "starting engine session");

        let mut child = cmd.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("engine session has no stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("engine session has no stdout"))?;
        self.process = Some(ProcessHandle {
            child,
            stdin,
            stdout,
        });

        if self.prompt.is_empty() {
            tracing::warn!("engine session has no prompt; skipping handshake");
        } else {
            let prompt = self.prompt.clone();
            let banner = self.read_until(&prompt).await?;
            tracing::debug!(banner = %banner.trim(), "engine session ready");
        }
        self.state = SessionState::Ready;
        Ok(())
    }

    /// Send one compiled program and return everything it printed, with
    /// REPL prompts removed from the start of each line.
    pub async fn submit(&mut self, program: &str) -> Result<String> {
        match self.state {
            SessionState::Unstarted => self.start().await?,
            SessionState::Ready => {}
            SessionState::AwaitingResponse => return Err(Error::SessionBusy),
            SessionState::Closed => return Err(Error::SessionClosed),
        }

        self.submissions += 1;
        let sentinel = format!("__execjs_{:016x}_{}__", self.nonce, self.submissions);
        let mut submission = String::with_capacity(program.len() + sentinel.len() + 8);
        submission.push_str(program);
        submission.push_str(LINE_ENDING);
        submission.push('\'');
        submission.push_str(&sentinel);
        submission.push('\'');
        submission.push_str(LINE_ENDING);

        self.state = SessionState::AwaitingResponse;
        let bytes = self.encoding.encode(&submission);
        let write = match self.process.as_mut() {
            Some(process) => {
                let stdin = &mut process.stdin;
                async move {
                    stdin.write_all(&bytes).await?;
                    stdin.flush().await
                }
                .await
            }
            None => return Err(Error::SessionClosed),
        };
        if let Err(e) = write {
            tracing::warn!("engine session rejected input: {}", e);
            self.mark_closed().await;
            return Err(Error::SessionClosed);
        }

        let raw = self.read_until(&sentinel).await?;
        self.state = SessionState::Ready;
        Ok(strip_prompts(
            &raw,
            &self.prompt,
            self.continuation_prompt.as_deref(),
        ))
    }

    /// Kill the engine. Further submissions fail with `SessionClosed`.
    pub async fn close(&mut self) {
        self.mark_closed().await;
    }

    async fn mark_closed(&mut self) {
        self.state = SessionState::Closed;
        self.buffer.clear();
        if let Some(mut process) = self.process.take() {
            if let Err(e) = process.child.start_kill() {
                tracing::debug!("engine session already gone: {}", e);
            }
            let _ = process.child.wait().await;
            tracing::debug!("engine session closed");
        }
    }

    /// Read until `needle` shows up; return what preceded it and consume the
    /// needle itself. Anything after it stays buffered for the next read.
    async fn read_until(&mut self, needle: &str) -> Result<String> {
        let needle = self.encoding.encode(needle);
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(pos) = find(&self.buffer, &needle) {
                let before: Vec<u8> = self.buffer.drain(..pos).collect();
                self.buffer.drain(..needle.len());
                return Ok(self.encoding.decode(&before));
            }

            let read = match self.process.as_mut() {
                Some(process) => process.stdout.read(&mut chunk).await,
                None => return Err(Error::SessionClosed),
            };
            match read {
                Ok(0) => {
                    self.mark_closed().await;
                    return Err(Error::SessionClosed);
                }
                Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                Err(e) => {
                    self.mark_closed().await;
                    return Err(e.into());
                }
            }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Drop prompt text a non-echoing REPL writes ahead of each line's output.
pub fn strip_prompts(text: &str, prompt: &str, continuation: Option<&str>) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let prompts: Vec<&str> = [Some(prompt), continuation]
        .into_iter()
        .flatten()
        .filter(|p| !p.is_empty())
        .collect();

    text.split('\n')
        .map(|line| {
            let mut line = line;
            while let Some(rest) = prompts.iter().find_map(|p| line.strip_prefix(p)) {
                line = rest;
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn new_nonce() -> u64 {
    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u32(std::process::id());
    if let Ok(elapsed) = SystemTime::now().duration_since(UNIX_EPOCH) {
        hasher.write_u128(elapsed.as_nanos());
    }
    hasher.finish()
}
