//! Engine descriptors and the runtimes built from them.

use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::execution::Context;
use crate::process::session::Session;

pub mod registry;
pub mod which;

/// How a compiled program reaches the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Written to the stdin of a short-lived process.
    #[default]
    Pipe,
    /// Written to a temp file whose path is passed as the last argument.
    TempFile,
    /// Sent to a long-lived REPL process.
    Session,
}

/// Text encoding used for program input and engine output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Utf8,
    /// 7-bit ASCII; anything wider is sent as `?` and read back as U+FFFD.
    Ascii,
}

impl Encoding {
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Encoding::Utf8 => text.as_bytes().to_vec(),
            Encoding::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Encoding::Ascii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { char::from(b) } else { char::REPLACEMENT_CHARACTER })
                .collect(),
        }
    }
}

/// Immutable configuration for one external engine.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub name: String,
    /// Executable name followed by fixed leading arguments.
    pub command: Vec<String>,
    /// Runner template; see [`crate::template`].
    pub runner_source: Cow<'static, str>,
    pub encoding: Encoding,
    pub mode: DeliveryMode,
    /// Prompt the REPL prints when ready for input (session delivery).
    pub prompt: String,
    pub continuation_prompt: Option<String>,
    /// Extra arguments that force the engine into REPL mode on piped stdin.
    pub session_args: Vec<String>,
    /// The engine evaluates stdin line by line, so programs are sent as one line.
    pub flatten_input: bool,
}

impl Descriptor {
    pub fn new<I, S>(name: impl Into<String>, command: I, runner_source: impl Into<Cow<'static, str>>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            command: command.into_iter().map(Into::into).collect(),
            runner_source: runner_source.into(),
            encoding: Encoding::Utf8,
            mode: DeliveryMode::Pipe,
            prompt: "> ".into(),
            continuation_prompt: None,
            session_args: Vec::new(),
            flatten_input: false,
        }
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn mode(mut self, mode: DeliveryMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn continuation_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.continuation_prompt = Some(prompt.into());
        self
    }

    pub fn session_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.session_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn flatten_input(mut self, flatten: bool) -> Self {
        self.flatten_input = flatten;
        self
    }
}

/// Shared handle to a runtime's interactive session.
pub type SessionHandle = Arc<tokio::sync::Mutex<Session>>;

/// A JavaScript runtime backed by an external engine executable.
///
/// Clones share the availability cache and the interactive session.
#[derive(Clone)]
pub struct ExternalRuntime {
    descriptor: Arc<Descriptor>,
    binary: Arc<OnceLock<Option<Vec<String>>>>,
    session: Arc<Mutex<Option<SessionHandle>>>,
}

impl ExternalRuntime {
    pub fn new(descriptor: Descriptor) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
            binary: Arc::new(OnceLock::new()),
            session: Arc::new(Mutex::new(None)),
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Whether the engine executable was found. Checked once per runtime.
    pub fn is_available(&self) -> bool {
        self.binary().is_some()
    }

    /// Resolved argv prefix: absolute executable path plus fixed arguments.
    pub fn binary(&self) -> Option<&[String]> {
        self.binary
            .get_or_init(|| which::which(&self.descriptor.command))
            .as_deref()
    }

    pub(crate) fn require_binary(&self) -> Result<&[String]> {
        self.binary()
            .ok_or_else(|| Error::RuntimeUnavailable(self.descriptor.name.clone()))
    }

    /// Bind `header` (e.g. library code) to this runtime. Fails up front when
    /// the engine is not installed.
    pub fn compile(&self, header: &str) -> Result<Context> {
        self.require_binary()?;
        Ok(Context::new(self.clone(), header, self.current_session()))
    }

    pub async fn eval(&self, source: &str) -> Result<serde_json::Value> {
        self.compile("")?.eval(source).await
    }

    pub async fn exec(&self, source: &str) -> Result<serde_json::Value> {
        self.compile("")?.exec(source).await
    }

    /// The runtime's interactive session, spawned and handshaken on first use.
    ///
    /// A session that has died stays dead: call [`close_session`] before
    /// asking for a new one.
    ///
    /// [`close_session`]: ExternalRuntime::close_session
    pub async fn session(&self) -> Result<SessionHandle> {
        let handle = match self.current_session() {
            Some(handle) => handle,
            None => {
                let mut argv = self.require_binary()?.to_vec();
                argv.extend(self.descriptor.session_args.iter().cloned());
                let session = Session::new(
                    argv,
                    self.descriptor.prompt.clone(),
                    self.descriptor.continuation_prompt.clone(),
                    self.descriptor.encoding,
                );
                let mut slot = self.session.lock().unwrap_or_else(PoisonError::into_inner);
                slot.get_or_insert_with(|| Arc::new(tokio::sync::Mutex::new(session)))
                    .clone()
            }
        };
        handle.lock().await.start().await?;
        Ok(handle)
    }

    /// Kill the interactive session, if any.
    pub async fn close_session(&self) {
        let handle = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.lock().await.close().await;
        }
    }

    fn current_session(&self) -> Option<SessionHandle> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl fmt::Display for ExternalRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExternalRuntime({})", self.descriptor.name)
    }
}

impl fmt::Debug for ExternalRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalRuntime")
            .field("descriptor", &self.descriptor)
            .field("binary", &self.binary.get())
            .finish()
    }
}
