//! Execution contexts: compiled code bound to a runtime.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::Result;
use crate::process::{self, flatten_lines};
use crate::runtime::{DeliveryMode, ExternalRuntime, SessionHandle};
use crate::template;

pub mod result;

pub use result::extract;

/// Header source (e.g. library code) bound to a runtime. Every evaluation
/// runs the header first, in a fresh engine unless the runtime uses a session.
pub struct Context {
    runtime: ExternalRuntime,
    header: String,
    cwd: Option<PathBuf>,
    session: Option<SessionHandle>,
}

impl Context {
    pub(crate) fn new(runtime: ExternalRuntime, header: &str, session: Option<SessionHandle>) -> Self {
        Self {
            runtime,
            header: header.to_string(),
            cwd: None,
            session,
        }
    }

    /// Working directory for spawned engines. Sessions keep their own.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn runtime(&self) -> &ExternalRuntime {
        &self.runtime
    }

    pub fn is_available(&self) -> bool {
        self.runtime.is_available()
    }

    /// Evaluate an expression and return its value.
    pub async fn eval(&self, source: &str) -> Result<Value> {
        self.exec(&eval_body(source)).await
    }

    /// Run statements as a function body; the `return`ed value is the result.
    pub async fn exec(&self, source: &str) -> Result<Value> {
        let program = self.compile_program(source);
        let descriptor = self.runtime.descriptor();
        let cwd = self.cwd.as_deref();

        let output = match descriptor.mode {
            DeliveryMode::TempFile => self.exec_with_tempfile(&program, cwd).await?,
            _ if self.session.is_some() || descriptor.mode == DeliveryMode::Session => {
                self.exec_with_session(&program).await?
            }
            _ => self.exec_with_pipe(&program, cwd).await?,
        };
        extract(&output)
    }

    /// Call a function by name with JSON arguments.
    pub async fn call(&self, identifier: &str, args: &[Value]) -> Result<Value> {
        let args = serde_json::to_string(args)?;
        self.eval(&format!("{}.apply(this, {})", identifier, args))
            .await
    }

    /// The full program text an evaluation of `source` would send.
    pub fn compile_program(&self, source: &str) -> String {
        let source = if self.header.is_empty() {
            source.to_string()
        } else {
            format!("{}\n{}", self.header, source)
        };
        template::compile(&self.runtime.descriptor().runner_source, &source)
    }

    async fn exec_with_pipe(&self, program: &str, cwd: Option<&Path>) -> Result<String> {
        let descriptor = self.runtime.descriptor();
        let argv = self.runtime.require_binary()?;
        let input = if descriptor.flatten_input {
            flatten_lines(program)
        } else {
            program.to_string()
        };
        process::run_with_pipe(argv, cwd, &input, descriptor.encoding)
            .await?
            .into_stdout()
    }

    async fn exec_with_tempfile(&self, program: &str, cwd: Option<&Path>) -> Result<String> {
        let argv = self.runtime.require_binary()?;
        process::run_with_tempfile(argv, cwd, program, self.runtime.descriptor().encoding)
            .await?
            .into_stdout()
    }

    async fn exec_with_session(&self, program: &str) -> Result<String> {
        let handle = match &self.session {
            Some(handle) => handle.clone(),
            None => self.runtime.session().await?,
        };
        let mut session = handle.lock().await;
        session.submit(program).await
    }
}

/// Function body that evaluates `source` as a parenthesized expression.
fn eval_body(source: &str) -> String {
    let data = if source.trim().is_empty() {
        "''".to_string()
    } else {
        format!("'('+{}+')'", template::ascii_json_string(source))
    };
    format!("return eval({})", data)
}
