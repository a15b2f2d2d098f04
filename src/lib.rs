//! Run JavaScript through whichever external engine is installed and get the
//! result back as a `serde_json::Value`.
//!
//! ```no_run
//! # async fn demo() -> execjs::Result<()> {
//! let value = execjs::eval("'red yellow blue'.split(' ')").await?;
//! assert_eq!(value, serde_json::json!(["red", "yellow", "blue"]));
//!
//! let ctx = execjs::compile("function foo() { return 'bar' }")?;
//! assert_eq!(ctx.call("foo", &[]).await?, serde_json::json!("bar"));
//! # Ok(())
//! # }
//! ```
//!
//! Engines are looked up on `PATH` once per runtime. `EXECJS_RUNTIME` picks
//! one by name; otherwise the first installed engine in registry order wins.

pub mod error;
pub mod execution;
pub mod process;
pub mod runtime;
pub mod template;

pub use error::{Error, Result};
pub use execution::Context;
pub use runtime::registry::{self, names, Registry};
pub use runtime::{DeliveryMode, Descriptor, Encoding, ExternalRuntime};

/// A runtime by name, or the default choice when `name` is `None`.
pub fn get(name: Option<&str>) -> Result<ExternalRuntime> {
    match name {
        Some(name) => registry::global().get(name),
        None => registry::global().auto(),
    }
}

/// Evaluate an expression with the default runtime.
pub async fn eval(source: &str) -> Result<serde_json::Value> {
    get(None)?.eval(source).await
}

/// Run statements as a function body with the default runtime.
pub async fn exec(source: &str) -> Result<serde_json::Value> {
    get(None)?.exec(source).await
}

/// Bind `header` to the default runtime for repeated evaluation.
pub fn compile(header: &str) -> Result<Context> {
    get(None)?.compile(header)
}
