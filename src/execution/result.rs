//! Decoding the `[status, value]` line an engine prints last.

use serde_json::Value;

use crate::error::{Error, Result};

/// Turn raw engine output into the program's value.
///
/// The last line containing `]` is taken as the result; earlier lines
/// (banners, echoed input, console noise) are ignored.
pub fn extract(output: &str) -> Result<Value> {
    let output = output.replace("\r\n", "\n").replace('\r', "\n");

    // A stray `]` printed after the real result line would be picked instead.
    let line = output
        .lines()
        .rev()
        .find(|line| line.contains(']'))
        .ok_or_else(|| malformed("no result line in engine output", &output))?;

    let tuple: Vec<Value> = serde_json::from_str(line.trim())
        .map_err(|e| malformed(&format!("result line is not a JSON array: {}", e), &output))?;

    let mut items = tuple.into_iter();
    let status = items
        .next()
        .ok_or_else(|| malformed("result array is empty", &output))?;
    let value = items.next().unwrap_or(Value::Null);

    if status.as_str() == Some("ok") {
        Ok(value)
    } else {
        Err(Error::ProgramError(value))
    }
}

fn malformed(reason: &str, output: &str) -> Error {
    Error::MalformedOutput {
        reason: reason.to_string(),
        output: output.to_string(),
    }
}
