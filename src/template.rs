//! Runner template compilation.
//!
//! A runner is an engine-specific JavaScript skeleton carrying placeholders.
//! Compiling substitutes the caller's source into it; every other byte of the
//! runner is passed through untouched.

/// Raw source text, inserted verbatim.
pub const SOURCE: &str = "#{source}";
/// Source wrapped in an IIFE and encoded as a pure-ASCII JSON string literal.
pub const ENCODED_SOURCE: &str = "#{encoded_source}";
/// The JSON compatibility shim for engines without a built-in `JSON`.
pub const JSON2_SOURCE: &str = "#{json2_source}";

/// Longest first, so no token can shadow a longer one sharing its prefix.
const PLACEHOLDERS: [&str; 3] = [ENCODED_SOURCE, JSON2_SOURCE, SOURCE];

const JSON2: &str = include_str!("runners/json2.js");

/// Substitute `source` into `runner`.
///
/// The runner is scanned once, left to right. Replacement text is never
/// rescanned, so placeholder-looking text inside `source` survives as-is.
pub fn compile(runner: &str, source: &str) -> String {
    let mut out = String::with_capacity(runner.len() + source.len());
    let mut encoded: Option<String> = None;
    let mut rest = runner;

    while let Some(pos) = rest.find("#{") {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match PLACEHOLDERS.iter().find(|p| tail.starts_with(**p)) {
            Some(&token) => {
                match token {
                    SOURCE => out.push_str(source),
                    ENCODED_SOURCE => {
                        out.push_str(encoded.get_or_insert_with(|| encode_source(source)))
                    }
                    _ => out.push_str(JSON2),
                }
                rest = &tail[token.len()..];
            }
            None => {
                out.push_str("#{");
                rest = &tail[2..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// `(function(){ <source> })()` as a JSON string literal, pure ASCII.
pub fn encode_source(source: &str) -> String {
    let wrapped = format!("(function(){{ {} }})()", encode_unicode_codepoints(source));
    serde_json::Value::String(wrapped).to_string()
}

/// JSON string literal for `s` with every non-ASCII char as a `\uXXXX` escape.
pub fn ascii_json_string(s: &str) -> String {
    encode_unicode_codepoints(&serde_json::Value::String(s.to_string()).to_string())
}

/// Replace each char outside printable ASCII (non-ASCII and DEL) with
/// JavaScript `\uXXXX` escapes (UTF-16 surrogate pairs above the BMP).
pub fn encode_unicode_codepoints(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut units = [0u16; 2];
    for c in s.chars() {
        if c.is_ascii() && c != '\u{7f}' {
            out.push(c);
        } else {
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}
