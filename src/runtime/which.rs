//! Executable lookup on the host search path.

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Resolve `command[0]` on `PATH` and return the full argv to spawn:
/// the resolved executable followed by the command's fixed arguments.
pub fn which(command: &[String]) -> Option<Vec<String>> {
    let (name, args) = command.split_first()?;
    let path_var = env::var_os("PATH").unwrap_or_default();
    let found = find_executable(name, &path_var, &path_extensions())?;

    let mut argv = Vec::with_capacity(command.len());
    argv.push(found.to_string_lossy().into_owned());
    argv.extend(args.iter().cloned());
    Some(argv)
}

/// Search each directory of `path_var` in order for `name` with each of
/// `extensions` appended. First match wins.
///
/// An absolute `name` is tested as-is, once per directory entry.
pub fn find_executable(name: &str, path_var: &OsStr, extensions: &[String]) -> Option<PathBuf> {
    for dir in env::split_paths(path_var) {
        if dir.as_os_str().is_empty() {
            continue;
        }
        for ext in extensions {
            let candidate = dir.join(format!("{}{}", name, ext));
            if is_executable(&candidate) {
                tracing::debug!(path = %candidate.display(), "resolved executable");
                return Some(candidate);
            }
        }
    }
    None
}

/// Extensions to try, in order. `PATHEXT` on Windows, just the bare name elsewhere.
#[cfg(windows)]
fn path_extensions() -> Vec<String> {
    let pathext = env::var("PATHEXT").unwrap_or_default();
    let mut exts: Vec<String> = pathext
        .split(';')
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .collect();
    if exts.is_empty() {
        exts.push(String::new());
    }
    exts
}

#[cfg(not(windows))]
fn path_extensions() -> Vec<String> {
    vec![String::new()]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    match path.metadata() {
        Ok(metadata) => metadata.is_file() && metadata.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
