use std::path::PathBuf;

use clap::{ArgGroup, Parser};

#[derive(Parser, Debug, Clone)]
#[command(name = "execjs", about = "Evaluate JavaScript with an installed engine", version)]
#[command(group(ArgGroup::new("mode").args(["eval", "call"]).multiple(false)))]
pub struct Cli {
    /// JavaScript to run. Read from stdin when omitted and stdin is not a terminal.
    #[arg(value_name = "SOURCE")]
    pub source: Option<String>,

    /// Runtime to use (Node, Deno, SpiderMonkey, ...). Defaults to EXECJS_RUNTIME or the first installed.
    #[arg(short = 'r', long)]
    pub runtime: Option<String>,

    /// Treat SOURCE as an expression instead of a function body.
    #[arg(short = 'e', long)]
    pub eval: bool,

    /// Call a function by name (defined by --file or SOURCE).
    #[arg(long, value_name = "IDENT")]
    pub call: Option<String>,

    /// JSON array of arguments for --call.
    #[arg(long, value_name = "JSON", requires = "call")]
    pub args: Option<String>,

    /// Load a script before evaluating. Can be used multiple times.
    #[arg(short = 'f', long = "file", action = clap::ArgAction::Append)]
    pub files: Vec<PathBuf>,

    /// Working directory for the engine process.
    #[arg(short = 'C', long)]
    pub cwd: Option<PathBuf>,

    /// Evaluate inside a long-lived interactive engine session.
    #[arg(long)]
    pub session: bool,

    /// Give up after this many seconds and kill the engine.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// List known runtimes and whether they are installed.
    #[arg(short = 'l', long = "list")]
    pub list: bool,

    /// Print --list output as JSON.
    #[arg(long, requires = "list")]
    pub json: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_takes_json_args() {
        let cli = Cli::try_parse_from(["execjs", "-f", "lib.js", "--call", "foo", "--args", "[1,2]"]).unwrap();
        assert_eq!(cli.call.as_deref(), Some("foo"));
        assert_eq!(cli.args.as_deref(), Some("[1,2]"));
        assert_eq!(cli.files, vec![PathBuf::from("lib.js")]);
    }

    #[test]
    fn eval_and_call_conflict() {
        assert!(Cli::try_parse_from(["execjs", "-e", "--call", "foo"]).is_err());
    }

    #[test]
    fn args_require_call() {
        assert!(Cli::try_parse_from(["execjs", "--args", "[]", "1"]).is_err());
    }
}
