//! Known engines and runtime selection.

use std::env;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use super::{DeliveryMode, Descriptor, Encoding, ExternalRuntime};
use crate::error::{Error, Result};

/// Environment variable naming the runtime to prefer.
pub const RUNTIME_ENV: &str = "EXECJS_RUNTIME";

/// Registered names of the built-in runtimes.
pub mod names {
    pub const NODE: &str = "Node";
    pub const DENO: &str = "Deno";
    pub const JAVASCRIPT_CORE: &str = "JavaScriptCore";
    pub const SPIDER_MONKEY: &str = "SpiderMonkey";
    pub const JSCRIPT: &str = "JScript";
    pub const PHANTOM_JS: &str = "PhantomJS";
    pub const SLIMER_JS: &str = "SlimerJS";
    pub const NASHORN: &str = "Nashorn";
    pub const LLRT: &str = "Llrt";
}

type Constructor = Arc<dyn Fn() -> ExternalRuntime + Send + Sync>;

struct Entry {
    name: String,
    build: Constructor,
    instance: OnceLock<ExternalRuntime>,
}

impl Entry {
    fn runtime(&self) -> ExternalRuntime {
        self.instance.get_or_init(|| (self.build)()).clone()
    }
}

/// Ordered table of runtime constructors. Each constructor runs at most once;
/// the runtime it builds (and its availability check) is reused afterwards.
pub struct Registry {
    entries: RwLock<Vec<Arc<Entry>>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Add a runtime, or replace the one registered under the same name.
    pub fn register<F>(&self, name: impl Into<String>, build: F)
    where
        F: Fn() -> ExternalRuntime + Send + Sync + 'static,
    {
        let entry = Arc::new(Entry {
            name: name.into(),
            build: Arc::new(build),
            instance: OnceLock::new(),
        });
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.iter_mut().find(|e| e.name == entry.name) {
            Some(slot) => *slot = entry,
            None => entries.push(entry),
        }
    }

    /// Registered names, in priority order.
    pub fn names(&self) -> Vec<String> {
        self.snapshot().iter().map(|e| e.name.clone()).collect()
    }

    /// Look a runtime up by name (case-insensitive) without checking availability.
    pub fn lookup(&self, name: &str) -> Option<ExternalRuntime> {
        self.snapshot()
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
            .map(|e| e.runtime())
    }

    /// The named runtime, which must be installed.
    pub fn get(&self, name: &str) -> Result<ExternalRuntime> {
        let runtime = self
            .lookup(name)
            .ok_or_else(|| Error::UnknownRuntime(name.to_string()))?;
        if !runtime.is_available() {
            return Err(Error::RuntimeUnavailable(runtime.name().to_string()));
        }
        Ok(runtime)
    }

    /// The runtime named by `EXECJS_RUNTIME`, if that variable is set.
    pub fn get_from_environment(&self) -> Result<Option<ExternalRuntime>> {
        match env::var(RUNTIME_ENV) {
            Ok(name) if !name.trim().is_empty() => self.get(name.trim()).map(Some),
            _ => Ok(None),
        }
    }

    /// The environment's choice, else the first installed runtime.
    pub fn auto(&self) -> Result<ExternalRuntime> {
        if let Some(runtime) = self.get_from_environment()? {
            return Ok(runtime);
        }
        self.available()
            .into_iter()
            .next()
            .ok_or_else(|| Error::RuntimeUnavailable("any JavaScript".into()))
    }

    /// Every installed runtime, in priority order.
    pub fn available(&self) -> Vec<ExternalRuntime> {
        self.all()
            .into_iter()
            .filter(ExternalRuntime::is_available)
            .collect()
    }

    /// Every registered runtime, installed or not.
    pub fn all(&self) -> Vec<ExternalRuntime> {
        self.snapshot().iter().map(|e| e.runtime()).collect()
    }

    fn snapshot(&self) -> Vec<Arc<Entry>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for Registry {
    /// The built-in engines, most preferred first.
    fn default() -> Self {
        let registry = Self::new();
        registry.register(names::NODE, node);
        registry.register(names::DENO, deno);
        registry.register(names::JAVASCRIPT_CORE, jsc);
        registry.register(names::SPIDER_MONKEY, spidermonkey);
        registry.register(names::JSCRIPT, jscript);
        registry.register(names::PHANTOM_JS, phantomjs);
        registry.register(names::SLIMER_JS, slimerjs);
        registry.register(names::NASHORN, nashorn);
        registry.register(names::LLRT, llrt);
        registry
    }
}

/// The process-wide registry behind the crate-level helpers.
pub fn global() -> &'static Registry {
    static GLOBAL: OnceLock<Registry> = OnceLock::new();
    GLOBAL.get_or_init(Registry::default)
}

/// Node.js, found as `node` or, failing that, `nodejs`.
pub fn node() -> ExternalRuntime {
    let runtime = node_with_command("node");
    if runtime.is_available() {
        return runtime;
    }
    node_with_command("nodejs")
}

fn node_with_command(command: &str) -> ExternalRuntime {
    ExternalRuntime::new(
        Descriptor::new("Node.js (V8)", [command], include_str!("../runners/node.js"))
            .prompt("> ")
            .continuation_prompt("... ")
            .session_args(["-i"]),
    )
}

pub fn deno() -> ExternalRuntime {
    ExternalRuntime::new(
        Descriptor::new("Deno", ["deno"], include_str!("../runners/deno.js"))
            .prompt("> ")
            .flatten_input(true),
    )
}

pub fn jsc() -> ExternalRuntime {
    ExternalRuntime::new(
        Descriptor::new(
            "JavaScriptCore",
            ["/System/Library/Frameworks/JavaScriptCore.framework/Versions/A/Resources/jsc"],
            include_str!("../runners/jsc.js"),
        )
        .mode(DeliveryMode::TempFile),
    )
}

pub fn spidermonkey() -> ExternalRuntime {
    ExternalRuntime::new(
        Descriptor::new("SpiderMonkey", ["js"], include_str!("../runners/spidermonkey.js"))
            .mode(DeliveryMode::TempFile),
    )
}

/// Windows Script Host's JScript engine, driven through `cscript`.
pub fn jscript() -> ExternalRuntime {
    ExternalRuntime::new(
        Descriptor::new(
            "JScript",
            ["cscript", "//E:jscript", "//Nologo"],
            include_str!("../runners/jscript.js"),
        )
        .mode(DeliveryMode::TempFile)
        .encoding(Encoding::Ascii),
    )
}

pub fn phantomjs() -> ExternalRuntime {
    ExternalRuntime::new(
        Descriptor::new("PhantomJS", ["phantomjs"], include_str!("../runners/phantomjs.js"))
            .mode(DeliveryMode::TempFile),
    )
}

pub fn slimerjs() -> ExternalRuntime {
    ExternalRuntime::new(
        Descriptor::new("SlimerJS", ["slimerjs"], include_str!("../runners/slimerjs.js"))
            .mode(DeliveryMode::TempFile),
    )
}

pub fn nashorn() -> ExternalRuntime {
    ExternalRuntime::new(
        Descriptor::new("Nashorn", ["jjs"], include_str!("../runners/nashorn.js"))
            .mode(DeliveryMode::TempFile),
    )
}

pub fn llrt() -> ExternalRuntime {
    ExternalRuntime::new(
        Descriptor::new("Llrt", ["llrt"], include_str!("../runners/llrt.js"))
            .mode(DeliveryMode::TempFile),
    )
}
