use std::{
    collections::HashMap,
    env,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use directories::BaseDirs;

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        Self::load_from(default_config_path())
    }

    pub fn load_from(config_path: PathBuf) -> Self {
        let mut map = default_map();

        // Read .execjsrc if exists
        if let Ok(text) = fs::read_to_string(&config_path) {
            parse_rc(&text, &mut map);
        }

        // Overlay environment variables (take precedence)
        for (k, v) in env::vars() {
            if is_config_key(&k) {
                map.insert(k, v);
            }
        }

        Self { inner: map, config_path }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        // ENV first
        if let Ok(v) = env::var(key) {
            return Some(v);
        }
        self.inner.get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.trim().parse::<u64>().ok())
    }

    /// Preferred runtime name; `auto` or empty means pick the first installed.
    pub fn runtime(&self) -> Option<String> {
        self.get("EXECJS_RUNTIME")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("auto"))
    }

    /// Evaluation timeout; zero disables it.
    pub fn timeout(&self) -> Option<Duration> {
        self.get_u64("EXECJS_TIMEOUT")
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn log_filter(&self) -> String {
        self.get("EXECJS_LOG").unwrap_or_else(|| "warn".into())
    }
}

fn parse_rc(text: &str, map: &mut HashMap<String, String>) {
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            map.insert(k.trim().to_string(), v.trim().to_string());
        }
    }
}

fn is_config_key(k: &str) -> bool {
    k.starts_with("EXECJS_")
}

fn default_config_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"));
    config_path_in(&base)
}

fn config_path_in(base: &Path) -> PathBuf {
    base.join("execjs").join(".execjsrc")
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();
    m.insert("EXECJS_RUNTIME".into(), "auto".into());
    m.insert("EXECJS_LOG".into(), "warn".into());
    m.insert("EXECJS_TIMEOUT".into(), "0".into());
    m.insert("EXECJS_SESSION".into(), "false".into());
    m
}
