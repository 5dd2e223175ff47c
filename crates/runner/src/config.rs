//! Runner configuration: TOML file with environment overrides.
//!
//! Search order for `config.toml`:
//! 1) `CRAFT_BRIDGE_CONFIG_DIR/config.toml`
//! 2) `./config.toml`
//! 3) `<repo_root>/config/config.toml`
//! A missing file yields the defaults.

use std::env;
use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub control: Control,
    #[serde(default)]
    pub llm: Llm,
    #[serde(default)]
    pub agent: Agent,
}

#[derive(Debug, Deserialize)]
pub struct Control {
    #[serde(default = "default_control_addr")]
    pub addr: String,
}

impl Default for Control {
    fn default() -> Self {
        Self {
            addr: default_control_addr(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Llm {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
}

impl Default for Llm {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Agent {
    /// The avatar's own chat name; its messages are never answered.
    #[serde(default = "default_agent_name")]
    pub name: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for Agent {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_control_addr() -> String {
    "127.0.0.1:7878".to_string()
}

fn default_llm_endpoint() -> String {
    "http://127.0.0.1:11434/api/generate".to_string()
}

fn default_llm_model() -> String {
    "mock".to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_backoff_ms() -> u64 {
    1000
}

fn default_agent_name() -> String {
    "Bot".to_string()
}

fn default_system_prompt() -> String {
    "You control a game avatar and talk with nearby players. \
     Answer the latest message and choose the commands needed, if any."
        .to_string()
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match resolve_path("config.toml") {
            Some(path) => {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("read config at {}", path.display()))?;
                toml::from_str(&text).context("parse config TOML")?
            }
            None => Config::default(),
        };
        cfg.apply_overrides(|key| env::var(key).ok());
        Ok(cfg)
    }

    /// Applies environment-style overrides from any lookup, which keeps the
    /// override logic testable without touching the process environment.
    pub fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        let non_empty = |v: String| {
            let v = v.trim().to_string();
            (!v.is_empty()).then_some(v)
        };
        if let Some(v) = get("CRAFT_BRIDGE_CONTROL_ADDR").and_then(non_empty) {
            self.control.addr = v;
        }
        if let Some(v) = get("CRAFT_BRIDGE_LLM_ENDPOINT").and_then(non_empty) {
            self.llm.endpoint = v;
        }
        if let Some(v) = get("CRAFT_BRIDGE_LLM_MODEL").and_then(non_empty) {
            self.llm.model = v;
        }
        if let Some(v) = get("CRAFT_BRIDGE_AGENT_NAME").and_then(non_empty) {
            self.agent.name = v;
        }
        if let Some(v) = get("CRAFT_BRIDGE_SYSTEM_PROMPT") {
            self.agent.system_prompt = v;
        }
    }
}

fn resolve_path(relative_path: &str) -> Option<PathBuf> {
    if let Some(root) = env::var_os("CRAFT_BRIDGE_CONFIG_DIR") {
        let candidate = PathBuf::from(root).join(relative_path);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    if let Ok(cwd) = env::current_dir() {
        let candidate = cwd.join(relative_path);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    // Repo convenience: this crate lives at <repo_root>/crates/runner.
    let candidate = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)?
        .join("config")
        .join(relative_path);
    candidate.is_file().then_some(candidate)
}
