//! Configuration management for minagent.toml
//!
//! Every section is optional. The API key is deliberately not part of the file:
//! the entry point resolves it once and hands it to [`ProviderConfig::api_key`].

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::agent::AgentConfig;

pub const CONFIG_FILE_NAME: &str = "minagent.toml";

pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_ANTHROPIC_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub tools: ToolSettings,
}

/// Which backend serves decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Anthropic,
    Ollama,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Anthropic => write!(f, "anthropic"),
            ProviderKind::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "ollama" => Ok(ProviderKind::Ollama),
            other => anyhow::bail!("unknown provider '{}' (expected anthropic or ollama)", other),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,
    pub model: Option<String>,
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
    pub system_prompt: Option<String>,
    /// Recover tool calls that a model wrote as JSON text (Ollama only)
    #[serde(default)]
    pub parse_content_tool_calls: bool,
    /// Injected by the entry point; never read from the file
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentSettings {
    /// 0 disables the guard
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
    pub working_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolSettings {
    #[serde(default = "default_max_output_len")]
    pub max_output_len: usize,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_provider_timeout() -> u64 {
    120
}

fn default_max_turns() -> usize {
    50
}

fn default_tool_timeout() -> u64 {
    60
}

fn default_max_output_len() -> usize {
    50000
}

fn default_command_timeout() -> u64 {
    30
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            model: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            timeout_secs: default_provider_timeout(),
            system_prompt: None,
            parse_content_tool_calls: false,
            api_key: None,
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            tool_timeout_secs: default_tool_timeout(),
            working_dir: None,
        }
    }
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            max_output_len: default_max_output_len(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Model name, falling back to the backend's default
    pub fn model(&self) -> &str {
        match (&self.model, self.kind) {
            (Some(m), _) => m,
            (None, ProviderKind::Anthropic) => DEFAULT_ANTHROPIC_MODEL,
            (None, ProviderKind::Ollama) => DEFAULT_OLLAMA_MODEL,
        }
    }

    /// Base URL without trailing slash, falling back to the backend's default
    pub fn base_url(&self) -> &str {
        let url = match (&self.base_url, self.kind) {
            (Some(u), _) => u.as_str(),
            (None, ProviderKind::Anthropic) => DEFAULT_ANTHROPIC_URL,
            (None, ProviderKind::Ollama) => DEFAULT_OLLAMA_URL,
        };
        url.trim_end_matches('/')
    }

    /// Request limit; `timeout_secs = 0` means unbounded
    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_secs {
            0 => None,
            n => Some(Duration::from_secs(n)),
        }
    }

    /// Whether this backend cannot work without an API key
    pub fn requires_api_key(&self) -> bool {
        self.kind == ProviderKind::Anthropic
    }
}

impl Config {
    /// Load configuration from minagent.toml
    pub fn load() -> Result<Self> {
        Self::load_from(Self::find_config_path()?)
    }

    /// Load configuration, falling back to defaults if no file is found
    pub fn load_or_default() -> Result<Self> {
        match Self::find_config_path() {
            Ok(path) => Self::load_from(path),
            Err(_) => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse {}", path.as_ref().display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Find minagent.toml by searching current directory and parents
    pub fn find_config_path() -> Result<PathBuf> {
        Self::find_config_path_from(std::env::current_dir()?)
    }

    pub fn find_config_path_from(start: PathBuf) -> Result<PathBuf> {
        let mut current = start;

        for _ in 0..10 {
            let candidate = current.join(CONFIG_FILE_NAME);
            if candidate.exists() {
                return Ok(candidate);
            }
            if !current.pop() {
                break;
            }
        }

        anyhow::bail!("{} not found in current directory or parents", CONFIG_FILE_NAME)
    }

    /// Loop settings derived from the file
    pub fn agent_config(&self) -> AgentConfig {
        let mut config = AgentConfig::default()
            .with_max_turns(match self.agent.max_turns {
                0 => None,
                n => Some(n),
            })
            .with_provider_timeout(self.provider.timeout())
            .with_tool_timeout(match self.agent.tool_timeout_secs {
                0 => None,
                n => Some(Duration::from_secs(n)),
            })
            .with_max_output_len(self.tools.max_output_len)
            .with_command_timeout(self.tools.command_timeout_secs);

        if let Some(ref dir) = self.agent.working_dir {
            config = config.with_working_dir(dir.clone());
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[provider]
kind = "ollama"
model = "qwen2.5-coder"
timeout_secs = 30
parse_content_tool_calls = true

[agent]
max_turns = 0
tool_timeout_secs = 10
working_dir = "/tmp/work"

[tools]
max_output_len = 1000
"#;

        let config = Config::parse(toml).unwrap();
        assert_eq!(config.provider.kind, ProviderKind::Ollama);
        assert_eq!(config.provider.model(), "qwen2.5-coder");
        assert_eq!(config.provider.base_url(), DEFAULT_OLLAMA_URL);
        assert!(config.provider.parse_content_tool_calls);
        assert!(config.provider.api_key.is_none());
        assert_eq!(config.tools.command_timeout_secs, 30);

        let agent = config.agent_config();
        assert_eq!(agent.max_turns, None);
        assert_eq!(agent.tool_timeout, Some(Duration::from_secs(10)));
        assert_eq!(agent.provider_timeout, Some(Duration::from_secs(30)));
        assert_eq!(agent.working_dir, PathBuf::from("/tmp/work"));
        assert_eq!(agent.max_output_len, 1000);
    }

    #[test]
    fn test_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.provider.kind, ProviderKind::Anthropic);
        assert_eq!(config.provider.model(), DEFAULT_ANTHROPIC_MODEL);
        assert_eq!(config.provider.max_tokens, 4096);
        assert!(config.provider.requires_api_key());
        assert_eq!(config.agent.max_turns, 50);
        assert_eq!(config.agent_config().max_turns, Some(50));
    }

    #[test]
    fn test_zero_provider_timeout_is_unbounded() {
        let config = Config::parse("[provider]\nkind = \"ollama\"\ntimeout_secs = 0\n").unwrap();
        assert_eq!(config.provider.timeout(), None);
        assert_eq!(config.agent_config().provider_timeout, None);
        assert!(crate::provider::from_config(&config.provider).is_ok());
    }

    #[test]
    fn test_api_key_not_read_from_file() {
        let config = Config::parse("[provider]\napi_key = \"sk-from-file\"\n").unwrap();
        assert!(config.provider.api_key.is_none());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let provider =
            ProviderConfig::new(ProviderKind::Anthropic).with_base_url("http://localhost:8080/");
        assert_eq!(provider.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_provider_kind_from_str() {
        assert_eq!("Ollama".parse::<ProviderKind>().unwrap(), ProviderKind::Ollama);
        assert_eq!("claude".parse::<ProviderKind>().unwrap(), ProviderKind::Anthropic);
        assert!("openai".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_find_config_in_parent() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(CONFIG_FILE_NAME), "").unwrap();
        let nested = temp_dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        let found = Config::find_config_path_from(nested).unwrap();
        assert_eq!(found, temp_dir.path().join(CONFIG_FILE_NAME));
    }
}
