use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::GatewayError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound for JSON and multipart request bodies.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_body_bytes: 20 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamType {
    OpenAI,
    Azure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub api_type: UpstreamType,
    /// OpenAI: API root (without `/v1`). Azure: resource endpoint.
    pub base_url: String,
    pub api_key: Option<String>,
    /// Model name, or deployment name for Azure.
    pub model: String,
    /// Azure only.
    pub api_version: String,
    pub timeout_secs: u64,
    /// Hosts contacted directly even when proxy variables are set.
    pub no_proxy_hosts: Vec<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_type: UpstreamType::OpenAI,
            base_url: "https://api.openai.com".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            api_version: "2024-05-01-preview".to_string(),
            timeout_secs: 120,
            no_proxy_hosts: Vec::new(),
        }
    }
}

impl UpstreamConfig {
    pub fn chat_completions_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        match self.api_type {
            UpstreamType::OpenAI => format!("{}/v1/chat/completions", base),
            UpstreamType::Azure => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                base, self.model, self.api_version
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Prepended to every new session; empty disables it.
    pub system_prompt: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: "You are a helpful assistant.".to_string(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, GatewayError> {
        // .env 仅用于本地开发，缺失时忽略
        let _ = dotenvy::dotenv();

        let mut settings = match Self::find_config_file() {
            Some(path) => Self::load_from(&path)?,
            None => {
                tracing::info!("No custom-config.toml or config.toml found, using defaults");
                Settings::default()
            }
        };
        settings.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn load_from(path: &Path) -> Result<Self, GatewayError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| GatewayError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn find_config_file() -> Option<std::path::PathBuf> {
        ["custom-config.toml", "config.toml"]
            .iter()
            .map(Path::new)
            .find(|p| p.exists())
            .map(Path::to_path_buf)
    }

    /// 环境变量优先于配置文件
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = var("CHAT_GATEWAY_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("CHAT_GATEWAY_PORT") {
            match port.trim().parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid CHAT_GATEWAY_PORT: {}", port),
            }
        }
        if let Some(base_url) = var("CHAT_UPSTREAM_BASE_URL") {
            self.upstream.base_url = base_url;
        }
        if let Some(api_key) = var("CHAT_UPSTREAM_API_KEY") {
            self.upstream.api_key = Some(api_key);
        }
        if let Some(model) = var("CHAT_UPSTREAM_MODEL") {
            self.upstream.model = model;
        }
        if let Some(prompt) = var("CHAT_SYSTEM_PROMPT") {
            self.chat.system_prompt = prompt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn empty_file_yields_defaults() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.upstream.api_type, UpstreamType::OpenAI);
        assert!(settings.upstream.api_key.is_none());
    }

    #[test]
    fn load_from_reads_partial_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9100

[upstream]
api_type = "azure"
base_url = "https://example.openai.azure.com/"
model = "gpt-4o"

[chat]
system_prompt = ""
"#
        )
        .unwrap();

        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.upstream.api_type, UpstreamType::Azure);
        assert_eq!(
            settings.upstream.chat_completions_url(),
            "https://example.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-05-01-preview"
        );
        assert!(settings.chat.system_prompt.is_empty());
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = \"not a number\"").unwrap();
        let err = Settings::load_from(file.path()).unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[test]
    fn env_overrides_win_and_blank_values_are_ignored() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("CHAT_GATEWAY_PORT", "7000"),
            ("CHAT_UPSTREAM_API_KEY", "sk-test"),
            ("CHAT_UPSTREAM_MODEL", "  "),
        ]);
        let mut settings = Settings::default();
        settings.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(settings.server.port, 7000);
        assert_eq!(settings.upstream.api_key.as_deref(), Some("sk-test"));
        assert_eq!(settings.upstream.model, "gpt-4o-mini");
        assert_eq!(
            settings.upstream.chat_completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );
    }
}
