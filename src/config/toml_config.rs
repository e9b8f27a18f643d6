use crate::utils::error::{RelayError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 11435;
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:11434";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";
pub const DEFAULT_TOOL_SYSTEM_PROMPT: &str = "You are an assistant with access to tools, if you do not have a tool to deal with the user's request but you think you can answer do it so, if not explain your capabilities";
pub const DEFAULT_MODEL: &str = "llama3.2:1b";
pub const DEFAULT_BALLDONTLIE_URL: &str = "https://api.balldontlie.io/v1";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub chat: ChatConfig,
    pub generate: GenerateConfig,
    pub tools: ToolsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
    pub connect_timeout_seconds: u64,
    /// 整個請求的逾時秒數，未設定則不限制生成時間
    pub timeout_seconds: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_BACKEND_URL.to_string(),
            connect_timeout_seconds: 10,
            timeout_seconds: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// 對話沒有 system 訊息時注入，空字串表示停用
    pub system_prompt: Option<String>,
    /// 工具呼叫流程中，請求未指定模型時使用
    pub default_model: String,
    /// 前端背景任務 (標題、標籤、自動完成) 改用的模型
    pub task_model: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            default_model: DEFAULT_MODEL.to_string(),
            task_model: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateConfig {
    pub prompt_prefix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub enabled: bool,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub system_prompt: String,
    pub balldontlie: BalldontlieConfig,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_retries: 10,
            retry_delay_ms: 250,
            system_prompt: DEFAULT_TOOL_SYSTEM_PROMPT.to_string(),
            balldontlie: BalldontlieConfig::default(),
        }
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalldontlieConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for BalldontlieConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BALLDONTLIE_URL.to_string(),
            api_key: None,
            timeout_seconds: 30,
        }
    }
}

// 避免 API 金鑰出現在日誌中
impl std::fmt::Debug for BalldontlieConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalldontlieConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub json: bool,
}

impl RelayConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(RelayError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| RelayError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${BALLDONTLIE_API_KEY})，未定義的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| RelayError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 前端應設定的 `OLLAMA_BASE_URL`
    pub fn frontend_base_url(&self) -> String {
        let host = match self.server.host.as_str() {
            "0.0.0.0" | "::" | "[::]" => "localhost",
            host => host,
        };
        format!("http://{}:{}", host, self.server.port)
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.chat
            .system_prompt
            .as_deref()
            .filter(|prompt| !prompt.trim().is_empty())
    }

    pub fn prompt_prefix(&self) -> Option<&str> {
        self.generate
            .prompt_prefix
            .as_deref()
            .filter(|prefix| !prefix.is_empty())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.connect_timeout_seconds)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.backend.timeout_seconds.map(Duration::from_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.tools.retry_delay_ms)
    }

    /// 優先使用設定檔中的金鑰，其次為 `BALLDONTLIE_API_KEY`；未替換的 `${...}` 視為未設定
    pub fn balldontlie_api_key(&self) -> Option<String> {
        self.tools
            .balldontlie
            .api_key
            .clone()
            .filter(|key| !key.is_empty() && !key.starts_with("${"))
            .or_else(|| std::env::var("BALLDONTLIE_API_KEY").ok())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("server.host", &self.server.host)?;
        validation::validate_range("server.port", self.server.port, 1, u16::MAX)?;
        validation::validate_url("backend.url", &self.backend.url)?;
        validation::validate_non_empty_string("chat.default_model", &self.chat.default_model)?;

        if let Some(task_model) = &self.chat.task_model {
            validation::validate_non_empty_string("chat.task_model", task_model)?;
        }

        if self.tools.enabled {
            validation::validate_positive_number(
                "tools.max_retries",
                self.tools.max_retries as usize,
                1,
            )?;
            validation::validate_url("tools.balldontlie.base_url", &self.tools.balldontlie.base_url)?;
        }

        if let Some(level) = &self.logging.level {
            let valid_levels = ["trace", "debug", "info", "warn", "error"];
            if !valid_levels.contains(&level.to_lowercase().as_str()) {
                return Err(RelayError::InvalidConfigValueError {
                    field: "logging.level".to_string(),
                    value: level.clone(),
                    reason: format!("Valid levels: {}", valid_levels.join(", ")),
                });
            }
        }

        Ok(())
    }
}

impl Validate for RelayConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = RelayConfig::from_toml_str("").unwrap();

        assert_eq!(config.server.port, 11435);
        assert_eq!(config.backend.url, "http://localhost:11434");
        assert_eq!(config.system_prompt(), Some("You are a helpful AI assistant."));
        assert_eq!(config.prompt_prefix(), None);
        assert!(!config.tools.enabled);
        assert_eq!(config.tools.max_retries, 10);
        assert!(config.request_timeout().is_none());
        assert_eq!(config.frontend_base_url(), "http://localhost:11435");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[server]
host = "127.0.0.1"
port = 8080

[backend]
url = "http://gpu-box:11434"
timeout_seconds = 600

[chat]
system_prompt = ""
task_model = "llama3.2:1b"

[generate]
prompt_prefix = "Process this request: "

[tools]
enabled = true
max_retries = 3

[tools.balldontlie]
api_key = "secret"

[logging]
level = "debug"
json = true
"#;

        let config = RelayConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.listen_addr(), "127.0.0.1:8080");
        assert_eq!(config.frontend_base_url(), "http://127.0.0.1:8080");
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(600)));
        assert_eq!(config.system_prompt(), None);
        assert_eq!(config.chat.task_model.as_deref(), Some("llama3.2:1b"));
        assert_eq!(config.prompt_prefix(), Some("Process this request: "));
        assert_eq!(config.tools.max_retries, 3);
        assert_eq!(config.tools.retry_delay_ms, 250);
        assert_eq!(config.balldontlie_api_key().as_deref(), Some("secret"));
        assert!(config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("SPORTSLLM_TEST_BACKEND", "http://10.0.0.5:11434");

        let toml_content = r#"
[backend]
url = "${SPORTSLLM_TEST_BACKEND}"
"#;

        let config = RelayConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.backend.url, "http://10.0.0.5:11434");

        std::env::remove_var("SPORTSLLM_TEST_BACKEND");
    }

    #[test]
    fn test_config_validation() {
        let config = RelayConfig::from_toml_str("[backend]\nurl = \"localhost\"\n").unwrap();
        assert!(config.validate().is_err());

        let config = RelayConfig::from_toml_str("[server]\nport = 0\n").unwrap();
        assert!(config.validate().is_err());

        let config =
            RelayConfig::from_toml_str("[tools]\nenabled = true\nmax_retries = 0\n").unwrap();
        assert!(config.validate().is_err());

        let config = RelayConfig::from_toml_str("[logging]\nlevel = \"loud\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let err = RelayConfig::from_toml_str("[server\nport = 1").unwrap_err();
        assert!(matches!(err, RelayError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[server]\nport = 12000\n")
            .unwrap();

        let config = RelayConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.server.port, 12000);
    }

    #[test]
    fn test_example_config_matches_defaults() {
        let config = RelayConfig::from_toml_str(include_str!("../../sportsllm.example.toml")).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.server, RelayConfig::default().server);
        assert_eq!(config.backend.url, DEFAULT_BACKEND_URL);
        assert_eq!(config.system_prompt(), Some(DEFAULT_SYSTEM_PROMPT));
        assert_eq!(config.frontend_base_url(), "http://localhost:11435");
    }

    #[test]
    fn test_debug_output_hides_api_key() {
        let config = RelayConfig::from_toml_str(
            "[tools.balldontlie]\napi_key = \"secret-balldontlie-key\"\n",
        )
        .unwrap();

        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret-balldontlie-key"));
        assert!(debug.contains("<redacted>"));
        assert_eq!(
            config.tools.balldontlie.api_key.as_deref(),
            Some("secret-balldontlie-key")
        );
    }
}
