use crate::utils::error::{ExportError, Result};
use crate::utils::logger::LogFormat;
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// 未提供設定檔時使用；憑證一律從環境變數帶入
pub const DEFAULT_CONFIG: &str = r#"
[enrichment]
store_hash = "${CLUB_EXPORT_STORE_HASH}"
auth_token = "${CLUB_EXPORT_AUTH_TOKEN}"
"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// 產生下載連結時使用的對外網址
    pub public_url: Option<String>,
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub store_hash: String,
    pub auth_token: String,
    #[serde(default = "default_attribute_id")]
    pub attribute_id: u64,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    /// CSV 直接作為回應內容
    #[default]
    Inline,
    /// 寫入伺服器目錄並回傳下載連結
    Stored,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub delivery: Delivery,
    #[serde(default = "default_output_directory")]
    pub directory: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: Option<String>,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_upload_mb() -> usize {
    50
}

fn default_base_url() -> String {
    "https://api.bigcommerce.com".to_string()
}

fn default_attribute_id() -> u64 {
    2
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_retry_delay_ms() -> u64 {
    250
}

fn default_output_directory() -> String {
    "./expired-customers".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            public_url: None,
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            delivery: Delivery::default(),
            directory: default_output_directory(),
        }
    }
}

impl fmt::Debug for EnrichmentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnrichmentConfig")
            .field("base_url", &self.base_url)
            .field("store_hash", &self.store_hash)
            .field("auth_token", &"<redacted>")
            .field("attribute_id", &self.attribute_id)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("retry_attempts", &self.retry_attempts)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .finish()
    }
}

impl ServerConfig {
    pub fn public_url(&self) -> String {
        self.public_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("http://localhost:{}", self.port))
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

impl LoggingConfig {
    pub fn log_format(&self) -> LogFormat {
        match self.format.as_deref() {
            Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| ExportError::ConfigError {
            message: format!("cannot read {}: {}", path.as_ref().display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    /// 有指定路徑就讀檔，否則使用內建預設值
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::from_toml_str(DEFAULT_CONFIG),
        }
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ExportError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${CLUB_EXPORT_AUTH_TOKEN})；未設定的保留原樣，交由驗證處理
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ExportError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("enrichment.base_url", &self.enrichment.base_url)?;
        validation::validate_resolved("enrichment.store_hash", &self.enrichment.store_hash)?;
        validation::validate_non_empty_string("enrichment.store_hash", &self.enrichment.store_hash)?;
        validation::validate_resolved("enrichment.auth_token", &self.enrichment.auth_token)?;
        if self.enrichment.auth_token.trim().is_empty() {
            return Err(ExportError::InvalidConfigValueError {
                field: "enrichment.auth_token".to_string(),
                value: String::new(),
                reason: "Value cannot be empty".to_string(),
            });
        }
        validation::validate_range("enrichment.timeout_seconds", self.enrichment.timeout_seconds, 1, 300)?;
        validation::validate_range("enrichment.retry_attempts", self.enrichment.retry_attempts, 0, 5)?;

        validation::validate_positive_number("server.max_upload_mb", self.server.max_upload_mb, 1)?;
        if let Some(url) = &self.server.public_url {
            validation::validate_url("server.public_url", url)?;
        }

        validation::validate_path("output.directory", &self.output.directory)?;
        Ok(())
    }
}
