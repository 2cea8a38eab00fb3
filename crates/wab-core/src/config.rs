//! Configuration management
//!
//! 設定は以下の優先順位で読み込まれます:
//! 1. 環境変数
//! 2. wa-bridge.toml 設定ファイル
//! 3. デフォルト値
//!
//! 設定ファイル内では `${VAR_NAME}` 形式で環境変数を展開できます。

use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};

/// Default config file looked up by [`Config::load`]
pub const DEFAULT_CONFIG_FILE: &str = "wa-bridge.toml";

/// Dialogflow agent configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogflowConfig {
    /// Google Cloud project that owns the agent
    pub project_id: String,

    /// Language code sent with every query
    pub language_code: String,

    /// Path to the service account JSON key
    pub credentials_path: String,

    /// REST endpoint (regional endpoints or tests)
    pub api_base_url: String,

    /// Timeout for a single detectIntent call
    pub timeout_secs: u64,
}

impl Default for DialogflowConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            language_code: default_language_code(),
            credentials_path: String::new(),
            api_base_url: default_api_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Twilio webhook configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TwilioConfig {
    /// Auth token used to validate `X-Twilio-Signature`
    pub auth_token: Option<String>,

    /// Public URL Twilio posts to, exactly as configured in the console
    pub webhook_url: Option<String>,
}

impl TwilioConfig {
    /// Signatures are only checked when both the token and the public URL are known
    pub fn signature_validation_enabled(&self) -> bool {
        self.auth_token.is_some() && self.webhook_url.is_some()
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub webhook_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            webhook_path: default_webhook_path(),
        }
    }
}

/// Main configuration for wa-bridge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub dialogflow: DialogflowConfig,
    pub twilio: TwilioConfig,
    pub server: ServerConfig,
}

fn default_language_code() -> String {
    "en-US".to_string()
}

fn default_api_base_url() -> String {
    "https://dialogflow.googleapis.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_webhook_path() -> String {
    "/webhook/whatsapp".to_string()
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

impl Config {
    /// `${VAR_NAME}` 形式の文字列を環境変数の値に置換します。
    /// 環境変数が存在しない場合は空文字列になります。
    fn expand_env_vars<F>(value: &str, lookup: &F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut result = String::with_capacity(value.len());
        let mut rest = value;

        while let Some(start) = rest.find("${") {
            result.push_str(&rest[..start]);
            let after = &rest[start + 2..];

            match after.find('}') {
                Some(end) => {
                    let var_name = &after[..end];
                    if !var_name.is_empty() {
                        if let Some(env_value) = lookup(var_name) {
                            result.push_str(&env_value);
                        }
                    }
                    rest = &after[end + 1..];
                }
                None => {
                    // 閉じ括弧がない場合はそのまま残す
                    result.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }

        result.push_str(rest);
        result
    }

    /// TOML 設定ファイルから設定を読み込む
    ///
    /// 設定ファイル内の `${VAR_NAME}` は環境変数の値に置換され、
    /// その後に環境変数による上書きが適用されます。
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_toml_file_with(path, process_env)
    }

    /// Same as [`Config::from_toml_file`] with an explicit variable lookup
    pub fn from_toml_file_with<P, F>(path: P, lookup: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let path = path.as_ref();
        debug!("Loading configuration from {}", path.display());

        let toml_content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        Self::from_toml_str_with(&toml_content, lookup)
    }

    /// Parse a TOML document, expand `${VAR}` references and apply env overrides
    pub fn from_toml_str_with<F>(content: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let expanded = Self::expand_env_vars(content, &lookup);
        let toml: TomlConfig = toml::from_str(&expanded)?;

        let mut cfg = Self::from_toml_config(toml);
        cfg.apply_env_overrides(&lookup);
        cfg.validate()?;
        Ok(cfg)
    }

    /// デフォルトパスから設定を読み込む
    ///
    /// 1. `./wa-bridge.toml`
    /// 2. 見つからない場合は環境変数のみ
    pub fn load() -> Result<Self> {
        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            return Self::from_toml_file(DEFAULT_CONFIG_FILE);
        }

        Self::from_env()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(process_env)
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_env_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Config::default();
        cfg.apply_env_overrides(&lookup);
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations the bridge cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.dialogflow.project_id.trim().is_empty() {
            return Err(Error::Config(
                "Dialogflow Project ID not configured (DIALOGFLOW_PROJECT_ID)".to_string(),
            ));
        }
        if self.dialogflow.credentials_path.trim().is_empty() {
            return Err(Error::Config(
                "Dialogflow credentials not configured (DIALOGFLOW_CREDENTIALS_PATH or GOOGLE_APPLICATION_CREDENTIALS)"
                    .to_string(),
            ));
        }
        if self.dialogflow.language_code.trim().is_empty() {
            return Err(Error::Config("Language code must not be empty".to_string()));
        }
        if !self.server.webhook_path.starts_with('/') {
            return Err(Error::Config(format!(
                "Webhook path must start with '/': {}",
                self.server.webhook_path
            )));
        }
        Ok(())
    }

    /// TOML 構造から Config を構築
    fn from_toml_config(toml: TomlConfig) -> Self {
        let dialogflow = toml.dialogflow.unwrap_or_default();
        let twilio = toml.twilio.unwrap_or_default();
        let server = toml.server.unwrap_or_default();

        Config {
            dialogflow: DialogflowConfig {
                project_id: dialogflow.project_id.unwrap_or_default(),
                language_code: dialogflow
                    .language_code
                    .unwrap_or_else(default_language_code),
                credentials_path: dialogflow.credentials_path.unwrap_or_default(),
                api_base_url: dialogflow
                    .api_base_url
                    .unwrap_or_else(default_api_base_url),
                timeout_secs: dialogflow.timeout_secs.unwrap_or_else(default_timeout_secs),
            },
            twilio: TwilioConfig {
                auth_token: twilio.auth_token.filter(|s| !s.is_empty()),
                webhook_url: twilio.webhook_url.filter(|s| !s.is_empty()),
            },
            server: ServerConfig {
                host: server.host.unwrap_or_else(default_host),
                port: server.port.unwrap_or_else(default_port),
                webhook_path: server.webhook_path.unwrap_or_else(default_webhook_path),
            },
        }
    }

    /// 環境変数で設定を上書きする (空文字列は未設定として扱う)
    fn apply_env_overrides<F>(&mut self, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // Dialogflow 設定の上書き
        if let Some(project_id) = var("DIALOGFLOW_PROJECT_ID") {
            self.dialogflow.project_id = project_id;
        }
        if let Some(language_code) = var("LANGUAGE_CODE") {
            self.dialogflow.language_code = language_code;
        }
        if let Some(path) =
            var("DIALOGFLOW_CREDENTIALS_PATH").or_else(|| var("GOOGLE_APPLICATION_CREDENTIALS"))
        {
            self.dialogflow.credentials_path = path;
        }
        if let Some(url) = var("DIALOGFLOW_API_BASE_URL") {
            self.dialogflow.api_base_url = url;
        }
        if let Some(secs) = var("DIALOGFLOW_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            self.dialogflow.timeout_secs = secs;
        }

        // Twilio 設定の上書き
        if let Some(token) = var("TWILIO_AUTH_TOKEN") {
            self.twilio.auth_token = Some(token);
        }
        if let Some(url) = var("TWILIO_WEBHOOK_URL") {
            self.twilio.webhook_url = Some(url);
        }

        // Server 設定の上書き
        if let Some(host) = var("HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(path) = var("WEBHOOK_PATH") {
            self.server.webhook_path = path;
        }
    }
}

// ============================================================================
// TOML 構造体定義（ファイル解析用）
// ============================================================================

#[derive(Debug, Deserialize)]
struct TomlConfig {
    dialogflow: Option<TomlDialogflowConfig>,
    twilio: Option<TomlTwilioConfig>,
    server: Option<TomlServerConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlDialogflowConfig {
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    language_code: Option<String>,
    #[serde(default)]
    credentials_path: Option<String>,
    #[serde(default)]
    api_base_url: Option<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlTwilioConfig {
    #[serde(default)]
    auth_token: Option<String>,
    #[serde(default)]
    webhook_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlServerConfig {
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    webhook_path: Option<String>,
}
