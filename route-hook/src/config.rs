use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str = "Telegram-City-Selection-Webhook/1.0";
pub const DEFAULT_LOG_PATH: &str = "webhook_city_log.txt";
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Host fragment of the sample URL shipped in setup guides.
const PLACEHOLDER_HOST: &str = "your-n8n-domain";

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Webhook timeout cannot be 0")]
    InvalidTimeout,

    #[error("Webhook user agent cannot be empty")]
    EmptyUserAgent,

    #[error("Request body limit cannot be 0")]
    InvalidBodyLimit,

    #[error("Invalid webhook URL {url:?}: {source}")]
    InvalidWebhookUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("Unsupported webhook URL scheme: {0}")]
    UnsupportedScheme(String),
}

/// Route hook configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener for relay requests
    pub listener: Listener,
    /// Admin listener for health and readiness probes
    pub admin_listener: Listener,
    /// Downstream webhook the events are forwarded to
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub diagnostic_log: DiagnosticLogConfig,
    /// Request bodies larger than this are rejected as invalid
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Config {
    /// Validates the route hook configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;
        self.webhook.validate()?;

        if self.max_body_bytes == 0 {
            return Err(ValidationError::InvalidBodyLimit);
        }

        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    /// Validates the listener configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Where delivered events go.
///
/// Decided once when the config is loaded. An absent, null or empty `url`, or
/// one still pointing at the placeholder host, leaves the relay unconfigured:
/// requests are answered but nothing is sent.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(try_from = "Option<String>")]
pub enum WebhookTarget {
    #[default]
    Unconfigured,
    Configured(Url),
}

impl WebhookTarget {
    pub fn is_configured(&self) -> bool {
        matches!(self, WebhookTarget::Configured(_))
    }
}

impl TryFrom<Option<String>> for WebhookTarget {
    type Error = ValidationError;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        let raw = match value.as_deref().map(str::trim) {
            None | Some("") => return Ok(WebhookTarget::Unconfigured),
            Some(raw) if raw.contains(PLACEHOLDER_HOST) => return Ok(WebhookTarget::Unconfigured),
            Some(raw) => raw,
        };

        let url = Url::parse(raw).map_err(|source| ValidationError::InvalidWebhookUrl {
            url: raw.to_string(),
            source,
        })?;

        match url.scheme() {
            "https" | "http" => Ok(WebhookTarget::Configured(url)),
            other => Err(ValidationError::UnsupportedScheme(other.to_string())),
        }
    }
}

/// Downstream webhook configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct WebhookConfig {
    #[serde(default)]
    pub url: WebhookTarget,
    /// Total time allowed for one delivery, from connect to the last body byte
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl WebhookConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        if self.user_agent.trim().is_empty() {
            return Err(ValidationError::EmptyUserAgent);
        }
        Ok(())
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: WebhookTarget::Unconfigured,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: default_user_agent(),
        }
    }
}

/// Diagnostic log file configuration. A null `path` disables the log.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct DiagnosticLogConfig {
    #[serde(default = "default_log_path")]
    pub path: Option<PathBuf>,
}

impl Default for DiagnosticLogConfig {
    fn default() -> Self {
        Self {
            path: default_log_path(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_log_path() -> Option<PathBuf> {
    Some(PathBuf::from(DEFAULT_LOG_PATH))
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_config() {
        let yaml = r#"
listener:
    host: "0.0.0.0"
    port: 3000
admin_listener:
    host: "127.0.0.1"
    port: 3001
webhook:
    url: "https://automation.example.com/webhook/form/route"
    timeout_secs: 10
diagnostic_log:
    path: /var/log/route-hook/webhook_city_log.txt
max_body_bytes: 4096
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());

        assert_eq!(config.listener.port, 3000);
        assert_eq!(
            config.webhook.url,
            WebhookTarget::Configured(
                Url::parse("https://automation.example.com/webhook/form/route").unwrap()
            )
        );
        assert_eq!(config.webhook.timeout_secs, 10);
        assert_eq!(config.webhook.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(
            config.diagnostic_log.path,
            Some(PathBuf::from("/var/log/route-hook/webhook_city_log.txt"))
        );
        assert_eq!(config.max_body_bytes, 4096);
    }

    #[test]
    fn test_defaults() {
        let yaml = r#"
listener: {host: "0.0.0.0", port: 3000}
admin_listener: {host: "127.0.0.1", port: 3001}
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.webhook, WebhookConfig::default());
        assert!(!config.webhook.url.is_configured());
        assert_eq!(config.webhook.timeout_secs, 30);
        assert_eq!(
            config.diagnostic_log.path,
            Some(PathBuf::from(DEFAULT_LOG_PATH))
        );
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    fn test_unconfigured_webhook() {
        for url in ["", "   ", "~", "https://your-n8n-domain.com/webhook/city-route"] {
            let yaml = format!("url: {url}");
            let webhook: WebhookConfig = serde_yaml::from_str(&yaml).unwrap();
            assert_eq!(webhook.url, WebhookTarget::Unconfigured, "url: {url:?}");
        }

        let webhook: WebhookConfig = serde_yaml::from_str("timeout_secs: 5").unwrap();
        assert_eq!(webhook.url, WebhookTarget::Unconfigured);
    }

    #[test]
    fn test_disabled_diagnostic_log() {
        let log: DiagnosticLogConfig = serde_yaml::from_str("path: null").unwrap();
        assert_eq!(log.path, None);
    }

    #[test]
    fn test_webhook_target_errors() {
        assert!(matches!(
            WebhookTarget::try_from(Some("not a url".to_string())),
            Err(ValidationError::InvalidWebhookUrl { .. })
        ));
        assert_eq!(
            WebhookTarget::try_from(Some("ftp://files.example.com/hook".to_string())),
            Err(ValidationError::UnsupportedScheme("ftp".to_string()))
        );

        assert!(serde_yaml::from_str::<WebhookConfig>("url: not-a-url").is_err());
    }

    #[test]
    fn test_validation_errors() {
        let base_config = Config {
            listener: Listener {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            admin_listener: Listener {
                host: "127.0.0.1".to_string(),
                port: 3001,
            },
            webhook: WebhookConfig::default(),
            diagnostic_log: DiagnosticLogConfig::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        };
        assert!(base_config.validate().is_ok());

        let mut config = base_config.clone();
        config.admin_listener.port = 0;
        assert_eq!(config.validate(), Err(ValidationError::InvalidPort));

        let mut config = base_config.clone();
        config.webhook.timeout_secs = 0;
        assert_eq!(config.validate(), Err(ValidationError::InvalidTimeout));

        let mut config = base_config.clone();
        config.webhook.user_agent = " ".to_string();
        assert_eq!(config.validate(), Err(ValidationError::EmptyUserAgent));

        let mut config = base_config;
        config.max_body_bytes = 0;
        assert_eq!(config.validate(), Err(ValidationError::InvalidBodyLimit));
    }

    #[test]
    fn test_deserialization_errors() {
        // Invalid port type
        assert!(
            serde_yaml::from_str::<Config>(
                r#"
listener: {host: "0.0.0.0", port: "not_a_number"}
admin_listener: {host: "127.0.0.1", port: 3001}
"#
            )
            .is_err()
        );

        // Missing required field
        assert!(
            serde_yaml::from_str::<Config>(
                r#"
listener: {host: "0.0.0.0"}
"#
            )
            .is_err()
        );
    }
}
