//! Process configuration: read from the environment once at startup,
//! validated, and published as an immutable snapshot.
//!
//! Environment variables are the sole configuration source. Any missing or
//! malformed required value aborts startup; nothing here is re-read later.

use std::path::PathBuf;

use thiserror::Error;
use tracing::warn;

use llm_gateway::{LlmConfig, LlmProvider};
use notifier::NotifierConfig;
use scm_client::ScmConfig;

/// Convenient result alias for config loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is missing or empty.
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// A number failed to parse (ports, limits, timeouts).
    #[error("invalid number in {var}: {reason}")]
    InvalidNumber {
        var: &'static str,
        reason: &'static str,
    },

    /// Value had the wrong format (e.g. invalid URL scheme).
    #[error("invalid format in {var}: {reason}")]
    InvalidFormat {
        var: &'static str,
        reason: &'static str,
    },

    /// Unsupported provider in `LLM_PROVIDER`.
    #[error("unsupported llm provider: {0}")]
    UnsupportedProvider(String),

    /// A configured file path does not exist.
    #[error("{var} points at a missing file: {path}")]
    MissingFile { var: &'static str, path: String },
}

/// The process-wide configuration snapshot. Built once, then shared
/// read-only for the rest of the process lifetime.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub scm: ScmConfig,
    pub llm: LlmConfig,
    pub notifier: NotifierConfig,
    /// When present, webhook deliveries must carry a valid HMAC signature.
    pub webhook_secret: Option<String>,
    pub store_url: String,
    pub server_host: String,
    pub server_bind_port: u16,
    pub queue_capacity: usize,
    pub worker_count: usize,
    pub shutdown_grace_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> ConfigResult<Self> {
        // --- SCM ---------------------------------------------------------
        let scm_base_url = must_env("SCM_BASE_URL")?;
        validate_http_endpoint("SCM_BASE_URL", &scm_base_url)?;
        let scm_token = must_env("SCM_TOKEN")?;
        let ssl_verify = env_bool("SCM_SSL_VERIFY", true)?;
        if !ssl_verify {
            warn!("SCM_SSL_VERIFY=false: certificate verification disabled for SCM traffic");
        }

        let ca_bundle_path = match env_opt("SCM_CA_BUNDLE_PATH") {
            Some(raw) => {
                let path = PathBuf::from(&raw);
                if !path.is_file() {
                    return Err(ConfigError::MissingFile {
                        var: "SCM_CA_BUNDLE_PATH",
                        path: raw,
                    });
                }
                Some(path)
            }
            None => None,
        };

        let scm = ScmConfig {
            base_url: scm_base_url,
            token: scm_token,
            ssl_verify,
            ca_bundle_path,
            timeout_secs: env_u64("SCM_TIMEOUT_SECONDS", 30)?,
        };

        // --- LLM ---------------------------------------------------------
        let provider = match env_opt("LLM_PROVIDER") {
            Some(raw) => {
                LlmProvider::parse(&raw).ok_or(ConfigError::UnsupportedProvider(raw))?
            }
            None => LlmProvider::HostedChat,
        };

        let endpoint =
            env_opt("LLM_ENDPOINT").unwrap_or_else(|| provider.default_endpoint().to_string());
        validate_http_endpoint("LLM_ENDPOINT", &endpoint)?;

        let api_key = env_opt("LLM_API_KEY");
        if provider == LlmProvider::HostedChat && api_key.is_none() {
            return Err(ConfigError::MissingVar("LLM_API_KEY"));
        }

        let llm = LlmConfig {
            provider,
            endpoint,
            api_key,
            model: env_opt("LLM_MODEL").unwrap_or_else(|| provider.default_model().to_string()),
            timeout_secs: env_u64("LLM_TIMEOUT_SECONDS", 60)?,
        };

        // --- Notifier ----------------------------------------------------
        let notifier_endpoint = must_env("NOTIFIER_ENDPOINT")?;
        validate_http_endpoint("NOTIFIER_ENDPOINT", &notifier_endpoint)?;

        let notifier = NotifierConfig {
            endpoint: notifier_endpoint,
            from_address: must_env("NOTIFIER_FROM_ADDRESS")?,
            opt_out: env_bool("NOTIFIER_OPT_OUT", false)?,
            timeout_secs: env_u64("NOTIFIER_TIMEOUT_SECONDS", 15)?,
        };

        // --- Server / queue ----------------------------------------------
        let worker_count = env_u64("WORKER_COUNT", 4)?.max(1) as usize;
        let queue_capacity = env_u64("QUEUE_CAPACITY", 128)?.max(1) as usize;

        Ok(Self {
            scm,
            llm,
            notifier,
            webhook_secret: env_opt("WEBHOOK_SECRET"),
            store_url: env_opt("STORE_URL").unwrap_or_else(|| "data/review-relay.db".to_string()),
            server_host: env_opt("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            server_bind_port: env_u16("SERVER_BIND_PORT", 8090)?,
            queue_capacity,
            worker_count,
            shutdown_grace_secs: env_u64("SHUTDOWN_GRACE_SECONDS", 30)?,
        })
    }
}

/* ------------------------ env helpers ------------------------ */

/// Fetches a required, non-empty environment variable.
fn must_env(name: &'static str) -> ConfigResult<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

/// Optional variable; unset and empty are both `None`.
fn env_opt(name: &'static str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_bool(name: &'static str, default: bool) -> ConfigResult<bool> {
    match env_opt(name) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFormat {
                var: name,
                reason: "expected a boolean (true/false)",
            }),
        },
    }
}

fn env_u64(name: &'static str, default: u64) -> ConfigResult<u64> {
    match env_opt(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidNumber {
            var: name,
            reason: "expected an unsigned integer",
        }),
    }
}

fn env_u16(name: &'static str, default: u16) -> ConfigResult<u16> {
    match env_opt(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::InvalidNumber {
            var: name,
            reason: "expected a port number",
        }),
    }
}

fn validate_http_endpoint(var: &'static str, value: &str) -> ConfigResult<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidFormat {
            var,
            reason: "must start with http:// or https://",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [
            "SCM_BASE_URL",
            "SCM_TOKEN",
            "SCM_SSL_VERIFY",
            "SCM_CA_BUNDLE_PATH",
            "SCM_TIMEOUT_SECONDS",
            "LLM_PROVIDER",
            "LLM_ENDPOINT",
            "LLM_API_KEY",
            "LLM_MODEL",
            "LLM_TIMEOUT_SECONDS",
            "WEBHOOK_SECRET",
            "NOTIFIER_ENDPOINT",
            "NOTIFIER_FROM_ADDRESS",
            "NOTIFIER_OPT_OUT",
            "NOTIFIER_TIMEOUT_SECONDS",
            "STORE_URL",
            "SERVER_HOST",
            "SERVER_BIND_PORT",
            "QUEUE_CAPACITY",
            "WORKER_COUNT",
            "SHUTDOWN_GRACE_SECONDS",
        ] {
            unsafe { std::env::remove_var(var) };
        }
    }

    fn set_minimum() {
        unsafe {
            std::env::set_var("SCM_BASE_URL", "https://git.example.com");
            std::env::set_var("SCM_TOKEN", "token");
            std::env::set_var("LLM_PROVIDER", "local_model_server");
            std::env::set_var("NOTIFIER_ENDPOINT", "http://mail.example.com/send");
            std::env::set_var("NOTIFIER_FROM_ADDRESS", "reviews@example.com");
        }
    }

    #[test]
    #[serial]
    fn minimal_local_provider_config_loads_with_defaults() {
        clear_env();
        set_minimum();

        let cfg = AppConfig::from_env().expect("config loads");
        assert_eq!(cfg.llm.provider, LlmProvider::LocalModelServer);
        assert_eq!(cfg.llm.endpoint, "http://localhost:11434");
        assert_eq!(cfg.llm.model, "qwen2.5-coder");
        assert_eq!(cfg.llm.timeout_secs, 60);
        assert_eq!(cfg.scm.timeout_secs, 30);
        assert!(cfg.scm.ssl_verify);
        assert_eq!(cfg.store_url, "data/review-relay.db");
        assert_eq!(cfg.server_bind_port, 8090);
        assert_eq!(cfg.queue_capacity, 128);
        assert_eq!(cfg.worker_count, 4);
        assert_eq!(cfg.webhook_secret, None);
    }

    #[test]
    #[serial]
    fn hosted_chat_requires_an_api_key() {
        clear_env();
        set_minimum();
        unsafe { std::env::set_var("LLM_PROVIDER", "hosted_chat") };

        let err = AppConfig::from_env().expect_err("must fail");
        assert!(matches!(err, ConfigError::MissingVar("LLM_API_KEY")));

        unsafe { std::env::set_var("LLM_API_KEY", "sk-test") };
        let cfg = AppConfig::from_env().expect("config loads with key");
        assert_eq!(cfg.llm.endpoint, "https://api.openai.com");
        assert_eq!(cfg.llm.model, "gpt-4o-mini");
    }

    #[test]
    #[serial]
    fn missing_scm_base_url_aborts() {
        clear_env();
        set_minimum();
        unsafe { std::env::remove_var("SCM_BASE_URL") };
        assert!(matches!(
            AppConfig::from_env().expect_err("must fail"),
            ConfigError::MissingVar("SCM_BASE_URL")
        ));
    }

    #[test]
    #[serial]
    fn unknown_provider_is_rejected() {
        clear_env();
        set_minimum();
        unsafe { std::env::set_var("LLM_PROVIDER", "mainframe") };
        assert!(matches!(
            AppConfig::from_env().expect_err("must fail"),
            ConfigError::UnsupportedProvider(_)
        ));
    }

    #[test]
    #[serial]
    fn malformed_numbers_are_rejected() {
        clear_env();
        set_minimum();
        unsafe { std::env::set_var("SERVER_BIND_PORT", "eighty") };
        assert!(matches!(
            AppConfig::from_env().expect_err("must fail"),
            ConfigError::InvalidNumber { var: "SERVER_BIND_PORT", .. }
        ));
    }

    #[test]
    #[serial]
    fn non_http_notifier_endpoint_is_rejected() {
        clear_env();
        set_minimum();
        unsafe { std::env::set_var("NOTIFIER_ENDPOINT", "mail.example.com") };
        assert!(matches!(
            AppConfig::from_env().expect_err("must fail"),
            ConfigError::InvalidFormat { var: "NOTIFIER_ENDPOINT", .. }
        ));
    }
}
