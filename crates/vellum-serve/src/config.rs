//! Application configuration loaded from environment variables.

use std::collections::HashSet;
use std::path::PathBuf;

use vellum_core::SecurityPolicy;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080").
    pub bind_addr: String,

    /// Directory of markdown posts consumed by the content index.
    pub content_dir: PathBuf,

    /// Directory holding the counter-store JSON files.
    pub data_dir: PathBuf,

    /// Public base URL, used in feed links and share cards.
    pub base_url: String,

    /// Site name shown in feeds and share cards.
    pub site_name: String,

    /// Site description used as feed subtitle and share-card fallback.
    pub site_description: String,

    /// Default author for posts that do not set one.
    pub site_author: String,

    /// Production mode; outside production CORS falls back to `*`.
    pub production: bool,

    /// Admin IP whitelist. `None` disables the check.
    pub ip_whitelist: Option<HashSet<String>>,

    /// Valid API keys for operational endpoints. Empty disables the check.
    pub api_keys: HashSet<String>,

    /// Admin bearer token. `None` disables the check.
    pub admin_token: Option<String>,

    /// Origins allowed to make cross-origin requests in production.
    pub allowed_origins: HashSet<String>,

    /// Maximum accepted request body size in bytes.
    pub max_request_bytes: usize,

    /// Whether the security event log records anything.
    pub monitoring_enabled: bool,

    /// Failed-attempt count above which `should_alert` fires.
    pub alert_threshold: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// All variables are optional and default to a local development setup:
    /// - `VELLUM_BIND_ADDR` (default "0.0.0.0:8080")
    /// - `VELLUM_CONTENT_DIR` (default "content")
    /// - `VELLUM_DATA_DIR` (default "data")
    /// - `VELLUM_BASE_URL` (default "http://localhost:8080")
    /// - `VELLUM_SITE_NAME`, `VELLUM_SITE_DESCRIPTION`, `VELLUM_SITE_AUTHOR`
    /// - `VELLUM_ENV` ("production" enables strict CORS)
    /// - `VELLUM_IP_WHITELIST`: comma-separated IPs; unset disables the check
    /// - `VELLUM_API_KEYS`: comma-separated keys; unset disables the check
    /// - `VELLUM_ADMIN_TOKEN`: admin bearer token; unset disables the check
    /// - `VELLUM_ALLOWED_ORIGINS`: comma-separated origins
    /// - `VELLUM_MAX_REQUEST_BYTES` (default 1048576)
    /// - `VELLUM_MONITORING` ("off" disables the security event log)
    /// - `VELLUM_ALERT_THRESHOLD` (default 10)
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr = env_or("VELLUM_BIND_ADDR", "0.0.0.0:8080");
        let content_dir = PathBuf::from(env_or("VELLUM_CONTENT_DIR", "content"));
        let data_dir = PathBuf::from(env_or("VELLUM_DATA_DIR", "data"));

        let base_url = env_or("VELLUM_BASE_URL", "http://localhost:8080")
            .trim_end_matches('/')
            .to_string();
        let site_name = env_or("VELLUM_SITE_NAME", "Vellum");
        let site_description = env_or("VELLUM_SITE_DESCRIPTION", "A personal blog");
        let site_author = env_or("VELLUM_SITE_AUTHOR", "Vellum");

        let production = env_or("VELLUM_ENV", "development").eq_ignore_ascii_case("production");

        let ip_whitelist = std::env::var("VELLUM_IP_WHITELIST")
            .ok()
            .map(|raw| split_csv(&raw));
        let api_keys = std::env::var("VELLUM_API_KEYS")
            .map(|raw| split_csv(&raw))
            .unwrap_or_default();
        let admin_token = std::env::var("VELLUM_ADMIN_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());
        let allowed_origins = std::env::var("VELLUM_ALLOWED_ORIGINS")
            .map(|raw| split_csv(&raw))
            .unwrap_or_default();

        let max_request_bytes = std::env::var("VELLUM_MAX_REQUEST_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1024 * 1024);

        let monitoring_enabled = !env_or("VELLUM_MONITORING", "on").eq_ignore_ascii_case("off");
        let alert_threshold = std::env::var("VELLUM_ALERT_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        tracing::info!(
            bind_addr = %bind_addr,
            content_dir = %content_dir.display(),
            data_dir = %data_dir.display(),
            production,
            whitelist = ip_whitelist.as_ref().map(|w| w.len()),
            api_keys = api_keys.len(),
            admin_token = admin_token.is_some(),
            origins = allowed_origins.len(),
            "configuration loaded"
        );

        Ok(Self {
            bind_addr,
            content_dir,
            data_dir,
            base_url,
            site_name,
            site_description,
            site_author,
            production,
            ip_whitelist,
            api_keys,
            admin_token,
            allowed_origins,
            max_request_bytes,
            monitoring_enabled,
            alert_threshold,
        })
    }

    /// Security policy derived from this configuration.
    pub fn security_policy(&self) -> SecurityPolicy {
        SecurityPolicy {
            ip_whitelist: self.ip_whitelist.clone(),
            api_keys: self.api_keys.clone(),
            admin_token: self.admin_token.clone(),
            allowed_origins: self.allowed_origins.clone(),
            production: self.production,
            max_request_bytes: self.max_request_bytes,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn split_csv(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize config tests that manipulate env vars.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "VELLUM_BIND_ADDR",
        "VELLUM_CONTENT_DIR",
        "VELLUM_DATA_DIR",
        "VELLUM_BASE_URL",
        "VELLUM_SITE_NAME",
        "VELLUM_SITE_DESCRIPTION",
        "VELLUM_SITE_AUTHOR",
        "VELLUM_ENV",
        "VELLUM_IP_WHITELIST",
        "VELLUM_API_KEYS",
        "VELLUM_ADMIN_TOKEN",
        "VELLUM_ALLOWED_ORIGINS",
        "VELLUM_MAX_REQUEST_BYTES",
        "VELLUM_MONITORING",
        "VELLUM_ALERT_THRESHOLD",
    ];

    /// Helper to run config tests with isolated env vars.
    fn with_env_vars<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
        let _guard = ENV_MUTEX.lock().unwrap();

        let saved: Vec<_> = ENV_KEYS
            .iter()
            .map(|k| (*k, std::env::var(k).ok()))
            .collect();

        for k in ENV_KEYS {
            std::env::remove_var(k);
        }
        for (k, v) in vars {
            std::env::set_var(k, v);
        }

        f();

        for (k, v) in &saved {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }
    }

    #[test]
    fn config_defaults() {
        with_env_vars(&[], || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.bind_addr, "0.0.0.0:8080");
            assert_eq!(config.base_url, "http://localhost:8080");
            assert!(!config.production);
            assert!(config.ip_whitelist.is_none());
            assert!(config.api_keys.is_empty());
            assert!(config.admin_token.is_none());
            assert_eq!(config.max_request_bytes, 1024 * 1024);
            assert!(config.monitoring_enabled);
            assert_eq!(config.alert_threshold, 10);
        });
    }

    #[test]
    fn config_base_url_trailing_slash_stripped() {
        with_env_vars(&[("VELLUM_BASE_URL", "https://blog.example/")], || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.base_url, "https://blog.example");
        });
    }

    #[test]
    fn config_production_mode() {
        with_env_vars(&[("VELLUM_ENV", "Production")], || {
            assert!(Config::from_env().unwrap().production);
        });
    }

    #[test]
    fn config_csv_lists_parsed() {
        with_env_vars(
            &[
                ("VELLUM_API_KEYS", "k1, k2,,"),
                ("VELLUM_IP_WHITELIST", "10.0.0.1"),
                ("VELLUM_ALLOWED_ORIGINS", "https://a.example,https://b.example"),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.api_keys.len(), 2);
                assert_eq!(config.ip_whitelist.as_ref().unwrap().len(), 1);
                assert_eq!(config.allowed_origins.len(), 2);
            },
        );
    }

    #[test]
    fn config_empty_admin_token_disables_check() {
        with_env_vars(&[("VELLUM_ADMIN_TOKEN", "  ")], || {
            let config = Config::from_env().unwrap();
            assert!(config.admin_token.is_none());
        });
    }

    #[test]
    fn policy_mirrors_config() {
        with_env_vars(
            &[("VELLUM_ADMIN_TOKEN", "sekrit"), ("VELLUM_ENV", "production")],
            || {
                let policy = Config::from_env().unwrap().security_policy();
                assert!(policy.production);
                assert!(policy.validate_admin_token(Some("sekrit")));
                assert!(!policy.validate_admin_token(None));
            },
        );
    }

    #[test]
    fn config_monitoring_toggle() {
        with_env_vars(&[("VELLUM_MONITORING", "off")], || {
            assert!(!Config::from_env().unwrap().monitoring_enabled);
        });
    }
}
