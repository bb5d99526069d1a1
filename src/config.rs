//! Startup configuration, read once from the environment (after `.env`).

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::summarize::SummaryStrategy;

const DEFAULT_API_BASE: &str = "https://api.github.com";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Clone)]
pub struct GithubSettings {
    pub token: String,
    /// `owner/name`
    pub repo: String,
    pub csv_path: String,
    pub branch: Option<String>,
    pub api_base: String,
}

impl fmt::Debug for GithubSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubSettings")
            .field("token", &"<redacted>")
            .field("repo", &self.repo)
            .field("csv_path", &self.csv_path)
            .field("branch", &self.branch)
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum StoreBackend {
    Github(GithubSettings),
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreBackend,
    pub store_timeout: Duration,
    pub summary_strategy: SummaryStrategy,
    pub vectorizer_path: PathBuf,
    pub classifier_path: PathBuf,
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required = |key: &'static str| var(key).ok_or(ConfigError::Missing(key));

        let store = match var("STORE_BACKEND").as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("github") => StoreBackend::Github(GithubSettings {
                token: required("GITHUB_TOKEN")?,
                repo: required("GITHUB_REPO")?,
                csv_path: required("CSV_PATH")?,
                branch: var("GITHUB_BRANCH"),
                api_base: var("GITHUB_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            }),
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "STORE_BACKEND",
                    value: other.to_string(),
                    reason: "expected `github` or `memory`".to_string(),
                })
            }
        };

        let timeout_secs = match var("STORE_TIMEOUT_SECS") {
            None => DEFAULT_TIMEOUT_SECS,
            Some(value) => value.parse::<u64>().map_err(|e| ConfigError::Invalid {
                key: "STORE_TIMEOUT_SECS",
                value: value.clone(),
                reason: e.to_string(),
            })?,
        }
        .max(1);

        let summary_strategy = match var("SUMMARY_STRATEGY") {
            None => SummaryStrategy::default(),
            Some(value) => value.parse()?,
        };

        let bind_addr = var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_addr = bind_addr.parse::<SocketAddr>().map_err(|e| ConfigError::Invalid {
            key: "BIND_ADDR",
            value: bind_addr.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            store,
            store_timeout: Duration::from_secs(timeout_secs),
            summary_strategy,
            vectorizer_path: var("VECTORIZER_PATH")
                .unwrap_or_else(|| "models/vectorizer.json".to_string())
                .into(),
            classifier_path: var("CLASSIFIER_PATH")
                .unwrap_or_else(|| "models/classifier.json".to_string())
                .into(),
            bind_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_github_defaults() {
        let cfg = config(&[
            ("GITHUB_TOKEN", "t0ken"),
            ("GITHUB_REPO", "acme/feedback"),
            ("CSV_PATH", "comments.csv"),
        ])
        .unwrap();

        let StoreBackend::Github(github) = &cfg.store else {
            panic!("expected github backend");
        };
        assert_eq!(github.api_base, DEFAULT_API_BASE);
        assert!(github.branch.is_none());
        assert_eq!(cfg.store_timeout, Duration::from_secs(10));
        assert_eq!(cfg.summary_strategy, SummaryStrategy::Aspect);
        assert_eq!(cfg.bind_addr.port(), 3000);
    }

    #[test]
    fn test_missing_github_secret() {
        let err = config(&[("GITHUB_REPO", "acme/feedback"), ("CSV_PATH", "c.csv")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("GITHUB_TOKEN")));
    }

    #[test]
    fn test_memory_backend_needs_no_secrets() {
        let cfg = config(&[
            ("STORE_BACKEND", "Memory"),
            ("SUMMARY_STRATEGY", "truncate"),
            ("STORE_TIMEOUT_SECS", "0"),
        ])
        .unwrap();
        assert!(matches!(cfg.store, StoreBackend::Memory));
        assert_eq!(cfg.summary_strategy, SummaryStrategy::Truncate);
        assert_eq!(cfg.store_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            config(&[("STORE_BACKEND", "s3")]).unwrap_err(),
            ConfigError::Invalid { key: "STORE_BACKEND", .. }
        ));
        assert!(matches!(
            config(&[("STORE_BACKEND", "memory"), ("STORE_TIMEOUT_SECS", "soon")]).unwrap_err(),
            ConfigError::Invalid { key: "STORE_TIMEOUT_SECS", .. }
        ));
    }

    #[test]
    fn test_token_is_redacted_in_debug() {
        let cfg = config(&[
            ("GITHUB_TOKEN", "super-secret"),
            ("GITHUB_REPO", "acme/feedback"),
            ("CSV_PATH", "comments.csv"),
        ])
        .unwrap();
        assert!(!format!("{:?}", cfg).contains("super-secret"));
    }
}
