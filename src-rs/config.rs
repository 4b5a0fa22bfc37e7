use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::tools::{Credentials, Endpoints};

/// Session-level settings for one agent.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub provider: String,
    pub model: String,
    pub max_tool_rounds: usize,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-5".to_string(),
            max_tool_rounds: 20,
            temperature: 0.3,
            max_tokens: 4096,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" | "" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}', expected pretty or json", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub log_level: String,
    pub log_format: LogFormat,
    pub agent: AgentConfig,
    pub llm_api_keys: Vec<String>,
    pub llm_base_url: String,
    pub credentials: Credentials,
    pub endpoints: Endpoints,
}

impl AppConfig {
    /// Loads `.env` when present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = AgentConfig::default();
        let endpoint_defaults = Endpoints::default();

        let agent = AgentConfig {
            provider: get("LLM_PROVIDER").unwrap_or(defaults.provider),
            model: get("LLM_MODEL").unwrap_or(defaults.model),
            max_tool_rounds: parse(&get, "MAX_TOOL_ROUNDS", defaults.max_tool_rounds)?,
            temperature: parse(&get, "LLM_TEMPERATURE", defaults.temperature)?,
            max_tokens: parse(&get, "LLM_MAX_TOKENS", defaults.max_tokens)?,
        };

        Ok(Self {
            port: parse(&get, "PORT", 8080)?,
            data_dir: PathBuf::from(get("DATA_DIR").unwrap_or_else(|| "./data".to_string())),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format: parse(&get, "LOG_FORMAT", LogFormat::Pretty)?,
            agent,
            llm_api_keys: load_keys(&get, "LLM_API_KEY"),
            llm_base_url: get("LLM_BASE_URL").unwrap_or_default(),
            credentials: Credentials {
                jsearch_api_key: get("JSEARCH_API_KEY"),
                adzuna_app_id: get("ADZUNA_APP_ID"),
                adzuna_app_key: get("ADZUNA_APP_KEY"),
                adzuna_country: Some(get("ADZUNA_COUNTRY").unwrap_or_else(|| "us".to_string())),
                search_api_key: get("SEARCH_API_KEY"),
            },
            endpoints: Endpoints {
                jsearch: get("JSEARCH_BASE_URL").unwrap_or(endpoint_defaults.jsearch),
                adzuna: get("ADZUNA_BASE_URL").unwrap_or(endpoint_defaults.adzuna),
                tavily: get("TAVILY_BASE_URL").unwrap_or(endpoint_defaults.tavily),
            },
        })
    }

    pub fn ensure_data_dir(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_dir).map_err(|err| ConfigError::Invalid {
            key: "DATA_DIR".to_string(),
            message: format!("cannot create {}: {}", self.data_dir.display(), err),
        })
    }
}

fn parse<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|err| ConfigError::Invalid {
            key: key.to_string(),
            message: err.to_string(),
        }),
    }
}

/// `<KEY>` as a comma-separated list, followed by `<KEY>_2` .. `<KEY>_10`.
fn load_keys<G>(get: &G, primary: &str) -> Vec<String>
where
    G: Fn(&str) -> Option<String>,
{
    let mut keys: Vec<String> = get(primary)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    for idx in 2..=10 {
        if let Some(value) = get(&format!("{}_{}", primary, idx)) {
            keys.push(value);
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.agent.max_tool_rounds, 20);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert_eq!(cfg.credentials.adzuna_country.as_deref(), Some("us"));
        assert!(cfg.llm_api_keys.is_empty());
        assert!(!cfg.credentials.has_jsearch());
    }

    #[test]
    fn keys_are_collected_in_order() {
        let cfg = config(&[
            ("LLM_API_KEY", "a, b"),
            ("LLM_API_KEY_3", "d"),
            ("LLM_API_KEY_2", "c"),
        ])
        .unwrap();
        assert_eq!(cfg.llm_api_keys, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn invalid_numbers_name_the_key() {
        let err = config(&[("MAX_TOOL_ROUNDS", "lots")]).unwrap_err();
        assert!(err.to_string().contains("MAX_TOOL_ROUNDS"));
        let err = config(&[("LOG_FORMAT", "xml")]).unwrap_err();
        assert!(err.to_string().contains("LOG_FORMAT"));
    }
}
