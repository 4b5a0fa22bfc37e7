use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::agent::Agent;
use crate::api::AppState;
use crate::config::AppConfig;
use crate::error::ConfigError;
use crate::llm::{AnthropicAdapter, AnthropicConfig, LLMRouter};
use crate::store::{FileProfileStore, FileResumeSource, MemoryStore};
use crate::tools::{build_registry, Dispatcher};

pub const JOBS_FILE: &str = "jobs.json";
pub const PROFILE_FILE: &str = "user_profile.md";
pub const RESUME_FILE: &str = "resume.json";

/// Registers every provider that has keys and checks the selected one is among them.
pub fn build_llm_router(cfg: &AppConfig) -> Result<LLMRouter, ConfigError> {
    let mut router = LLMRouter::new(&cfg.agent.provider);

    if !cfg.llm_api_keys.is_empty() {
        let adapter = AnthropicAdapter::new(AnthropicConfig {
            api_keys: cfg.llm_api_keys.clone(),
            base_url: cfg.llm_base_url.clone(),
            model: cfg.agent.model.clone(),
            max_tokens: cfg.agent.max_tokens,
            temperature: cfg.agent.temperature,
            connect_timeout: Duration::from_secs(10),
        })
        .map_err(|err| ConfigError::Invalid {
            key: "LLM_PROVIDER".to_string(),
            message: err.to_string(),
        })?;
        router.register_provider("anthropic", Arc::new(adapter));
    } else if cfg.agent.provider == "anthropic" {
        return Err(ConfigError::Missing("LLM_API_KEY".to_string()));
    }

    if router.resolve(None).is_err() {
        return Err(ConfigError::Invalid {
            key: "LLM_PROVIDER".to_string(),
            message: format!(
                "unknown provider '{}', available: {}",
                cfg.agent.provider,
                router.provider_names().join(", ")
            ),
        });
    }
    Ok(router)
}

/// Wires the file-backed stores under `data_dir`, the tool catalog and the
/// agent into the shared HTTP state.
pub fn build_app_state(cfg: &AppConfig) -> anyhow::Result<AppState> {
    let router = build_llm_router(cfg)?;
    let registry = build_registry().context("building tool registry")?;
    let dispatcher = Dispatcher::new(Arc::new(registry));
    let agent = Agent::new(Arc::new(router), dispatcher, cfg.agent.clone());

    let store = MemoryStore::open(cfg.data_dir.join(JOBS_FILE))
        .with_context(|| format!("opening job store in {}", cfg.data_dir.display()))?;
    let profile = FileProfileStore::new(cfg.data_dir.join(PROFILE_FILE));
    let resume = FileResumeSource::new(cfg.data_dir.join(RESUME_FILE));

    Ok(
        AppState::new(Arc::new(agent), Arc::new(store), Arc::new(profile), Arc::new(resume))
            .with_credentials(cfg.credentials.clone())
            .with_endpoints(cfg.endpoints.clone()),
    )
}
