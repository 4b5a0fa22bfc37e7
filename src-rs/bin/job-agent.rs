use anyhow::Context;
use tracing::info;

use job_agent_rs::api::AgentServer;
use job_agent_rs::config::AppConfig;
use job_agent_rs::helpers::build_app_state;
use job_agent_rs::logging::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = AppConfig::from_env().context("loading configuration")?;
    init_logging(&cfg.log_level, cfg.log_format);
    cfg.ensure_data_dir()?;

    let state = build_app_state(&cfg)?;
    info!(
        provider = %cfg.agent.provider,
        model = %cfg.agent.model,
        data_dir = %cfg.data_dir.display(),
        "job agent starting"
    );

    AgentServer::new(cfg.port, state)
        .start()
        .await
        .map_err(|err| anyhow::anyhow!("server error: {}", err))
}
