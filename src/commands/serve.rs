use anyhow::Result;
use app_profiler::config::ProfilerConfig;
use app_profiler::server;

/// Execute the serve command
pub async fn execute(cfg: ProfilerConfig) -> Result<()> {
    if !cfg.enabled {
        tracing::warn!("Recording is disabled; the API will report status 'disabled'");
    }

    server::start_server(cfg).await
}
