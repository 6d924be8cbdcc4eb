pub mod config;
pub mod delivery;
pub mod diagnostic_log;
pub mod errors;
pub mod handler;
pub mod metrics_defs;
pub mod payload;
pub mod response;

#[cfg(test)]
mod testutils;

use config::WebhookTarget;
use delivery::WebhookClient;
use diagnostic_log::DiagnosticLog;
use handler::RouteHook;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::sync::Arc;

pub async fn run(config: config::Config) -> errors::Result<()> {
    config.validate()?;
    shared::describe_metrics!(metrics_defs::ALL_METRICS);

    let target = config.webhook.url.clone();
    match &target {
        WebhookTarget::Configured(url) => {
            tracing::info!(webhook = %url, timeout_secs = config.webhook.timeout_secs, "forwarding city routes")
        }
        WebhookTarget::Unconfigured => {
            tracing::warn!("no webhook URL configured, city routes will not be forwarded")
        }
    }

    let delivery = Arc::new(WebhookClient::new(&config.webhook)?);
    let log = DiagnosticLog::new(config.diagnostic_log.path.clone());
    let is_ready = target.is_configured();
    let route_hook = RouteHook::new(target, delivery, log, config.max_body_bytes);

    let hook_task = run_http_service(&config.listener.host, config.listener.port, route_hook);
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::new(move || is_ready),
    );

    tokio::try_join!(hook_task, admin_task)?;
    Ok(())
}
