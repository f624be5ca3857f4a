use crate::models::GovernorConfig;
use crate::policy::build_service;
use crate::server::start_server;
use crate::Result;

/// Start the evaluation server; `port` overrides the configured one
pub async fn run(config: &GovernorConfig, port: Option<u16>) -> Result<()> {
    let mut server = config.server.clone();
    if let Some(port) = port {
        server.port = port;
    }

    let service = build_service(&config.decision);
    start_server(&server, service).await
}
