use anyhow::{Context, Result};
use pingora::prelude::*;
use pingora::server::Server;

use crate::config::GatekeeperConfig;
use crate::proxy::GatekeeperGateway;
use crate::runtime::build_pipeline;

/// Build the filter pipeline and run the Pingora server forever. Upstream
/// proxying uses a single fixed peer; load balancing and TLS termination
/// toward the upstream are out of scope, the pipeline itself is the thing
/// being served.
pub fn run(cfg: GatekeeperConfig) -> Result<()> {
    let mut server = Server::new(None)?;
    server.bootstrap();

    let pipeline = build_pipeline(&cfg).context("failed to build filter pipeline")?;
    let gateway = GatekeeperGateway::new(std::sync::Arc::new(pipeline), &cfg.upstream)?;

    let mut svc = http_proxy_service(&server.configuration, gateway);
    svc.add_tcp(&cfg.server.listen);
    server.add_service(svc);

    #[cfg(feature = "prometheus")]
    if let Some(listen) = &cfg.metrics_listen {
        let handle = gatekeeper_core::metrics::install_recorder().context("failed to install prometheus recorder")?;
        let metrics_gateway = crate::proxy::MetricsGateway::new(handle);
        let mut metrics_svc = http_proxy_service(&server.configuration, metrics_gateway);
        metrics_svc.add_tcp(listen);
        server.add_service(metrics_svc);
    }

    server.run_forever();
}
