use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use tracing::info;

/// Serve every recorded metric on `http://{listen}/metrics`.
///
/// Must be called from inside a tokio runtime; the exporter runs as a task
/// on it for as long as the runtime lives.
pub fn install_prometheus(listen: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(listen).install()?;
    info!("Prometheus metrics available at http://{}/metrics", listen);
    Ok(())
}

/// Install a Prometheus recorder without an HTTP listener. The handle
/// renders the current exposition text on demand.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}
