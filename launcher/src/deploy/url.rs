//! Externally reachable server URL

use tracing::debug;
use url::Url;

use crate::cluster::api::{ClusterApi, Endpoint};
use crate::errors::DeployError;
use crate::platform::Platform;

/// Ingress names exposing the server, in lookup order
pub const INGRESS_NAMES: &[&str] = &["che-ingress", "che"];

/// Route names exposing the server, in lookup order
pub const ROUTE_NAMES: &[&str] = &["che", "che-host"];

async fn lookup(
    cluster: &dyn ClusterApi,
    platform: Platform,
    name: &str,
    namespace: &str,
) -> Result<Option<Endpoint>, DeployError> {
    if platform.is_openshift() {
        cluster.route(name, namespace).await
    } else {
        cluster.ingress(name, namespace).await
    }
}

/// URL of the server: `https` when the ingress or route terminates TLS
pub async fn resolve_server_url(
    cluster: &dyn ClusterApi,
    platform: Platform,
    namespace: &str,
) -> Result<String, DeployError> {
    let names = if platform.is_openshift() { ROUTE_NAMES } else { INGRESS_NAMES };

    for name in names {
        if let Some(endpoint) = lookup(cluster, platform, name, namespace).await? {
            let url = endpoint.url();
            Url::parse(&url).map_err(|e| {
                DeployError::ClusterApi(format!(
                    "Invalid host {:?} on {}: {}",
                    endpoint.host, name, e
                ))
            })?;
            debug!("Server exposed by {} at {}", name, url);
            return Ok(url);
        }
    }

    Err(DeployError::ClusterApi(format!(
        "No {} exposing the server found in namespace {} (looked for {})",
        if platform.is_openshift() { "route" } else { "ingress" },
        namespace,
        names.join(", ")
    )))
}
