//! Startup exposure and seed endpoint.

use tracing::{info, warn};

use crate::registry::Endpoint;
use crate::tunnel::{resolve_exposure, ExposureState, TunnelClient};
use crate::web::AppState;

/// Establish public exposure, then provision the startup endpoint.
///
/// The endpoint is created whatever the exposure outcome, so the service
/// always has one usable inbound target.
pub async fn expose_and_seed(state: &AppState, tunnel: &TunnelClient) -> Endpoint {
    let outcome = resolve_exposure(&state.config, tunnel).await;
    state.exposure.set(outcome).await;

    match state.exposure.state().await {
        ExposureState::Live(url) => info!(public_url = %url, "public_exposure_live"),
        ExposureState::Unavailable(reason) => {
            warn!(reason = %reason, local_url = %state.config.local_url(), "public_exposure_unavailable")
        }
        ExposureState::Pending => {}
    }

    let base_url = state.preferred_base_url().await;
    let endpoint = state.registry.create(&base_url).await;

    info!(
        webhook_id = %endpoint.id,
        webhook_url = %endpoint.url,
        "startup_webhook_ready"
    );

    endpoint
}
