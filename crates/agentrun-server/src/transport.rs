//! Distributed transport wiring.

use async_trait::async_trait;
use tracing::info;

use agentrun_core::RuntimeEvent;
use agentrun_runtime::{DistributedTransport, TransportError};

/// Reference transport: logs every mirrored event.
///
/// Deployments with a real broker swap this for their own
/// `DistributedTransport` implementation at wiring time.
pub struct TracingTransport;

#[async_trait]
impl DistributedTransport for TracingTransport {
    async fn publish(&self, event: RuntimeEvent) -> Result<(), TransportError> {
        info!(event_type = event.event_type(), "Mirrored event");
        Ok(())
    }
}
