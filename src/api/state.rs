//! API shared state containing actor handles

use crate::actors::hub::HubHandle;
use crate::actors::sampler::SamplerHandle;
use crate::actors::storage::StorageHandle;
use crate::monitoring::MonitorAggregator;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Handle to the subscription hub for WebSocket connections
    pub hub: HubHandle,

    /// Handle to the storage actor for querying persisted records
    pub storage: StorageHandle,

    /// Handle to the metrics sampler for throughput data
    pub sampler: SamplerHandle,

    /// Monitoring facade: health, performance, errors, alerts
    pub monitor: MonitorAggregator,
}

impl ApiState {
    pub fn new(
        hub: HubHandle,
        storage: StorageHandle,
        sampler: SamplerHandle,
        monitor: MonitorAggregator,
    ) -> Self {
        Self {
            hub,
            storage,
            sampler,
            monitor,
        }
    }
}
