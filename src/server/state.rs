use axum::extract::FromRef;

use crate::calendar::PeriodAggregator;
use crate::job_store::OpsStore;
use crate::lifecycle::JobLifecycle;
use crate::reschedule::EndOfDayRescheduler;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedOpsStore = Arc<dyn OpsStore>;
pub type GuardedLifecycle = Arc<JobLifecycle>;
pub type GuardedRescheduler = Arc<EndOfDayRescheduler>;
pub type GuardedAggregator = Arc<PeriodAggregator>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub store: GuardedOpsStore,
    pub lifecycle: GuardedLifecycle,
    pub rescheduler: GuardedRescheduler,
    pub aggregator: GuardedAggregator,
}

impl FromRef<ServerState> for GuardedOpsStore {
    fn from_ref(input: &ServerState) -> Self {
        input.store.clone()
    }
}

impl FromRef<ServerState> for GuardedLifecycle {
    fn from_ref(input: &ServerState) -> Self {
        input.lifecycle.clone()
    }
}

impl FromRef<ServerState> for GuardedRescheduler {
    fn from_ref(input: &ServerState) -> Self {
        input.rescheduler.clone()
    }
}

impl FromRef<ServerState> for GuardedAggregator {
    fn from_ref(input: &ServerState) -> Self {
        input.aggregator.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
