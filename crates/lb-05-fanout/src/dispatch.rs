//! Long-lived fanout tasks.

use crate::domain::registry::ConnectionRegistry;
use shared_bus::Subscription;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Pumps bus events into the registry, in ascending sequence order.
///
/// One dispatch loop serves every connection; per-connection ordering
/// follows from the bus subscription's ordering guarantee. Runs until the
/// bus closes.
pub async fn run_dispatch(mut subscription: Subscription, registry: Arc<ConnectionRegistry>) {
    info!("Fanout dispatch loop started");
    while let Some(event) = subscription.recv().await {
        let delivered = registry.deliver(&event);
        debug!(
            sequence = event.sequence,
            delivered, "Event dispatched to subscribers"
        );
    }
    info!("Change bus closed; fanout dispatch loop exiting");
}

/// Periodic inactivity sweep driving `Active → Idle → Disconnected`.
///
/// Runs until the task is dropped.
pub async fn run_sweeper(registry: Arc<ConnectionRegistry>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let (idled, disconnected) = registry.tick();
        if idled > 0 || disconnected > 0 {
            debug!(idled, disconnected, "Inactivity sweep");
        }
    }
}
