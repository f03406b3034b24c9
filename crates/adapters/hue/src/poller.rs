//! Background tasks of the Hue integration.
//!
//! - the **update pump** persists what the registry queues (new sensors,
//!   refreshes triggered by someone else's fetch);
//! - the **poll loop** makes every proxy ask for an update once per scan
//!   interval. All of them join the same bridge request.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use hublink_app::coalescer::RequestCoalescer;
use hublink_app::ports::{EntityRegistry, IntegrationContext};
use hublink_domain::error::HubError;

use crate::client::BridgeClient;
use crate::registry::{RegistryUpdate, SensorRegistry};

pub type BridgeCoalescer = RequestCoalescer<BridgeClient, SensorRegistry>;

/// Persist one queued registry update.
pub(crate) async fn apply_update(
    registry: &SensorRegistry,
    ctx: &impl IntegrationContext,
    update: RegistryUpdate,
) -> Result<(), HubError> {
    match update {
        RegistryUpdate::Added(sensor_id) => {
            if let Some(discovered) = registry.discovered(&sensor_id)? {
                ctx.persist_discovered(discovered).await?;
            }
        }
        RegistryUpdate::Refresh(sensor_id) => {
            if let Some(entity) = registry.render(&sensor_id)? {
                ctx.upsert_entity(entity).await?;
            }
        }
    }
    Ok(())
}

pub(crate) async fn update_pump(
    coalescer: Arc<BridgeCoalescer>,
    mut updates: mpsc::UnboundedReceiver<RegistryUpdate>,
    ctx: impl IntegrationContext,
) {
    while let Some(update) = updates.recv().await {
        if let Err(err) = apply_update(coalescer.registry(), &ctx, update).await {
            tracing::warn!(error = %err, "failed to persist Hue sensor update");
        }
    }
    tracing::debug!("Hue update pump stopped");
}

pub(crate) async fn poll_loop<C>(coalescer: Arc<BridgeCoalescer>, interval: Duration, ctx: C)
where
    C: IntegrationContext + Clone + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        poll_once(&coalescer, &ctx).await;
    }
}

/// One poll cycle: every proxy requests an update, then persists itself.
pub(crate) async fn poll_once<C>(coalescer: &Arc<BridgeCoalescer>, ctx: &C)
where
    C: IntegrationContext + Clone + 'static,
{
    let sensor_ids = coalescer.registry().known_ids();
    if sensor_ids.is_empty() {
        // Nothing discovered yet; new sensors arrive through the pump.
        if let Err(err) = coalescer.request_refresh().await {
            tracing::trace!(error = %err, "Hue bridge refresh failed");
        }
        return;
    }

    let mut tasks = JoinSet::new();
    for sensor_id in sensor_ids {
        let coalescer = Arc::clone(coalescer);
        let ctx = ctx.clone();
        tasks.spawn(async move {
            if let Err(err) = coalescer.request_update(sensor_id.clone()).await {
                tracing::trace!(sensor_id = %sensor_id, error = %err, "Hue sensor update failed");
            }
            if let Some(entity) = coalescer.registry().render(&sensor_id)? {
                ctx.upsert_entity(entity).await?;
            }
            Ok::<(), HubError>(())
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(error = %err, "failed to persist Hue sensor state"),
            Err(err) => tracing::warn!(error = %err, "Hue sensor update task failed"),
        }
    }
}
