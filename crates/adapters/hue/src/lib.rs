//! # hublink-adapter-hue
//!
//! Hue bridge adapter: exposes the sensors of a Hue bridge as hublink
//! devices and entities.
//!
//! ## How it works
//!
//! The bridge answers one `GET /api/<username>/sensors` with the state of
//! every sensor. Each sensor gets a [`SensorProxy`]; every scan interval all
//! proxies request an update at once, and a
//! [`RequestCoalescer`](hublink_app::coalescer::RequestCoalescer) turns those
//! requests into a single bridge call.
//!
//! ## Supported sensor types
//!
//! | Platform | Hue devices | CLIP (opt-in) |
//! |----------|-------------|---------------|
//! | `sensor` | `ZLLTemperature`, `ZLLLightLevel`, `ZLLSwitch`, `ZGPSwitch` | `CLIPTemperature`, `CLIPHumidity`, `CLIPLightLevel`, `CLIPSwitch`, `CLIPGenericStatus` |
//! | `binary_sensor` | `ZLLPresence`, `Daylight` | `CLIPPresence`, `CLIPOpenClose`, `CLIPGenericFlag` |
//!
//! ## Dependency rule
//!
//! Same as other adapters: depends on `hublink-app` and `hublink-domain`.

mod client;
mod config;
mod error;
pub mod model;
mod poller;
mod proxy;
mod registry;
mod sensor_type;

pub use client::BridgeClient;
pub use config::HueConfig;
pub use error::HueError;
pub use poller::BridgeCoalescer;
pub use proxy::SensorProxy;
pub use registry::{RegistryUpdate, SensorRegistry};
pub use sensor_type::{Platform, SensorType};

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use hublink_app::availability::SourceAvailability;
use hublink_app::coalescer::RequestCoalescer;
use hublink_app::ports::integration::{Integration, IntegrationContext};
use hublink_domain::entity::Entity;
use hublink_domain::error::{HubError, NotFoundError};
use hublink_domain::id::EntityId;

/// Value of `Device::integration` for everything this adapter discovers.
pub const INTEGRATION_NAME: &str = "hue";

/// Hue bridge integration.
pub struct HueIntegration {
    config: HueConfig,
    coalescer: Arc<BridgeCoalescer>,
    updates: Option<mpsc::UnboundedReceiver<RegistryUpdate>>,
    tasks: Vec<JoinHandle<()>>,
}

impl HueIntegration {
    #[must_use]
    pub fn new(config: HueConfig) -> Self {
        let client = BridgeClient::new(&config);
        Self::with_client(config, client)
    }

    /// Create the integration around an existing bridge client.
    #[must_use]
    pub fn with_client(config: HueConfig, client: BridgeClient) -> Self {
        let availability = SourceAvailability::new();
        let (registry, updates) = SensorRegistry::new(&config, availability.clone());
        let coalescer = RequestCoalescer::new(config.host.clone(), client, registry)
            .with_timeout(config.request_timeout())
            .with_availability(availability);
        Self {
            config,
            coalescer: Arc::new(coalescer),
            updates: Some(updates),
            tasks: Vec::new(),
        }
    }

    /// The coalescer shared by every sensor proxy.
    #[must_use]
    pub fn coalescer(&self) -> &Arc<BridgeCoalescer> {
        &self.coalescer
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.tasks.is_empty()
    }
}

impl Integration for HueIntegration {
    fn name(&self) -> &'static str {
        INTEGRATION_NAME
    }

    async fn setup(&mut self, ctx: &impl IntegrationContext) -> Result<(), HubError> {
        tracing::info!(host = %self.config.host, "connecting to Hue bridge");

        match self.coalescer.request_refresh().await {
            Ok(snapshot) => tracing::info!(
                host = %self.config.host,
                sensors = snapshot.len(),
                supported = self.coalescer.registry().len(),
                "Hue bridge reached"
            ),
            Err(err) => tracing::warn!(
                host = %self.config.host,
                error = %err,
                "Hue bridge not reachable, sensors will be added once it is"
            ),
        }

        if let Some(updates) = self.updates.as_mut() {
            while let Ok(update) = updates.try_recv() {
                poller::apply_update(self.coalescer.registry(), ctx, update).await?;
            }
        }
        Ok(())
    }

    async fn start_background(
        &mut self,
        ctx: impl IntegrationContext + Clone + 'static,
    ) -> Result<(), HubError> {
        let Some(updates) = self.updates.take() else {
            tracing::debug!("Hue background tasks already started");
            return Ok(());
        };

        self.tasks.push(tokio::spawn(poller::update_pump(
            Arc::clone(&self.coalescer),
            updates,
            ctx.clone(),
        )));
        self.tasks.push(tokio::spawn(poller::poll_loop(
            Arc::clone(&self.coalescer),
            self.config.scan_interval(),
            ctx,
        )));

        tracing::info!(
            interval_secs = self.config.scan_interval_secs,
            "Hue poll loop started"
        );
        Ok(())
    }

    async fn handle_service_call(
        &self,
        entity_id: EntityId,
        service: &str,
        _data: serde_json::Value,
    ) -> Result<Entity, HubError> {
        tracing::debug!(%entity_id, service, "Hue sensors are read-only, returning current state");
        self.coalescer
            .registry()
            .entity_by_id(entity_id)?
            .ok_or_else(|| {
                NotFoundError {
                    entity: "Entity",
                    id: entity_id.to_string(),
                }
                .into()
            })
    }

    async fn teardown(&mut self) -> Result<(), HubError> {
        for handle in self.tasks.drain(..) {
            handle.abort();
        }
        tracing::info!(host = %self.config.host, "Hue integration stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use hublink_app::event_bus::InProcessEventBus;
    use hublink_app::services::integration_context::ServiceContext;
    use hublink_app::services::state_service::StateService;
    use hublink_domain::entity::EntityState;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    type Context = ServiceContext<Arc<InProcessEventBus>>;

    fn context() -> Context {
        let bus = Arc::new(InProcessEventBus::new(64));
        ServiceContext::new(Arc::new(StateService::new(bus)))
    }

    fn config_for(server: &MockServer) -> HueConfig {
        HueConfig {
            host: server.address().to_string(),
            username: "tester".to_string(),
            bridge_id: Some("001788FFFE23BFC2".to_string()),
            ..HueConfig::default()
        }
    }

    async fn mount_sensors(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/api/tester/sensors"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn should_persist_discovered_sensors_on_setup() {
        let server = MockServer::start().await;
        mount_sensors(
            &server,
            serde_json::json!({
                "1": {"name": "Daylight", "type": "Daylight", "state": {"daylight": true}},
                "2": {"name": "Hallway motion", "type": "ZLLPresence",
                      "uniqueid": "00:17:88:01:02:00:af:28-02-0406",
                      "state": {"presence": true}, "config": {"reachable": true, "battery": 90}}
            }),
        )
        .await;
        let ctx = context();
        let mut integration = HueIntegration::new(config_for(&server));

        integration.setup(&ctx).await.unwrap();

        let entities = ctx.state().list_entities();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].entity_id, "binary_sensor.hue_daylight");
        assert_eq!(entities[1].entity_id, "binary_sensor.hue_hallway_motion");
        assert_eq!(entities[1].state, EntityState::On);
        assert_eq!(ctx.state().list_devices().len(), 2);
    }

    #[tokio::test]
    async fn should_come_up_empty_when_bridge_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let ctx = context();
        let mut integration = HueIntegration::new(config_for(&server));

        integration.setup(&ctx).await.unwrap();

        assert!(ctx.state().list_entities().is_empty());
        assert!(!integration.coalescer().availability().is_available());
    }

    #[tokio::test]
    async fn should_return_current_entity_for_service_call() {
        let server = MockServer::start().await;
        mount_sensors(
            &server,
            serde_json::json!({
                "2": {"name": "Hallway motion", "type": "ZLLPresence", "state": {"presence": false}}
            }),
        )
        .await;
        let ctx = context();
        let mut integration = HueIntegration::new(config_for(&server));
        integration.setup(&ctx).await.unwrap();
        let stored = ctx
            .state()
            .find_entity("binary_sensor.hue_hallway_motion")
            .unwrap();

        let entity = integration
            .handle_service_call(stored.id, "update", serde_json::json!({}))
            .await
            .unwrap();

        assert_eq!(entity.id, stored.id);
        assert_eq!(entity.state, EntityState::Off);
    }

    #[tokio::test]
    async fn should_return_not_found_for_unknown_entity() {
        let integration = HueIntegration::new(HueConfig {
            host: "127.0.0.1:9".to_string(),
            username: "tester".to_string(),
            ..HueConfig::default()
        });
        let result = integration
            .handle_service_call(EntityId::new(), "update", serde_json::json!({}))
            .await;
        assert!(matches!(result, Err(HubError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_coalesce_poll_cycle_into_one_bridge_call() {
        let server = MockServer::start().await;
        mount_sensors(
            &server,
            serde_json::json!({
                "1": {"name": "Daylight", "type": "Daylight", "state": {"daylight": true}},
                "2": {"name": "Hallway motion", "type": "ZLLPresence", "state": {"presence": true}},
                "3": {"name": "Kitchen temperature", "type": "ZLLTemperature",
                      "state": {"temperature": 2150}}
            }),
        )
        .await;
        let ctx = context();
        let mut integration = HueIntegration::new(config_for(&server));
        integration.setup(&ctx).await.unwrap();
        let before = server.received_requests().await.unwrap().len();

        poller::poll_once(integration.coalescer(), &ctx).await;

        let after = server.received_requests().await.unwrap().len();
        assert_eq!(after - before, 1);
    }

    #[tokio::test]
    async fn should_stop_background_tasks_on_teardown() {
        let server = MockServer::start().await;
        mount_sensors(&server, serde_json::json!({})).await;
        let ctx = context();
        let mut integration = HueIntegration::new(HueConfig {
            scan_interval_secs: 3600,
            ..config_for(&server)
        });
        integration.setup(&ctx).await.unwrap();

        integration.start_background(ctx.clone()).await.unwrap();
        assert!(integration.is_running());

        integration.teardown().await.unwrap();
        assert!(!integration.is_running());
    }
}
