//! MQTT session with the cloud broker.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Outgoing,
    Packet, Publish, QoS, TlsConfiguration, Transport,
};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::CloudConfig;
use crate::credentials::{CredentialStore, UserInfo};
use crate::error::{CloudError, ConnectError};
use crate::iot::{MessageRouter, SmartHomeHandler};

const REQUEST_CAPACITY: usize = 64;
const RECONNECT_DELAY_MIN: Duration = Duration::from_secs(1);
const RECONNECT_DELAY_MAX: Duration = Duration::from_secs(60);

struct Session {
    client: AsyncClient,
    user: UserInfo,
    event_loop: JoinHandle<()>,
}

/// Connection to the cloud, owned by whoever runs the hub.
///
/// At most one broker session is open at a time.
pub struct CloudRelay<H> {
    config: CloudConfig,
    store: CredentialStore,
    router: Arc<MessageRouter<H>>,
    session: Mutex<Option<Session>>,
}

impl<H: SmartHomeHandler + 'static> CloudRelay<H> {
    pub fn new(config: CloudConfig, smart_home: H) -> Self {
        let store = CredentialStore::new(&config.config_dir, &config.mode);
        Self {
            config,
            store,
            router: Arc::new(MessageRouter::new(smart_home)),
            session: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub async fn is_connected(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// User of the open session, if any.
    pub async fn user(&self) -> Option<UserInfo> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|session| session.user.clone())
    }

    /// Prepare the config directory and connect when a user is logged in.
    ///
    /// Returns the logged-in user, or `None` when there is nobody to
    /// connect as.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Credentials`] if the stored files cannot be
    /// read and [`CloudError::Connect`] if the broker cannot be reached.
    pub async fn start(&self) -> Result<Option<UserInfo>, CloudError> {
        self.store.ensure_dir()?;
        let Some(user) = self.store.load()? else {
            tracing::info!("no cloud user logged in, relay idle");
            return Ok(None);
        };
        self.connect(user.clone()).await?;
        Ok(Some(user))
    }

    /// Open the broker session for `user` and start routing inbound messages.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::AlreadyConnected`] when a session is open and
    /// [`CloudError::Connect`] when the broker cannot be reached in time.
    #[tracing::instrument(skip(self, user), fields(thing_name = %user.thing_name))]
    pub async fn connect(&self, user: UserInfo) -> Result<(), CloudError> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return Err(CloudError::AlreadyConnected);
        }

        let options = self.mqtt_options(&user)?;
        let (client, mut event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);

        let timeout = self.config.connect_timeout();
        tokio::time::timeout(timeout, wait_for_connack(&mut event_loop))
            .await
            .map_err(|_| ConnectError::Timeout(timeout))??;

        let inbound = format!("{}/i/#", user.thing_name);
        client.subscribe(inbound.as_str(), QoS::AtLeastOnce).await?;
        tracing::info!(
            endpoint = %self.config.iot_endpoint,
            topic = %inbound,
            "connected to cloud"
        );

        let event_loop = tokio::spawn(run_event_loop(
            event_loop,
            client.clone(),
            Arc::clone(&self.router),
            user.thing_name.clone(),
        ));
        *session = Some(Session {
            client,
            user,
            event_loop,
        });
        Ok(())
    }

    /// Publish `payload` on `<thing>/o/<topic>`.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::NotConnected`] without a session and
    /// [`CloudError::Client`] if the request cannot be queued.
    pub async fn publish(&self, topic: &str, payload: impl Into<Vec<u8>>) -> Result<(), CloudError> {
        let (client, thing_name) = {
            let session = self.session.lock().await;
            let session = session.as_ref().ok_or(CloudError::NotConnected)?;
            (session.client.clone(), session.user.thing_name.clone())
        };
        publish_outbound(&client, &thing_name, topic, payload.into()).await
    }

    /// Close the session and forget the user.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Credentials`] if the credential files cannot be
    /// removed.
    pub async fn logout(&self) -> Result<(), CloudError> {
        self.disconnect().await;
        self.store.clear()?;
        tracing::info!("cloud user logged out");
        Ok(())
    }

    /// Close the session, keeping the credentials for the next start.
    pub async fn stop(&self) {
        self.disconnect().await;
    }

    async fn disconnect(&self) {
        let Some(session) = self.session.lock().await.take() else {
            return;
        };
        if let Err(err) = session.client.disconnect().await {
            tracing::debug!(error = %err, "disconnect request not delivered");
        }
        session.event_loop.abort();
        tracing::info!(thing_name = %session.user.thing_name, "disconnected from cloud");
    }

    fn mqtt_options(&self, user: &UserInfo) -> Result<MqttOptions, ConnectError> {
        let ca = read_credential(&self.config.root_ca_path())?;
        let certificate = read_credential(&self.store.certificate_path())?;
        let secret_key = read_credential(&self.store.secret_key_path())?;

        let mut options = MqttOptions::new(
            user.thing_name.as_str(),
            self.config.iot_endpoint.as_str(),
            self.config.iot_port,
        );
        options.set_keep_alive(self.config.keep_alive());
        options.set_transport(Transport::tls_with_config(TlsConfiguration::Simple {
            ca,
            alpn: None,
            client_auth: Some((certificate, secret_key)),
        }));
        Ok(options)
    }
}

fn read_credential(path: &Path) -> Result<Vec<u8>, ConnectError> {
    std::fs::read(path).map_err(|source| ConnectError::ReadCredential {
        path: path.display().to_string(),
        source,
    })
}

async fn wait_for_connack(event_loop: &mut EventLoop) -> Result<(), ConnectError> {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return match ack.code {
                    ConnectReturnCode::Success => Ok(()),
                    code => Err(ConnectError::Refused(code)),
                };
            }
            Ok(_) => {}
            Err(ConnectionError::ConnectionRefused(code)) => return Err(ConnectError::Refused(code)),
            Err(err) => return Err(ConnectError::Connection(err)),
        }
    }
}

async fn publish_outbound(
    client: &AsyncClient,
    thing_name: &str,
    topic: &str,
    payload: Vec<u8>,
) -> Result<(), CloudError> {
    let topic = format!("{thing_name}/o/{topic}");
    tracing::debug!(%topic, bytes = payload.len(), "publishing to cloud");
    client
        .publish(topic, QoS::AtLeastOnce, false, payload)
        .await?;
    Ok(())
}

async fn run_event_loop<H: SmartHomeHandler + 'static>(
    mut event_loop: EventLoop,
    client: AsyncClient,
    router: Arc<MessageRouter<H>>,
    thing_name: String,
) {
    let mut delay = RECONNECT_DELAY_MIN;
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                delay = RECONNECT_DELAY_MIN;
                tokio::spawn(handle_publish(
                    publish,
                    client.clone(),
                    Arc::clone(&router),
                    thing_name.clone(),
                ));
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                tracing::debug!("cloud event loop finished");
                return;
            }
            Ok(_) => delay = RECONNECT_DELAY_MIN,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    retry_in_secs = delay.as_secs(),
                    "cloud connection lost"
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(RECONNECT_DELAY_MAX);
            }
        }
    }
}

async fn handle_publish<H: SmartHomeHandler>(
    publish: Publish,
    client: AsyncClient,
    router: Arc<MessageRouter<H>>,
    thing_name: String,
) {
    tracing::debug!(topic = %publish.topic, bytes = publish.payload.len(), "cloud message received");
    match router.route(&publish.topic, &publish.payload).await {
        Ok(Some(reply)) => {
            if let Err(err) = publish_outbound(&client, &thing_name, &reply.topic, reply.payload).await {
                tracing::warn!(topic = %reply.topic, error = %err, "unable to send cloud reply");
            }
        }
        Ok(None) => {}
        Err(err) => tracing::warn!(topic = %publish.topic, error = %err, "invalid cloud message"),
    }
}
