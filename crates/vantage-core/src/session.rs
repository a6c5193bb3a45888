// ── Session facade ──
//
// One `Vantage` per physical controller. It owns both protocol clients
// and the event stream, and exposes one typed controller per kind.

use std::future::Future;
use std::sync::Arc;

use tracing::info;

use vantage_api::config::Version;
use vantage_api::{
    CommandClient, CommandOptions, ConfigClient, ConfigOptions, EventStream, TransportConfig, Vid,
};

use crate::config::SessionConfig;
use crate::controller::Controller;
use crate::error::Error;
use crate::model::{
    AnemoSensor, Area, Blind, Button, DryContact, GMem, LightSensor, Load, Master, ObjectKind,
    OmniSensor, RgbLoad, Task, TemperatureSensor, Thermostat,
};
use crate::store::KindIndex;

/// A session against one Vantage controller.
///
/// Cheaply cloneable; all clones share the same clients and registry.
/// Construct with [`new`](Self::new), then [`connect`](Self::connect)
/// before using the controllers, and [`close`](Self::close) when done
/// -- or use [`with`](Self::with) to get all of that scoped.
#[derive(Clone)]
pub struct Vantage {
    config_client: ConfigClient,
    command_client: CommandClient,
    event_stream: EventStream,
    kind_index: Arc<KindIndex>,

    pub loads: Controller<Load>,
    pub rgb_loads: Controller<RgbLoad>,
    pub buttons: Controller<Button>,
    pub dry_contacts: Controller<DryContact>,
    pub blinds: Controller<Blind>,
    pub gmem: Controller<GMem>,
    pub tasks: Controller<Task>,
    pub thermostats: Controller<Thermostat>,
    pub temperature_sensors: Controller<TemperatureSensor>,
    pub anemo_sensors: Controller<AnemoSensor>,
    pub light_sensors: Controller<LightSensor>,
    pub omni_sensors: Controller<OmniSensor>,
    pub areas: Controller<Area>,
    pub masters: Controller<Master>,
}

impl Vantage {
    pub fn new(config: SessionConfig) -> Self {
        let transport = TransportConfig {
            tls: config.tls.clone(),
            conn_timeout: config.conn_timeout,
        };

        let config_client = ConfigClient::new(
            &config.host,
            ConfigOptions {
                transport: transport.clone(),
                port: config.config_port,
                credentials: config.credentials.clone(),
                read_timeout: config.read_timeout,
                page_size: config.page_size,
                ..ConfigOptions::default()
            },
        );

        let command_client = CommandClient::new(
            &config.host,
            CommandOptions {
                transport,
                port: config.command_port,
                credentials: config.credentials.clone(),
                response_timeout: config.response_timeout,
                ..CommandOptions::default()
            },
        );

        let event_stream = EventStream::new(command_client.clone());
        let kind_index = Arc::new(KindIndex::default());

        macro_rules! controller {
            () => {
                Controller::new(
                    config_client.clone(),
                    command_client.clone(),
                    event_stream.clone(),
                    Arc::clone(&kind_index),
                    config.state_fetch_concurrency,
                )
            };
        }

        Self {
            loads: controller!(),
            rgb_loads: controller!(),
            buttons: controller!(),
            dry_contacts: controller!(),
            blinds: controller!(),
            gmem: controller!(),
            tasks: controller!(),
            thermostats: controller!(),
            temperature_sensors: controller!(),
            anemo_sensors: controller!(),
            light_sensors: controller!(),
            omni_sensors: controller!(),
            areas: controller!(),
            masters: controller!(),
            config_client,
            command_client,
            event_stream,
            kind_index,
        }
    }

    /// Dial and authenticate the command channel and start the event
    /// stream. The config channel connects lazily on first use.
    pub async fn connect(&self) -> Result<(), Error> {
        self.command_client.connect().await?;
        self.event_stream.start();
        info!("session connected");
        Ok(())
    }

    /// Tear the session down: cancel all tasks, fail outstanding
    /// requests with `Cancelled`, and close both sockets.
    pub async fn close(&self) {
        self.event_stream.stop();
        self.command_client.close();
        self.config_client.close().await;
        info!("session closed");
    }

    /// Scoped session: connect, run `f`, and close on every exit path.
    pub async fn with<F, Fut, R>(config: SessionConfig, f: F) -> Result<R, Error>
    where
        F: FnOnce(Vantage) -> Fut,
        Fut: Future<Output = Result<R, Error>>,
    {
        let session = Vantage::new(config);
        if let Err(err) = session.connect().await {
            session.close().await;
            return Err(err);
        }
        let result = f(session.clone()).await;
        session.close().await;
        result
    }

    // ── Shared lookups ───────────────────────────────────────────────

    /// The kind of a VID, if any controller has seen it.
    pub fn get_kind(&self, vid: Vid) -> Option<ObjectKind> {
        self.kind_index.get(vid)
    }

    /// Total objects across all controllers.
    pub fn object_count(&self) -> usize {
        self.kind_index.len()
    }

    /// Controller firmware versions, via the config channel.
    pub async fn get_version(&self) -> Result<Version, Error> {
        Ok(self.config_client.get_version().await?)
    }

    // ── Client access ────────────────────────────────────────────────

    /// The underlying config client, for callers that need raw access.
    pub fn config_client(&self) -> &ConfigClient {
        &self.config_client
    }

    /// The underlying command client: typed per-interface helpers live
    /// here (`session.command_client().load().set_level(vid, 50.0)`).
    pub fn command_client(&self) -> &CommandClient {
        &self.command_client
    }

    /// The event stream, for subscriptions outside any controller.
    pub fn event_stream(&self) -> &EventStream {
        &self.event_stream
    }
}
