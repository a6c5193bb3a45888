//! Client for the Vantage Application Communication Interface (ACI) service.
//!
//! The ACI service is an XML-RPC-style protocol on port 2010 (TLS) or
//! 2001 (plaintext). Each request is a single top-level element named
//! after the RPC interface (`ILogin`, `IIntrospection`,
//! `IConfiguration`); the response is the next complete frame with the
//! same top-level name. Framing is handled byte-level by
//! [`crate::xml::FrameReader`]; this module owns request rendering,
//! response decoding, login gating, and the paged object filter
//! protocol.

mod messages;
mod objects;
mod pager;

pub use messages::{InterfaceInfo, SysInfo, TypeInfo, Version};
pub use objects::ObjectRecord;
pub use pager::ObjectPager;

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::transport::{self, Stream, TransportConfig};
use crate::xml::{Element, FrameReader, DEFAULT_MAX_FRAME};
use crate::{Credentials, Vid};

/// TLS service port for the ACI service.
pub const ACI_PORT_TLS: u16 = 2010;
/// Plaintext fallback port for the ACI service.
pub const ACI_PORT_PLAIN: u16 = 2001;

/// Configuration for a [`ConfigClient`].
#[derive(Debug, Clone)]
pub struct ConfigOptions {
    pub transport: TransportConfig,
    /// Override the service port chosen from the TLS setting.
    pub port: Option<u16>,
    pub credentials: Option<Credentials>,
    /// Timeout for reading one response frame.
    pub read_timeout: Duration,
    /// Frame size limit.
    pub max_frame: usize,
    /// Objects fetched per `GetFilterResults` page.
    pub page_size: u32,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            port: None,
            credentials: None,
            read_timeout: Duration::from_secs(30),
            max_frame: DEFAULT_MAX_FRAME,
            page_size: 50,
        }
    }
}

// ── ConfigClient ─────────────────────────────────────────────────────

/// Client for the ACI service.
///
/// Cheaply cloneable. The underlying connection is created lazily on
/// first use and re-created after errors; requests are serialized on
/// one connection (the service has no request correlation).
#[derive(Clone)]
pub struct ConfigClient {
    inner: Arc<ConfigInner>,
}

struct ConfigInner {
    host: String,
    port: u16,
    options: ConfigOptions,
    slot: Mutex<ConnectionSlot>,
}

#[derive(Default)]
struct ConnectionSlot {
    conn: Option<AciConnection>,
    authenticated: bool,
}

struct AciConnection {
    reader: FrameReader<ReadHalf<Stream>>,
    writer: WriteHalf<Stream>,
}

impl ConfigClient {
    pub fn new(host: impl Into<String>, options: ConfigOptions) -> Self {
        let port = options
            .port
            .unwrap_or_else(|| options.transport.service_port(ACI_PORT_TLS, ACI_PORT_PLAIN));

        Self {
            inner: Arc::new(ConfigInner {
                host: host.into(),
                port,
                options,
                slot: Mutex::new(ConnectionSlot::default()),
            }),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.inner.options.page_size
    }

    /// Close the connection. The next request reconnects.
    pub async fn close(&self) {
        let mut slot = self.inner.slot.lock().await;
        if let Some(mut conn) = slot.conn.take() {
            let _ = conn.writer.shutdown().await;
        }
        slot.authenticated = false;
    }

    // ── ILogin ───────────────────────────────────────────────────────

    /// Authenticate with explicit credentials.
    ///
    /// Rejected credentials produce [`Error::Auth`], which is fatal to
    /// the session and never retried.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), Error> {
        let mut slot = self.inner.slot.lock().await;
        self.dial_if_closed(&mut slot).await?;
        self.login_locked(&mut slot, username, password).await
    }

    // ── IIntrospection ───────────────────────────────────────────────

    pub async fn get_version(&self) -> Result<Version, Error> {
        let ret = self.rpc("IIntrospection", "GetVersion", String::new()).await?;
        Ok(messages::decode_version(&ret))
    }

    pub async fn get_interfaces(&self) -> Result<Vec<InterfaceInfo>, Error> {
        let ret = self
            .rpc("IIntrospection", "GetInterfaces", String::new())
            .await?;
        Ok(messages::decode_interfaces(&ret))
    }

    pub async fn get_types(&self) -> Result<Vec<TypeInfo>, Error> {
        let ret = self.rpc("IIntrospection", "GetTypes", String::new()).await?;
        Ok(messages::decode_types(&ret))
    }

    pub async fn get_sys_info(&self) -> Result<SysInfo, Error> {
        let ret = self.rpc("IIntrospection", "GetSysInfo", String::new()).await?;
        messages::decode_sys_info(&ret)
    }

    // ── IConfiguration ───────────────────────────────────────────────

    /// Open a filter over the given object types. Returns the filter handle.
    pub async fn open_filter(
        &self,
        object_types: &[&str],
        xpath: Option<&str>,
    ) -> Result<i32, Error> {
        let call = messages::open_filter_call(object_types, xpath);
        let ret = self.rpc("IConfiguration", "OpenFilter", call).await?;
        messages::decode_i32(&ret)
    }

    /// Fetch up to `count` objects from an open filter.
    pub async fn get_filter_results(
        &self,
        handle: i32,
        count: u32,
        whole_object: bool,
    ) -> Result<Vec<ObjectRecord>, Error> {
        let call = messages::get_filter_results_call(handle, count, whole_object);
        let ret = self.rpc("IConfiguration", "GetFilterResults", call).await?;
        Ok(messages::decode_object_list(&ret))
    }

    /// Close a filter handle.
    pub async fn close_filter(&self, handle: i32) -> Result<bool, Error> {
        let ret = self
            .rpc("IConfiguration", "CloseFilter", format!("{handle}"))
            .await?;
        messages::decode_bool(&ret)
    }

    /// Fetch objects by VID. The result is aligned with the request:
    /// VIDs the controller does not know yield `None` in their slot.
    pub async fn get_object(&self, vids: &[Vid]) -> Result<Vec<Option<ObjectRecord>>, Error> {
        let call = messages::get_object_call(vids);
        let ret = self.rpc("IConfiguration", "GetObject", call).await?;
        let records = messages::decode_object_list(&ret);

        Ok(vids
            .iter()
            .map(|vid| records.iter().find(|r| r.vid == *vid).cloned())
            .collect())
    }

    /// Lazily enumerate all objects of the given types.
    ///
    /// Opens one filter and drains it in pages of
    /// [`page_size`](Self::page_size); the filter handle is closed on
    /// exhaustion, on error, and on drop.
    pub fn get_objects(&self, object_types: &[&str]) -> ObjectPager {
        ObjectPager::new(self.clone(), object_types.iter().map(|s| s.to_string()).collect())
    }

    // ── Request plumbing ─────────────────────────────────────────────

    /// Run one RPC, handling login gating and one protocol-error retry.
    async fn rpc(&self, interface: &str, method: &str, call: String) -> Result<Element, Error> {
        let mut slot = self.inner.slot.lock().await;
        let mut retried_protocol = false;
        let mut retried_login = false;

        loop {
            match self.rpc_once(&mut slot, interface, method, &call).await {
                Ok(ret) => return Ok(ret),
                // Auth-required marker: log in once and retry the call.
                Err(Error::LoginRequired) if !retried_login => {
                    let Some(credentials) = self.inner.options.credentials.clone() else {
                        return Err(Error::LoginRequired);
                    };
                    retried_login = true;
                    self.login_locked(
                        &mut slot,
                        &credentials.username,
                        credentials.password.expose_secret(),
                    )
                    .await?;
                }
                // Malformed response: tear the connection down and retry
                // once; a second occurrence is surfaced.
                Err(err @ Error::Protocol { .. }) if !retried_protocol => {
                    warn!(error = %err, "protocol error on config channel, reconnecting");
                    retried_protocol = true;
                    slot.conn = None;
                    slot.authenticated = false;
                }
                Err(err) => {
                    if matches!(
                        err,
                        Error::Disconnected | Error::Protocol { .. } | Error::Timeout(_)
                    ) {
                        slot.conn = None;
                        slot.authenticated = false;
                    }
                    return Err(err);
                }
            }
        }
    }

    async fn rpc_once(
        &self,
        slot: &mut ConnectionSlot,
        interface: &str,
        method: &str,
        call: &str,
    ) -> Result<Element, Error> {
        self.dial_if_closed(slot).await?;

        // Log in automatically iff credentials were supplied.
        if !slot.authenticated {
            if let Some(credentials) = self.inner.options.credentials.clone() {
                self.login_locked(slot, &credentials.username, credentials.password.expose_secret())
                    .await?;
            }
        }

        let payload = if call.is_empty() {
            format!("<{method}><call/></{method}>")
        } else {
            format!("<{method}><call>{call}</call></{method}>")
        };

        let root = self.exchange(slot, interface, &payload).await?;
        let method_el = root
            .child(method)
            .ok_or_else(|| Error::protocol(format!("response missing <{method}> element")))?;

        match method_el.child("return") {
            Some(ret) => Ok(ret.clone()),
            // A response without a return value while unauthenticated is
            // the service's way of demanding a login.
            None if !slot.authenticated => Err(Error::LoginRequired),
            None => Err(Error::decode(format!(
                "{interface}.{method} returned no value"
            ))),
        }
    }

    async fn dial_if_closed(&self, slot: &mut ConnectionSlot) -> Result<(), Error> {
        if slot.conn.is_some() {
            return Ok(());
        }

        let stream = transport::connect(
            &self.inner.host,
            self.inner.port,
            &self.inner.options.transport,
        )
        .await?;
        let (reader, writer) = tokio::io::split(stream);

        slot.conn = Some(AciConnection {
            reader: FrameReader::new(reader, self.inner.options.max_frame),
            writer,
        });
        slot.authenticated = false;
        info!(host = %self.inner.host, port = self.inner.port, "connected to config service");
        Ok(())
    }

    async fn login_locked(
        &self,
        slot: &mut ConnectionSlot,
        username: &str,
        password: &str,
    ) -> Result<(), Error> {
        let payload = format!(
            "<Login><call>{}</call></Login>",
            messages::login_call(username, password)
        );

        let root = self.exchange(slot, "ILogin", &payload).await?;
        let ret = root
            .child("Login")
            .and_then(|login| login.child("return"))
            .ok_or_else(|| Error::protocol("login response missing return value"))?;

        if messages::decode_bool(ret)? {
            slot.authenticated = true;
            debug!("config service login successful");
            Ok(())
        } else {
            Err(Error::Auth {
                message: "config service rejected credentials".into(),
            })
        }
    }

    /// Write one frame and read the matching response frame.
    async fn exchange(
        &self,
        slot: &mut ConnectionSlot,
        interface: &str,
        payload: &str,
    ) -> Result<Element, Error> {
        let conn = slot
            .conn
            .as_mut()
            .ok_or_else(|| Error::protocol("config connection not open"))?;

        let frame = format!("<{interface}>{payload}</{interface}>");
        debug!(frame = %frame, "config request");

        conn.writer
            .write_all(frame.as_bytes())
            .await
            .map_err(|_| Error::Disconnected)?;
        conn.writer.flush().await.map_err(|_| Error::Disconnected)?;

        let response = tokio::time::timeout(self.inner.options.read_timeout, conn.reader.read_frame())
            .await
            .map_err(|_| Error::Timeout(self.inner.options.read_timeout))??;
        debug!(frame = %response, "config response");

        let root = Element::parse(&response)?;
        if root.name != interface {
            return Err(Error::protocol(format!(
                "expected <{interface}> response, got <{}>",
                root.name
            )));
        }

        Ok(root)
    }
}
