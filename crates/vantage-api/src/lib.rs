//! Protocol clients for Vantage InFusion controllers.
//!
//! A controller exposes two services, and this crate provides one client
//! for each:
//!
//! - **ACI config service** ([`ConfigClient`]) -- an XML-RPC-style
//!   protocol on port 2010 (TLS) / 2001 (plain) used to enumerate
//!   objects and fetch per-object configuration. Requests and responses
//!   are framed as single top-level XML elements.
//!
//! - **Host Command service** ([`CommandClient`]) -- a CRLF line
//!   protocol on port 3010 (TLS) / 3001 (plain) used for control
//!   commands and as a server-push stream of `S:`/`EL:` events.
//!   [`EventStream`] layers declarative subscriptions on top of it,
//!   including automatic re-enrolment after reconnects.
//!
//! Both clients share [`TransportConfig`] for TCP+TLS dialing with
//! configurable certificate verification ([`TlsMode`]; verification is
//! off by default since controllers ship self-signed certificates).
//!
//! Higher-level consumers (e.g. `vantage-core`) compose both clients
//! behind a session facade and decode the raw records and events into
//! typed objects.

pub mod command;
pub mod config;
pub mod error;
pub mod events;
pub mod transport;
pub mod xml;

pub use command::{
    CommandClient, CommandEvent, CommandOptions, CommandResponse, ConnectionState, InvokeResponse,
    Param,
};
pub use config::{ConfigClient, ConfigOptions, ObjectPager, ObjectRecord};
pub use error::{CommandErrorCode, Error};
pub use events::{Event, EventStream, LogType, StatusCategory, SubscriptionHandle};
pub use transport::{TlsMode, TransportConfig};

use secrecy::SecretString;

/// Vantage ID: the stable integer identifier of an object within one
/// controller.
pub type Vid = u32;

/// Login credentials for both services.
///
/// The password is held as a [`SecretString`] so it never appears in
/// debug output or logs.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}
