//! Typed object model and session runtime for Vantage InFusion
//! controllers.
//!
//! This crate sits on top of `vantage-api`'s protocol clients and keeps
//! an in-memory registry of the controller's objects -- lights, shades,
//! keypads, sensors, thermostats, variables -- merged from a typed
//! configuration snapshot and a continuous stream of partial state
//! updates.
//!
//! ```rust,ignore
//! use vantage_core::{SessionConfig, Vantage};
//!
//! let config = SessionConfig::new("192.168.1.2").with_credentials("admin", "secret");
//! Vantage::with(config, |vantage| async move {
//!     vantage.loads.initialize(true).await?;
//!
//!     if let Some(load) = vantage.loads.get_by_name("Study") {
//!         println!("{} is at {:?}", load.info.display_name(), load.level());
//!     }
//!
//!     let _sub = vantage.loads.subscribe(|load, change| {
//!         println!("{:?}: {} -> {:?}", change, load.info.vid, load.level());
//!     });
//!
//!     vantage.command_client().load().set_level(118, 50.0).await?;
//!     Ok(())
//! })
//! .await?;
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod session;
mod store;

pub use config::SessionConfig;
pub use controller::{Controller, ControllerSubscription, ObjectChange};
pub use error::Error;
pub use session::Vantage;
pub use store::KindIndex;

// Model types at the crate root for ergonomics.
pub use model::{
    AnemoSensor, Area, Blind, Button, DryContact, GMem, LightSensor, Load, Master, ObjectInfo,
    ObjectKind, OmniSensor, RgbLoad, Task, TemperatureSensor, Thermostat, VantageObject,
};

// The protocol-level types that show up in this crate's public API.
pub use vantage_api::{Credentials, TlsMode, Vid};
