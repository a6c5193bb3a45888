// ── Typed object model ──
//
// Every Vantage object kind is a struct carrying its configuration
// attributes (decoded from the ACI object record) and a mutable state
// record whose fields stay `None` until the owning interface method has
// been fetched or observed at least once. The [`VantageObject`] trait
// is the binding layer: which wire types map to the kind, which
// `Interface.Method` results populate which state fields, and which
// legacy status categories it consumes.

mod area;
mod blind;
mod gmem;
mod info;
mod load;
mod sensor;
mod station;
mod task;
mod thermostat;

pub use area::{Area, Master};
pub use blind::{Blind, BlindState};
pub use gmem::{GMem, GMemState};
pub use info::{ObjectInfo, ObjectKind};
pub use load::{Load, LoadState, RgbLoad, RgbLoadState};
pub use sensor::{
    AnemoSensor, AnemoSensorState, LightSensor, LightSensorState, OmniSensor, OmniSensorState,
    TemperatureSensor, TemperatureSensorState,
};
pub use station::{Button, ButtonState, DryContact, DryContactState};
pub use task::{Task, TaskState};
pub use thermostat::{Thermostat, ThermostatState};

use std::future::Future;

use tracing::debug;

use vantage_api::command::parse_fixed;
use vantage_api::{CommandClient, Error as ApiError, ObjectRecord, StatusCategory};

use crate::error::Error;

/// A typed Vantage object kind.
///
/// Implementations are the closed binding table between the wire and
/// the model: adding a kind means adding a struct, its bindings, and a
/// variant in [`ObjectKind`] -- nothing else changes.
pub trait VantageObject: Clone + Send + Sync + 'static {
    /// The kind tag. Fixed for the object's lifetime.
    const KIND: ObjectKind;

    /// Wire type names requested in `<ObjectType>` filters.
    fn wire_types() -> &'static [&'static str];

    /// Decode the kind from a raw object record.
    fn from_record(record: &ObjectRecord) -> Option<Self>;

    fn info(&self) -> &ObjectInfo;

    /// Replace configuration attributes, keeping the state record.
    fn update_config(&mut self, other: &Self) -> bool;

    /// The `Interface.Method` results that populate this kind's state.
    /// Drives status routing; the default [`fetch_state`] invokes each
    /// once without arguments. Kinds whose getters take arguments
    /// (per-channel color reads, variables) override the fetch.
    ///
    /// [`fetch_state`]: Self::fetch_state
    fn state_methods() -> &'static [&'static str] {
        &[]
    }

    /// Status categories consumed when the enhanced log is unavailable.
    fn status_categories() -> &'static [StatusCategory] {
        &[]
    }

    /// Apply an object-interface status (`S:STATUS` / enhanced log /
    /// `R:INVOKE`). Returns `true` if a state field changed. Unknown
    /// methods must be dropped with a warning.
    fn apply_object_status(&mut self, _method: &str, _result: &str, _args: &[String]) -> bool {
        false
    }

    /// Apply a category status (`S:<CAT> <vid> <args...>`).
    fn apply_category_status(&mut self, _category: &str, _args: &[String]) -> bool {
        false
    }

    /// Fetch every state field once. Returns `true` if anything changed.
    fn fetch_state(
        &mut self,
        client: &CommandClient,
    ) -> impl Future<Output = Result<bool, Error>> + Send {
        fetch_via_invoke(self, client)
    }
}

/// Default state fetch: invoke each declared state method and route the
/// result through the same binding used for status events.
pub(crate) async fn fetch_via_invoke<T: VantageObject>(
    object: &mut T,
    client: &CommandClient,
) -> Result<bool, Error> {
    let vid = object.info().vid;
    let mut changed = false;

    for method in T::state_methods() {
        match client.invoke(vid, method, &[]).await {
            Ok(response) => {
                changed |= object.apply_object_status(method, &response.result, &response.args);
            }
            // Not every instance of a kind supports every method
            // (older firmware, partial hardware). Skip and move on.
            Err(ApiError::Command { code, message }) => {
                debug!(vid, method, code = code.code(), message = %message, "state fetch skipped");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Ok(changed)
}

/// Parse a fixed-point state value, treating `-`/empty as unset.
pub(crate) fn decode_fixed(token: &str) -> Option<f64> {
    if vantage_api::command::is_absent(token) {
        return None;
    }
    parse_fixed(token).ok()
}

/// Parse a plain decimal (category statuses carry percent directly).
pub(crate) fn decode_decimal(token: &str) -> Option<f64> {
    if vantage_api::command::is_absent(token) {
        return None;
    }
    token.parse().ok()
}

pub(crate) fn decode_int(token: &str) -> Option<i64> {
    if vantage_api::command::is_absent(token) {
        return None;
    }
    token.parse().ok()
}

/// Update a state field, reporting whether it changed.
pub(crate) fn set_field<V: PartialEq>(field: &mut Option<V>, value: Option<V>) -> bool {
    if value.is_some() && *field != value {
        *field = value;
        true
    } else {
        false
    }
}

/// Log-and-drop for methods outside the kind's state table.
pub(crate) fn unknown_method(kind: ObjectKind, method: &str) -> bool {
    tracing::warn!(kind = kind.as_str(), method, "dropping status for unknown method");
    false
}
