//! Typed helpers for the object interfaces of the Host Command service.
//!
//! Each helper borrows the [`CommandClient`] and formats arguments for
//! one interface (`Load`, `Blind`, ...). These are the authoritative
//! command primitives; any object-bound sugar in higher layers forwards
//! to them. Interfaces without a specialized helper are reachable
//! through [`CommandClient::invoke`](super::CommandClient::invoke).

mod blind;
mod button;
mod gmem;
mod load;
mod sensor;
mod task;
mod thermostat;

pub use blind::BlindCommands;
pub use button::ButtonCommands;
pub use gmem::{GMemCommands, GMemValue};
pub use load::{LoadCommands, RampType};
pub use sensor::SensorCommands;
pub use task::{TaskCommands, TaskEvent};
pub use thermostat::{
    DayMode, FanMode, OperationMode, SetpointMode, SetpointSource, ThermostatCommands,
};

use super::CommandClient;

impl CommandClient {
    pub fn load(&self) -> LoadCommands<'_> {
        LoadCommands { client: self }
    }

    pub fn button(&self) -> ButtonCommands<'_> {
        ButtonCommands { client: self }
    }

    pub fn blind(&self) -> BlindCommands<'_> {
        BlindCommands { client: self }
    }

    pub fn thermostat(&self) -> ThermostatCommands<'_> {
        ThermostatCommands { client: self }
    }

    pub fn sensor(&self) -> SensorCommands<'_> {
        SensorCommands { client: self }
    }

    pub fn gmem(&self) -> GMemCommands<'_> {
        GMemCommands { client: self }
    }

    pub fn task(&self) -> TaskCommands<'_> {
        TaskCommands { client: self }
    }
}
