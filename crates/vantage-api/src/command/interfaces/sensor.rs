// Sensor object interfaces.
//
// Each sensor kind reads through its own interface method; all return
// fixed-point values whose unit depends on the kind (degrees Celsius,
// m/s, footcandles, or the sensor's native level).

use crate::command::{parse_fixed, CommandClient};
use crate::error::Error;
use crate::Vid;

/// Typed wrappers for the sensor interfaces.
pub struct SensorCommands<'a> {
    pub(crate) client: &'a CommandClient,
}

impl SensorCommands<'_> {
    /// `Temperature.GetValue` -- degrees Celsius.
    pub async fn temperature_value(&self, vid: Vid) -> Result<f64, Error> {
        let response = self.client.invoke(vid, "Temperature.GetValue", &[]).await?;
        parse_fixed(&response.result)
    }

    /// `AnemoSensor.GetSpeed` -- wind speed.
    pub async fn wind_speed(&self, vid: Vid) -> Result<f64, Error> {
        let response = self.client.invoke(vid, "AnemoSensor.GetSpeed", &[]).await?;
        parse_fixed(&response.result)
    }

    /// `LightSensor.GetLevel` -- light level.
    pub async fn light_level(&self, vid: Vid) -> Result<f64, Error> {
        let response = self.client.invoke(vid, "LightSensor.GetLevel", &[]).await?;
        parse_fixed(&response.result)
    }

    /// `Sensor.GetLevel` -- generic sensor level (omni sensors).
    pub async fn level(&self, vid: Vid) -> Result<f64, Error> {
        let response = self.client.invoke(vid, "Sensor.GetLevel", &[]).await?;
        parse_fixed(&response.result)
    }
}
