// Thermostat kind.

use vantage_api::command::interfaces::{DayMode, FanMode, OperationMode};
use vantage_api::{ObjectRecord, StatusCategory};

use super::{
    decode_decimal, decode_fixed, decode_int, set_field, unknown_method, ObjectInfo, ObjectKind,
    VantageObject,
};

/// Mutable state owned by the `Thermostat` interface. Temperatures are
/// degrees Celsius.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThermostatState {
    pub indoor_temperature: Option<f64>,
    pub outdoor_temperature: Option<f64>,
    pub cool_set_point: Option<f64>,
    pub heat_set_point: Option<f64>,
    pub operation_mode: Option<OperationMode>,
    pub fan_mode: Option<FanMode>,
    pub day_mode: Option<DayMode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Thermostat {
    pub info: ObjectInfo,
    pub state: ThermostatState,
}

impl Thermostat {
    pub fn indoor_temperature(&self) -> Option<f64> {
        self.state.indoor_temperature
    }
}

impl VantageObject for Thermostat {
    const KIND: ObjectKind = ObjectKind::Thermostat;

    fn wire_types() -> &'static [&'static str] {
        &["Thermostat"]
    }

    fn from_record(record: &ObjectRecord) -> Option<Self> {
        Some(Self {
            info: ObjectInfo::from_record(record),
            state: ThermostatState::default(),
        })
    }

    fn info(&self) -> &ObjectInfo {
        &self.info
    }

    fn update_config(&mut self, other: &Self) -> bool {
        let changed = self.info != other.info;
        self.info = other.info.clone();
        changed
    }

    fn state_methods() -> &'static [&'static str] {
        &[
            "Thermostat.GetIndoorTemperature",
            "Thermostat.GetOutdoorTemperature",
            "Thermostat.GetCoolSetPoint",
            "Thermostat.GetHeatSetPoint",
            "Thermostat.GetOperationMode",
            "Thermostat.GetFanMode",
            "Thermostat.GetDayMode",
        ]
    }

    fn status_categories() -> &'static [StatusCategory] {
        &[
            StatusCategory::Temp,
            StatusCategory::ThermFan,
            StatusCategory::ThermOp,
            StatusCategory::ThermDay,
        ]
    }

    fn apply_object_status(&mut self, method: &str, result: &str, _args: &[String]) -> bool {
        match method {
            "Thermostat.GetIndoorTemperature" | "Thermostat.GetIndoorTemperatureHW" => {
                set_field(&mut self.state.indoor_temperature, decode_fixed(result))
            }
            "Thermostat.GetOutdoorTemperature" | "Thermostat.GetOutdoorTemperatureHW" => {
                set_field(&mut self.state.outdoor_temperature, decode_fixed(result))
            }
            "Thermostat.GetCoolSetPoint" | "Thermostat.GetCoolSetPointHW" => {
                set_field(&mut self.state.cool_set_point, decode_fixed(result))
            }
            "Thermostat.GetHeatSetPoint" | "Thermostat.GetHeatSetPointHW" => {
                set_field(&mut self.state.heat_set_point, decode_fixed(result))
            }
            "Thermostat.GetOperationMode" => set_field(
                &mut self.state.operation_mode,
                decode_int(result).and_then(OperationMode::from_wire),
            ),
            "Thermostat.GetFanMode" => set_field(
                &mut self.state.fan_mode,
                match decode_int(result) {
                    Some(0) => Some(FanMode::Auto),
                    Some(1) => Some(FanMode::On),
                    _ => None,
                },
            ),
            "Thermostat.GetDayMode" => set_field(
                &mut self.state.day_mode,
                match decode_int(result) {
                    Some(0) => Some(DayMode::Day),
                    Some(1) => Some(DayMode::Night),
                    _ => None,
                },
            ),
            _ => unknown_method(Self::KIND, method),
        }
    }

    fn apply_category_status(&mut self, category: &str, args: &[String]) -> bool {
        match (category, args.first()) {
            // S:TEMP <vid> <indoor temp>
            ("TEMP", Some(temp)) => {
                set_field(&mut self.state.indoor_temperature, decode_decimal(temp))
            }
            ("THERMFAN", Some(fan)) => set_field(
                &mut self.state.fan_mode,
                match fan.as_str() {
                    "AUTO" | "0" => Some(FanMode::Auto),
                    "ON" | "1" => Some(FanMode::On),
                    _ => None,
                },
            ),
            ("THERMOP", Some(op)) => set_field(
                &mut self.state.operation_mode,
                match op.as_str() {
                    "OFF" | "0" => Some(OperationMode::Off),
                    "COOL" | "1" => Some(OperationMode::Cool),
                    "HEAT" | "2" => Some(OperationMode::Heat),
                    "AUTO" | "3" => Some(OperationMode::Auto),
                    _ => None,
                },
            ),
            ("THERMDAY", Some(day)) => set_field(
                &mut self.state.day_mode,
                match day.as_str() {
                    "DAY" | "0" => Some(DayMode::Day),
                    "NIGHT" | "1" => Some(DayMode::Night),
                    _ => None,
                },
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setpoint_status_decodes_celsius() {
        let mut thermostat = Thermostat {
            info: ObjectInfo::default(),
            state: ThermostatState::default(),
        };

        assert!(thermostat.apply_object_status("Thermostat.GetCoolSetPoint", "22.500", &[]));
        assert_eq!(thermostat.state.cool_set_point, Some(22.5));

        assert!(thermostat.apply_category_status("THERMOP", &["COOL".to_string()]));
        assert_eq!(thermostat.state.operation_mode, Some(OperationMode::Cool));
    }
}
