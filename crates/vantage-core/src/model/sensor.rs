// Sensor kinds: temperature, wind, light, and omni (generic) sensors.

use vantage_api::{ObjectRecord, StatusCategory};

use super::{
    decode_decimal, decode_fixed, set_field, unknown_method, ObjectInfo, ObjectKind, VantageObject,
};

// ── TemperatureSensor ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemperatureSensorState {
    /// Degrees Celsius.
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureSensor {
    pub info: ObjectInfo,
    pub state: TemperatureSensorState,
}

impl VantageObject for TemperatureSensor {
    const KIND: ObjectKind = ObjectKind::TemperatureSensor;

    fn wire_types() -> &'static [&'static str] {
        &["Temperature"]
    }

    fn from_record(record: &ObjectRecord) -> Option<Self> {
        Some(Self {
            info: ObjectInfo::from_record(record),
            state: TemperatureSensorState::default(),
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
        &["Temperature.GetValue"]
    }

    fn status_categories() -> &'static [StatusCategory] {
        &[StatusCategory::Temp]
    }

    fn apply_object_status(&mut self, method: &str, result: &str, _args: &[String]) -> bool {
        match method {
            "Temperature.GetValue" | "Temperature.GetValueHW" => {
                set_field(&mut self.state.value, decode_fixed(result))
            }
            _ => unknown_method(Self::KIND, method),
        }
    }

    fn apply_category_status(&mut self, category: &str, args: &[String]) -> bool {
        match (category, args.first()) {
            ("TEMP", Some(value)) => set_field(&mut self.state.value, decode_decimal(value)),
            _ => false,
        }
    }
}

// ── AnemoSensor ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnemoSensorState {
    /// Wind speed.
    pub speed: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnemoSensor {
    pub info: ObjectInfo,
    pub state: AnemoSensorState,
}

impl VantageObject for AnemoSensor {
    const KIND: ObjectKind = ObjectKind::AnemoSensor;

    fn wire_types() -> &'static [&'static str] {
        &["AnemoSensor"]
    }

    fn from_record(record: &ObjectRecord) -> Option<Self> {
        Some(Self {
            info: ObjectInfo::from_record(record),
            state: AnemoSensorState::default(),
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
        &["AnemoSensor.GetSpeed"]
    }

    fn status_categories() -> &'static [StatusCategory] {
        &[StatusCategory::Wind]
    }

    fn apply_object_status(&mut self, method: &str, result: &str, _args: &[String]) -> bool {
        match method {
            "AnemoSensor.GetSpeed" | "AnemoSensor.GetSpeedHW" => {
                set_field(&mut self.state.speed, decode_fixed(result))
            }
            _ => unknown_method(Self::KIND, method),
        }
    }

    fn apply_category_status(&mut self, category: &str, args: &[String]) -> bool {
        match (category, args.first()) {
            // S:WIND <vid> <speed>
            ("WIND", Some(speed)) => set_field(&mut self.state.speed, decode_decimal(speed)),
            _ => false,
        }
    }
}

// ── LightSensor ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightSensorState {
    pub level: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LightSensor {
    pub info: ObjectInfo,
    pub state: LightSensorState,
}

impl VantageObject for LightSensor {
    const KIND: ObjectKind = ObjectKind::LightSensor;

    fn wire_types() -> &'static [&'static str] {
        &["LightSensor"]
    }

    fn from_record(record: &ObjectRecord) -> Option<Self> {
        Some(Self {
            info: ObjectInfo::from_record(record),
            state: LightSensorState::default(),
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
        &["LightSensor.GetLevel"]
    }

    fn status_categories() -> &'static [StatusCategory] {
        &[StatusCategory::Light]
    }

    fn apply_object_status(&mut self, method: &str, result: &str, _args: &[String]) -> bool {
        match method {
            "LightSensor.GetLevel" | "LightSensor.GetLevelHW" => {
                set_field(&mut self.state.level, decode_fixed(result))
            }
            _ => unknown_method(Self::KIND, method),
        }
    }

    fn apply_category_status(&mut self, category: &str, args: &[String]) -> bool {
        match (category, args.first()) {
            ("LIGHT", Some(level)) => set_field(&mut self.state.level, decode_decimal(level)),
            _ => false,
        }
    }
}

// ── OmniSensor ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OmniSensorState {
    /// Native level; the unit depends on the configured sensor model
    /// (current, power, ...).
    pub level: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OmniSensor {
    pub info: ObjectInfo,
    pub state: OmniSensorState,
}

impl VantageObject for OmniSensor {
    const KIND: ObjectKind = ObjectKind::OmniSensor;

    fn wire_types() -> &'static [&'static str] {
        &["OmniSensor"]
    }

    fn from_record(record: &ObjectRecord) -> Option<Self> {
        Some(Self {
            info: ObjectInfo::from_record(record),
            state: OmniSensorState::default(),
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
        &["Sensor.GetLevel"]
    }

    fn status_categories() -> &'static [StatusCategory] {
        &[StatusCategory::Current, StatusCategory::Power]
    }

    fn apply_object_status(&mut self, method: &str, result: &str, _args: &[String]) -> bool {
        match method {
            "Sensor.GetLevel" | "Sensor.GetLevelHW" => {
                set_field(&mut self.state.level, decode_fixed(result))
            }
            _ => unknown_method(Self::KIND, method),
        }
    }

    fn apply_category_status(&mut self, category: &str, args: &[String]) -> bool {
        match (category, args.first()) {
            ("CURRENT" | "POWER", Some(level)) => {
                set_field(&mut self.state.level, decode_decimal(level))
            }
            _ => false,
        }
    }
}
