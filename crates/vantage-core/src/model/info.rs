// ── Object identity and shared attributes ──

use vantage_api::{ObjectRecord, Vid};

/// The closed set of object kinds this library models.
///
/// An object's kind never changes after creation; the session-wide kind
/// index rejects a same-VID insert under a different kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Load,
    RgbLoad,
    Button,
    DryContact,
    Blind,
    GMem,
    Task,
    Thermostat,
    TemperatureSensor,
    AnemoSensor,
    LightSensor,
    OmniSensor,
    Area,
    Master,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Load => "Load",
            Self::RgbLoad => "RgbLoad",
            Self::Button => "Button",
            Self::DryContact => "DryContact",
            Self::Blind => "Blind",
            Self::GMem => "GMem",
            Self::Task => "Task",
            Self::Thermostat => "Thermostat",
            Self::TemperatureSensor => "TemperatureSensor",
            Self::AnemoSensor => "AnemoSensor",
            Self::LightSensor => "LightSensor",
            Self::OmniSensor => "OmniSensor",
            Self::Area => "Area",
            Self::Master => "Master",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attributes every object carries.
///
/// `area`, `parent`, and `master` are weak back-references: they store
/// VIDs, never owning handles, and may dangle (lookups then fail).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectInfo {
    pub vid: Vid,
    pub master: Option<Vid>,
    pub name: String,
    pub model: String,
    pub note: String,
    pub d_name: Option<String>,
    pub area: Option<Vid>,
    pub parent: Option<Vid>,
}

impl ObjectInfo {
    pub(crate) fn from_record(record: &ObjectRecord) -> Self {
        Self {
            vid: record.vid,
            master: record.master,
            name: record.property("Name").unwrap_or_default().to_string(),
            model: record.property("Model").unwrap_or_default().to_string(),
            note: record.property("Note").unwrap_or_default().to_string(),
            d_name: record.property_nonempty("DName").map(str::to_string),
            area: record.property_vid("Area"),
            parent: record.property_vid("Parent"),
        }
    }

    /// The display name, falling back to the configured name.
    pub fn display_name(&self) -> &str {
        self.d_name.as_deref().unwrap_or(&self.name)
    }
}
