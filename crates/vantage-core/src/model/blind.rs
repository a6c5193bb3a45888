// Blind kinds. One struct covers every wire type that implements the
// `Blind` interface.

use vantage_api::{ObjectRecord, StatusCategory};

use super::{
    decode_decimal, decode_fixed, set_field, unknown_method, ObjectInfo, ObjectKind, VantageObject,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlindState {
    /// Position as a percentage: 0 closed, 100 open.
    pub position: Option<f64>,
}

/// A motorized shade or blind.
#[derive(Debug, Clone, PartialEq)]
pub struct Blind {
    pub info: ObjectInfo,
    /// The concrete wire type this blind was declared as.
    pub wire_type: String,
    pub state: BlindState,
}

impl Blind {
    pub fn position(&self) -> Option<f64> {
        self.state.position
    }
}

impl VantageObject for Blind {
    const KIND: ObjectKind = ObjectKind::Blind;

    fn wire_types() -> &'static [&'static str] {
        &[
            "QubeBlind",
            "QISBlind",
            "Somfy.RS-485_Shade_CHILD",
            "Somfy.URTSI_2_Shade_CHILD",
        ]
    }

    fn from_record(record: &ObjectRecord) -> Option<Self> {
        Some(Self {
            info: ObjectInfo::from_record(record),
            wire_type: record.object_type.clone(),
            state: BlindState::default(),
        })
    }

    fn info(&self) -> &ObjectInfo {
        &self.info
    }

    fn update_config(&mut self, other: &Self) -> bool {
        let changed = self.info != other.info || self.wire_type != other.wire_type;
        self.info = other.info.clone();
        self.wire_type = other.wire_type.clone();
        changed
    }

    fn state_methods() -> &'static [&'static str] {
        &["Blind.GetPosition"]
    }

    fn status_categories() -> &'static [StatusCategory] {
        &[StatusCategory::Blind]
    }

    fn apply_object_status(&mut self, method: &str, result: &str, _args: &[String]) -> bool {
        match method {
            "Blind.GetPosition" | "Blind.GetPositionHW" => {
                set_field(&mut self.state.position, decode_fixed(result))
            }
            _ => unknown_method(Self::KIND, method),
        }
    }

    fn apply_category_status(&mut self, category: &str, args: &[String]) -> bool {
        match (category, args.first()) {
            // S:BLIND <vid> <position (0-100)>
            ("BLIND", Some(position)) => {
                set_field(&mut self.state.position, decode_decimal(position))
            }
            _ => false,
        }
    }
}
