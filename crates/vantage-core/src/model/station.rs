// Keypad buttons and dry contacts. Both speak the `Button` interface.

use vantage_api::{ObjectRecord, StatusCategory};

use super::{set_field, unknown_method, ObjectInfo, ObjectKind, VantageObject};

// ── Button ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ButtonState {
    pub pressed: Option<bool>,
}

/// A keypad button.
#[derive(Debug, Clone, PartialEq)]
pub struct Button {
    pub info: ObjectInfo,
    /// Engraving text, when configured.
    pub text: String,
    pub state: ButtonState,
}

impl Button {
    pub fn is_pressed(&self) -> bool {
        self.state.pressed.unwrap_or(false)
    }
}

impl VantageObject for Button {
    const KIND: ObjectKind = ObjectKind::Button;

    fn wire_types() -> &'static [&'static str] {
        &["Button"]
    }

    fn from_record(record: &ObjectRecord) -> Option<Self> {
        Some(Self {
            info: ObjectInfo::from_record(record),
            text: record.property("Text1").unwrap_or_default().to_string(),
            state: ButtonState::default(),
        })
    }

    fn info(&self) -> &ObjectInfo {
        &self.info
    }

    fn update_config(&mut self, other: &Self) -> bool {
        let changed = self.info != other.info || self.text != other.text;
        self.info = other.info.clone();
        self.text = other.text.clone();
        changed
    }

    fn state_methods() -> &'static [&'static str] {
        &["Button.GetState"]
    }

    fn status_categories() -> &'static [StatusCategory] {
        &[StatusCategory::Btn]
    }

    fn apply_object_status(&mut self, method: &str, result: &str, _args: &[String]) -> bool {
        match method {
            "Button.GetState" => set_field(&mut self.state.pressed, decode_press_state(result)),
            _ => unknown_method(Self::KIND, method),
        }
    }

    fn apply_category_status(&mut self, category: &str, args: &[String]) -> bool {
        match (category, args.first().map(String::as_str)) {
            // S:BTN <vid> <PRESS|RELEASE>
            ("BTN", Some(state)) => set_field(&mut self.state.pressed, decode_press_state(state)),
            _ => false,
        }
    }
}

// ── DryContact ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DryContactState {
    pub triggered: Option<bool>,
}

/// A dry contact input (motion sensor, door contact, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct DryContact {
    pub info: ObjectInfo,
    pub state: DryContactState,
}

impl DryContact {
    pub fn is_triggered(&self) -> bool {
        self.state.triggered.unwrap_or(false)
    }
}

impl VantageObject for DryContact {
    const KIND: ObjectKind = ObjectKind::DryContact;

    fn wire_types() -> &'static [&'static str] {
        &["DryContact"]
    }

    fn from_record(record: &ObjectRecord) -> Option<Self> {
        Some(Self {
            info: ObjectInfo::from_record(record),
            state: DryContactState::default(),
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
        &["Button.GetState"]
    }

    fn status_categories() -> &'static [StatusCategory] {
        &[StatusCategory::Btn]
    }

    fn apply_object_status(&mut self, method: &str, result: &str, _args: &[String]) -> bool {
        match method {
            "Button.GetState" => {
                set_field(&mut self.state.triggered, decode_press_state(result))
            }
            _ => unknown_method(Self::KIND, method),
        }
    }

    fn apply_category_status(&mut self, category: &str, args: &[String]) -> bool {
        match (category, args.first().map(String::as_str)) {
            ("BTN", Some(state)) => {
                set_field(&mut self.state.triggered, decode_press_state(state))
            }
            _ => false,
        }
    }
}

/// Both wire spellings: numeric `0`/`1` (object status) and the
/// `PRESS`/`RELEASE` words (category status).
fn decode_press_state(token: &str) -> Option<bool> {
    match token {
        "PRESS" | "PRESSED" | "1" => Some(true),
        "RELEASE" | "RELEASED" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_press_and_release() {
        let mut button = Button {
            info: ObjectInfo::default(),
            text: String::new(),
            state: ButtonState::default(),
        };

        assert!(button.apply_category_status("BTN", &["PRESS".to_string()]));
        assert!(button.is_pressed());
        assert!(button.apply_category_status("BTN", &["RELEASE".to_string()]));
        assert!(!button.is_pressed());
    }

    #[test]
    fn numeric_state_from_object_status() {
        let mut button = Button {
            info: ObjectInfo::default(),
            text: String::new(),
            state: ButtonState::default(),
        };
        assert!(button.apply_object_status("Button.GetState", "1", &[]));
        assert!(button.is_pressed());
    }
}
