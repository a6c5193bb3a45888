// GMem (variable) kind.
//
// Values are fetched over `GETVARIABLE` rather than the `GMem.Fetch`
// byte-buffer interface, so this kind overrides the default invoke-based
// state fetch.

use std::future::Future;

use tracing::debug;

use vantage_api::command::interfaces::GMemValue;
use vantage_api::{CommandClient, Error as ApiError, ObjectRecord, StatusCategory};

use super::{set_field, ObjectInfo, ObjectKind, VantageObject};
use crate::error::Error;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GMemState {
    pub value: Option<GMemValue>,
}

/// A controller variable.
#[derive(Debug, Clone, PartialEq)]
pub struct GMem {
    pub info: ObjectInfo,
    /// Declared tag type, e.g. `"Level"`, `"Text"`, `"bool"`.
    pub tag: String,
    /// Whether the tag points at another object.
    pub is_object_ref: bool,
    pub persistent: bool,
    pub state: GMemState,
}

impl GMem {
    pub fn value(&self) -> Option<&GMemValue> {
        self.state.value.as_ref()
    }

    pub fn is_bool(&self) -> bool {
        self.tag == "bool"
    }

    pub fn is_str(&self) -> bool {
        self.tag == "Text"
    }

    pub fn is_int(&self) -> bool {
        matches!(
            self.tag.as_str(),
            "Delay" | "DeviceUnits" | "Level" | "Load" | "Number" | "Seconds" | "Task" | "DegC"
        )
    }
}

impl VantageObject for GMem {
    const KIND: ObjectKind = ObjectKind::GMem;

    fn wire_types() -> &'static [&'static str] {
        &["GMem"]
    }

    fn from_record(record: &ObjectRecord) -> Option<Self> {
        Some(Self {
            info: ObjectInfo::from_record(record),
            tag: record.property("Tag").unwrap_or_default().to_string(),
            is_object_ref: record
                .property_attr("Tag", "object")
                .is_some_and(|v| v == "true" || v == "1"),
            persistent: record.property_bool("Persistent").unwrap_or(false),
            state: GMemState::default(),
        })
    }

    fn info(&self) -> &ObjectInfo {
        &self.info
    }

    fn update_config(&mut self, other: &Self) -> bool {
        let changed = self.info != other.info
            || self.tag != other.tag
            || self.is_object_ref != other.is_object_ref
            || self.persistent != other.persistent;
        self.info = other.info.clone();
        self.tag = other.tag.clone();
        self.is_object_ref = other.is_object_ref;
        self.persistent = other.persistent;
        changed
    }

    fn status_categories() -> &'static [StatusCategory] {
        &[StatusCategory::Variable]
    }

    fn apply_object_status(&mut self, method: &str, result: &str, _args: &[String]) -> bool {
        match method {
            "GMem.Fetch" => set_field(&mut self.state.value, Some(GMemValue::parse(result))),
            _ => super::unknown_method(Self::KIND, method),
        }
    }

    fn apply_category_status(&mut self, category: &str, args: &[String]) -> bool {
        match (category, args.first()) {
            // S:VARIABLE <vid> <value>
            ("VARIABLE", Some(value)) => {
                set_field(&mut self.state.value, Some(GMemValue::parse(value)))
            }
            _ => false,
        }
    }

    fn fetch_state(
        &mut self,
        client: &CommandClient,
    ) -> impl Future<Output = Result<bool, Error>> + Send {
        async move {
            match client.gmem().get(self.info.vid).await {
                Ok(value) => Ok(set_field(&mut self.state.value, Some(value))),
                Err(ApiError::Command { code, message }) => {
                    debug!(vid = self.info.vid, code = code.code(), message = %message, "variable fetch skipped");
                    Ok(false)
                }
                Err(err) => Err(err.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_status_updates_value() {
        let mut gmem = GMem {
            info: ObjectInfo::default(),
            tag: "Number".into(),
            is_object_ref: false,
            persistent: false,
            state: GMemState::default(),
        };

        assert!(gmem.apply_category_status("VARIABLE", &["42".to_string()]));
        assert_eq!(gmem.value(), Some(&GMemValue::Int(42)));

        assert!(gmem.apply_category_status("VARIABLE", &["hello".to_string()]));
        assert_eq!(gmem.value(), Some(&GMemValue::Str("hello".into())));
    }

    #[test]
    fn tag_type_classification() {
        let mut gmem = GMem {
            info: ObjectInfo::default(),
            tag: "Text".into(),
            is_object_ref: false,
            persistent: true,
            state: GMemState::default(),
        };
        assert!(gmem.is_str());
        gmem.tag = "Level".into();
        assert!(gmem.is_int());
        gmem.tag = "bool".into();
        assert!(gmem.is_bool());
    }
}
