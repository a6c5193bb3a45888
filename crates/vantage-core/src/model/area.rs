// Container kinds without interface state: areas and masters.

use vantage_api::ObjectRecord;

use super::{ObjectInfo, ObjectKind, VantageObject};

/// A location in the area tree. Other objects reference it by VID.
#[derive(Debug, Clone, PartialEq)]
pub struct Area {
    pub info: ObjectInfo,
}

impl VantageObject for Area {
    const KIND: ObjectKind = ObjectKind::Area;

    fn wire_types() -> &'static [&'static str] {
        &["Area"]
    }

    fn from_record(record: &ObjectRecord) -> Option<Self> {
        Some(Self {
            info: ObjectInfo::from_record(record),
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
}

/// The physical controller itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Master {
    pub info: ObjectInfo,
    pub serial_number: Option<u64>,
}

impl VantageObject for Master {
    const KIND: ObjectKind = ObjectKind::Master;

    fn wire_types() -> &'static [&'static str] {
        &["Master"]
    }

    fn from_record(record: &ObjectRecord) -> Option<Self> {
        Some(Self {
            info: ObjectInfo::from_record(record),
            serial_number: record
                .property("SerialNumber")
                .and_then(|s| s.parse().ok()),
        })
    }

    fn info(&self) -> &ObjectInfo {
        &self.info
    }

    fn update_config(&mut self, other: &Self) -> bool {
        let changed = self.info != other.info || self.serial_number != other.serial_number;
        self.info = other.info.clone();
        self.serial_number = other.serial_number;
        changed
    }
}
