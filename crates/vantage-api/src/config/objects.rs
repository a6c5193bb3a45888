// Raw object records returned by `IConfiguration` calls.
//
// A record is the untyped form of one `<Object>` payload: the wire type
// name, the VID, and a flat view of the child elements. Decoding into a
// typed variant happens in `vantage-core` against its binding tables.

use std::collections::HashMap;

use crate::xml::Element;
use crate::Vid;

/// One object as returned by `GetFilterResults` or `GetObject`.
#[derive(Debug, Clone)]
pub struct ObjectRecord {
    /// The declared `ObjectType` (the element name), e.g. `"Load"`.
    pub object_type: String,
    /// The Vantage ID, from the `VID` attribute.
    pub vid: Vid,
    /// The owning master, from the `Master` attribute.
    pub master: Option<Vid>,
    /// Direct child elements: name -> text content.
    properties: HashMap<String, String>,
    /// Attributes of direct children: "Child.attr" -> value.
    property_attrs: HashMap<String, String>,
}

impl ObjectRecord {
    /// Build a record from the typed element inside an `<Object>` wrapper.
    pub(crate) fn from_element(element: &Element) -> Option<Self> {
        let vid = element.attr("VID")?.parse().ok()?;
        let master = element.attr("Master").and_then(|m| m.parse().ok());

        let mut properties = HashMap::new();
        let mut property_attrs = HashMap::new();
        for child in &element.children {
            properties.insert(child.name.clone(), child.text.clone());
            for (attr, value) in &child.attributes {
                property_attrs.insert(format!("{}.{}", child.name, attr), value.clone());
            }
        }

        Some(Self {
            object_type: element.name.clone(),
            vid,
            master,
            properties,
            property_attrs,
        })
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// A non-empty property value, or `None`.
    pub fn property_nonempty(&self, name: &str) -> Option<&str> {
        self.property(name).filter(|v| !v.is_empty())
    }

    pub fn property_vid(&self, name: &str) -> Option<Vid> {
        self.property_nonempty(name)?.parse().ok()
    }

    pub fn property_bool(&self, name: &str) -> Option<bool> {
        match self.property_nonempty(name)? {
            "true" | "True" | "1" => Some(true),
            "false" | "False" | "0" => Some(false),
            _ => None,
        }
    }

    /// Attribute of a direct child element, e.g. `("Tag", "object")`.
    pub fn property_attr(&self, child: &str, attr: &str) -> Option<&str> {
        self.property_attrs
            .get(&format!("{child}.{attr}"))
            .map(String::as_str)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn record_from_load_element() {
        let root = Element::parse(concat!(
            r#"<Load VID="118" Master="1">"#,
            "<Name>Kitchen</Name><Model>Dimmer</Model><Note/>",
            "<Area>5</Area><LoadType>Incandescent</LoadType>",
            r#"<Parent Position="2">10</Parent>"#,
            "</Load>",
        ))
        .unwrap();

        let record = ObjectRecord::from_element(&root).unwrap();
        assert_eq!(record.object_type, "Load");
        assert_eq!(record.vid, 118);
        assert_eq!(record.master, Some(1));
        assert_eq!(record.property("Name"), Some("Kitchen"));
        assert_eq!(record.property_vid("Area"), Some(5));
        assert_eq!(record.property_vid("Parent"), Some(10));
        assert_eq!(record.property_attr("Parent", "Position"), Some("2"));
        assert_eq!(record.property_nonempty("Note"), None);
    }

    #[test]
    fn record_without_vid_is_rejected() {
        let root = Element::parse("<Load><Name>x</Name></Load>").unwrap();
        assert!(ObjectRecord::from_element(&root).is_none());
    }
}
