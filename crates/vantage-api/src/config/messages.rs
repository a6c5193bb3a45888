// Request payloads and response decoders for the ACI interfaces.
//
// Requests are rendered by hand (they are a handful of fixed shapes);
// responses are decoded from the parsed frame. The element naming
// follows the service's PascalCase convention, except the historical
// lowercase `call` / `return` / `hFilter` names.

use crate::error::Error;
use crate::xml::{escape, Element};
use crate::Vid;

use super::objects::ObjectRecord;

// ── IIntrospection ───────────────────────────────────────────────────

/// Firmware versions reported by `IIntrospection.GetVersion`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Version {
    pub kernel: String,
    pub rootfs: String,
    pub app: String,
}

/// One RPC interface reported by `IIntrospection.GetInterfaces`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub name: String,
    pub version: String,
    pub iid: u32,
}

/// One object type reported by `IIntrospection.GetTypes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub name: String,
    pub version: String,
}

/// Controller identity reported by `IIntrospection.GetSysInfo`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SysInfo {
    pub master_number: u32,
    pub serial_number: u64,
}

pub(crate) fn decode_version(ret: &Element) -> Version {
    Version {
        kernel: ret.child_text("kernel").unwrap_or_default().to_string(),
        rootfs: ret.child_text("rootfs").unwrap_or_default().to_string(),
        app: ret.child_text("app").unwrap_or_default().to_string(),
    }
}

pub(crate) fn decode_interfaces(ret: &Element) -> Vec<InterfaceInfo> {
    ret.children_named("Interface")
        .filter_map(|el| {
            Some(InterfaceInfo {
                name: el.child_text("Name")?.to_string(),
                version: el.child_text("Version").unwrap_or_default().to_string(),
                iid: el.child_text("IID")?.parse().ok()?,
            })
        })
        .collect()
}

pub(crate) fn decode_types(ret: &Element) -> Vec<TypeInfo> {
    ret.children_named("Type")
        .filter_map(|el| {
            Some(TypeInfo {
                name: el.child_text("Name")?.to_string(),
                version: el.child_text("Version").unwrap_or_default().to_string(),
            })
        })
        .collect()
}

pub(crate) fn decode_sys_info(ret: &Element) -> Result<SysInfo, Error> {
    let info = ret
        .child("SysInfo")
        .ok_or_else(|| Error::decode("GetSysInfo response missing <SysInfo>"))?;
    Ok(SysInfo {
        master_number: parse_child(info, "MasterNumber")?,
        serial_number: parse_child(info, "SerialNumber")?,
    })
}

// ── ILogin ───────────────────────────────────────────────────────────

pub(crate) fn login_call(user: &str, password: &str) -> String {
    format!(
        "<User>{}</User><Password>{}</Password>",
        escape(user),
        escape(password)
    )
}

// ── IConfiguration ───────────────────────────────────────────────────

pub(crate) fn open_filter_call(object_types: &[&str], xpath: Option<&str>) -> String {
    let mut call = String::new();
    if !object_types.is_empty() {
        call.push_str("<Objects>");
        for object_type in object_types {
            call.push_str(&format!("<ObjectType>{}</ObjectType>", escape(object_type)));
        }
        call.push_str("</Objects>");
    }
    if let Some(xpath) = xpath {
        call.push_str(&format!("<XPath>{}</XPath>", escape(xpath)));
    }
    call
}

pub(crate) fn get_filter_results_call(handle: i32, count: u32, whole_object: bool) -> String {
    format!("<hFilter>{handle}</hFilter><Count>{count}</Count><WholeObject>{whole_object}</WholeObject>")
}

pub(crate) fn get_object_call(vids: &[Vid]) -> String {
    vids.iter().map(|vid| format!("<VID>{vid}</VID>")).collect()
}

/// Decode the `<Object>` list shared by `GetFilterResults` and `GetObject`.
pub(crate) fn decode_object_list(ret: &Element) -> Vec<ObjectRecord> {
    ret.children_named("Object")
        .filter_map(|wrapper| wrapper.children.first())
        .filter_map(ObjectRecord::from_element)
        .collect()
}

pub(crate) fn decode_bool(ret: &Element) -> Result<bool, Error> {
    match ret.text.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(Error::decode(format!("expected boolean, got {other:?}"))),
    }
}

pub(crate) fn decode_i32(ret: &Element) -> Result<i32, Error> {
    ret.text
        .trim()
        .parse()
        .map_err(|_| Error::decode(format!("expected integer, got {:?}", ret.text)))
}

fn parse_child<T: std::str::FromStr>(el: &Element, name: &str) -> Result<T, Error> {
    el.child_text(name)
        .and_then(|t| t.trim().parse().ok())
        .ok_or_else(|| Error::decode(format!("missing or invalid <{name}>")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn open_filter_call_shape() {
        let call = open_filter_call(&["Load", "Button"], Some("/Load"));
        assert_eq!(
            call,
            "<Objects><ObjectType>Load</ObjectType><ObjectType>Button</ObjectType></Objects><XPath>/Load</XPath>"
        );
    }

    #[test]
    fn login_call_escapes_entities() {
        let call = login_call("user", r#"p<&>"word"#);
        assert!(call.contains("p&lt;&amp;&gt;&quot;word"));
    }

    #[test]
    fn decode_version_fields() {
        let ret = Element::parse(
            "<return><kernel>5.10</kernel><rootfs>2.0.1</rootfs><app>4.2.7</app></return>",
        )
        .unwrap();
        let version = decode_version(&ret);
        assert_eq!(version.kernel, "5.10");
        assert_eq!(version.rootfs, "2.0.1");
        assert_eq!(version.app, "4.2.7");
    }

    #[test]
    fn decode_object_list_skips_malformed_entries() {
        let ret = Element::parse(concat!(
            "<return>",
            r#"<Object><Load VID="118"><Name>A</Name></Load></Object>"#,
            r#"<Object><Load><Name>no vid</Name></Load></Object>"#,
            r#"<Object><Button VID="120"><Name>B</Name></Button></Object>"#,
            "</return>",
        ))
        .unwrap();

        let records = decode_object_list(&ret);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].vid, 118);
        assert_eq!(records[1].object_type, "Button");
    }

    #[test]
    fn decode_interface_list() {
        let ret = Element::parse(concat!(
            "<return>",
            "<Interface><Name>IConfiguration</Name><Version>1.0</Version><IID>3</IID></Interface>",
            "<Interface><Name>IIntrospection</Name><Version>1.0</Version><IID>4</IID></Interface>",
            "</return>",
        ))
        .unwrap();

        let interfaces = decode_interfaces(&ret);
        assert_eq!(interfaces.len(), 2);
        assert_eq!(interfaces[0].name, "IConfiguration");
        assert_eq!(interfaces[1].iid, 4);
    }
}
