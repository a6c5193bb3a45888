// Minimal element tree for ACI response bodies.
//
// Frames are small (a page of 50 objects at most), so a simple owned
// tree built from quick-xml events keeps the call sites readable.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::Error;

#[derive(Debug, Clone, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    /// Parse a complete XML document into its root element.
    pub fn parse(xml: &str) -> Result<Element, Error> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => {
                    let mut element = Element {
                        name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
                        ..Element::default()
                    };
                    for attr in start.attributes().flatten() {
                        element.attributes.push((
                            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                            attr.unescape_value()
                                .map_err(|e| Error::decode(e.to_string()))?
                                .into_owned(),
                        ));
                    }
                    stack.push(element);
                }
                Ok(Event::Empty(start)) => {
                    let mut element = Element {
                        name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
                        ..Element::default()
                    };
                    for attr in start.attributes().flatten() {
                        element.attributes.push((
                            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                            attr.unescape_value()
                                .map_err(|e| Error::decode(e.to_string()))?
                                .into_owned(),
                        ));
                    }
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => root = Some(element),
                    }
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| Error::decode("unbalanced closing tag"))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => {
                            root = Some(element);
                            break;
                        }
                    }
                }
                Ok(Event::Text(text)) => {
                    if let Some(top) = stack.last_mut() {
                        top.text
                            .push_str(&text.unescape().map_err(|e| Error::decode(e.to_string()))?);
                    }
                }
                Ok(Event::CData(cdata)) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(&cdata));
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(Error::decode(format!("invalid XML: {e}"))),
            }
        }

        root.ok_or_else(|| Error::decode("empty XML document"))
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text content of a direct child element.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }
}
