//! Minimal XML element tree for the list adapters.
//!
//! The authority payloads are record-oriented documents a few megabytes in
//! size, so the adapters navigate a small owned tree instead of juggling
//! streaming state per format. Built on the quick-xml event reader.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::ParseError;

/// An owned XML element: tag name (namespace stripped), attributes,
/// children in document order, and concatenated direct text.
#[derive(Debug, Clone, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    /// Parse a whole payload into its root element.
    pub fn parse(bytes: &[u8]) -> Result<Element, ParseError> {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();

        // Stack of open elements; index 0 is a synthetic holder for the root.
        let mut stack: Vec<Element> = vec![Element::default()];

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    stack.push(element_from_start(&e)?);
                }
                Ok(Event::Empty(e)) => {
                    let elem = element_from_start(&e)?;
                    stack
                        .last_mut()
                        .ok_or_else(|| ParseError::Xml("unbalanced element".into()))?
                        .children
                        .push(elem);
                }
                Ok(Event::Text(t)) => {
                    let text = t
                        .unescape()
                        .map_err(|e| ParseError::Xml(e.to_string()))?
                        .into_owned();
                    if let Some(open) = stack.last_mut() {
                        if !open.text.is_empty() {
                            open.text.push(' ');
                        }
                        open.text.push_str(text.trim());
                    }
                }
                Ok(Event::End(_)) => {
                    let closed = stack
                        .pop()
                        .ok_or_else(|| ParseError::Xml("unbalanced close tag".into()))?;
                    stack
                        .last_mut()
                        .ok_or_else(|| ParseError::Xml("close tag without parent".into()))?
                        .children
                        .push(closed);
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(ParseError::Xml(e.to_string())),
                _ => {}
            }
            buf.clear();
        }

        let mut holder = stack
            .pop()
            .ok_or_else(|| ParseError::Xml("empty document".into()))?;
        if !stack.is_empty() {
            return Err(ParseError::Xml("unclosed element at end of input".into()));
        }
        match holder.children.len() {
            0 => Err(ParseError::Xml("document has no root element".into())),
            1 => Ok(holder.children.remove(0)),
            n => Err(ParseError::Xml(format!("{} root elements", n))),
        }
    }

    /// Attribute value by local name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First direct child with the given tag name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children with the given tag name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Trimmed text of the first direct child with the given tag name;
    /// `None` when missing or empty.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name)
            .map(|c| c.text.trim())
            .filter(|t| !t.is_empty())
    }

    /// All elements with the given tag name, at any depth, document order.
    pub fn descendants(&self, name: &str) -> Vec<&Element> {
        fn walk<'a>(elem: &'a Element, name: &str, out: &mut Vec<&'a Element>) {
            for child in &elem.children {
                if child.name == name {
                    out.push(child);
                }
                walk(child, name, out);
            }
        }
        let mut found = Vec::new();
        walk(self, name, &mut found);
        found
    }
}

fn element_from_start(e: &quick_xml::events::BytesStart<'_>) -> Result<Element, ParseError> {
    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| ParseError::Xml(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| ParseError::Xml(e.to_string()))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
        text: String::new(),
    })
}
