//! A minimal namespace-aware XML element tree.
//!
//! Built with [`quick_xml::NsReader`] so that child lookup can match on the
//! namespace URI rather than whatever prefix the publisher happened to use.
//! Only what the dialects need is kept: names, attributes, text, children.
//! Comments, processing instructions and the doctype are discarded.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;

use crate::error::FeedError;

/// One element of a parsed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Namespace URI, if the element is in one.
    pub namespace: Option<String>,
    /// Local name (no prefix).
    pub name: String,
    /// `(local name, unescaped value)` pairs in document order.
    pub attributes: Vec<(String, String)>,
    /// Concatenated text and CDATA directly inside this element.
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    /// Parse `xml` and return its root element.
    pub fn parse(xml: &str) -> Result<Self, FeedError> {
        let mut reader = NsReader::from_str(xml);

        // Open elements, innermost last.
        let mut stack: Vec<Element> = Vec::new();

        loop {
            let (ns, event) = reader
                .read_resolved_event()
                .map_err(|e| FeedError::Xml(e.to_string()))?;
            let namespace = namespace_uri(&ns);

            match event {
                Event::Start(e) => stack.push(Self::open(namespace, &e)?),
                Event::Empty(e) => {
                    let element = Self::open(namespace, &e)?;
                    if let Some(root) = close(&mut stack, element) {
                        return Ok(root);
                    }
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| FeedError::Xml("unexpected closing tag".into()))?;
                    if let Some(root) = close(&mut stack, element) {
                        return Ok(root);
                    }
                }
                Event::Text(e) => {
                    let text = e.unescape().map_err(|e| FeedError::Xml(e.to_string()))?;
                    if let Some(open) = stack.last_mut() {
                        open.text.push_str(&text);
                    }
                }
                Event::CData(e) => {
                    if let Some(open) = stack.last_mut() {
                        open.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                    }
                }
                Event::Eof => return Err(FeedError::Xml("document has no root element".into())),
                _ => {}
            }
        }
    }

    fn open(namespace: Option<String>, start: &BytesStart<'_>) -> Result<Self, FeedError> {
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| FeedError::Xml(e.to_string()))?;
            if attr.key.as_namespace_binding().is_some() {
                continue;
            }
            let value = attr
                .unescape_value()
                .map_err(|e| FeedError::Xml(e.to_string()))?;
            attributes.push((
                String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned(),
                value.into_owned(),
            ));
        }
        Ok(Self {
            namespace,
            name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            attributes,
            ..Self::default()
        })
    }

    /// First child named `name` in namespace `ns`.
    pub fn child(&self, ns: Option<&str>, name: &str) -> Option<&Element> {
        self.children
            .iter()
            .find(|c| c.name == name && c.namespace.as_deref() == ns)
    }

    /// All children named `name` in namespace `ns`, in document order.
    pub fn children_named<'a>(
        &'a self,
        ns: Option<&'a str>,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.children
            .iter()
            .filter(move |c| c.name == name && c.namespace.as_deref() == ns)
    }

    /// Text of the first matching child, or `""`.
    pub fn child_text(&self, ns: Option<&str>, name: &str) -> &str {
        self.child(ns, name).map(|c| c.text.as_str()).unwrap_or_default()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

fn namespace_uri(ns: &ResolveResult<'_>) -> Option<String> {
    match ns {
        ResolveResult::Bound(Namespace(uri)) => Some(String::from_utf8_lossy(uri).into_owned()),
        _ => None,
    }
}

/// Attach a finished element to its parent.  Returns it when it was the
/// root.
///
/// Text is trimmed only here, once every text and CDATA run inside the
/// element has been joined, so whitespace between runs survives.
fn close(stack: &mut [Element], mut element: Element) -> Option<Element> {
    let trimmed = element.text.trim();
    if trimmed.len() != element.text.len() {
        element.text = trimmed.to_string();
    }
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            None
        }
        None => Some(element),
    }
}
