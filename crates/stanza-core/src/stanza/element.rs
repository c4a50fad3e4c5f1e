//! Structured payload element
//!
//! A namespaced element tree carried inside stanzas. Parsing and serialization
//! of the wire format happen outside this crate.

use serde::{Deserialize, Serialize};

/// Attribute holding an element's namespace
pub const XMLNS: &str = "xmlns";

/// Element node: name, ordered attributes, children and optional text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    attributes: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<Element>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

impl Element {
    /// Create an empty element
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Start building an element
    pub fn builder(name: impl Into<String>) -> ElementBuilder {
        ElementBuilder {
            element: Self::new(name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Set an attribute, replacing any previous value
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn remove_attribute(&mut self, key: &str) -> Option<String> {
        let index = self.attributes.iter().position(|(k, _)| k == key)?;
        Some(self.attributes.remove(index).1)
    }

    /// Namespace declared on this element
    pub fn namespace(&self) -> Option<&str> {
        self.attribute(XMLNS)
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// First child with the given name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// First child with the given name and namespace
    pub fn child_ns(&self, name: &str, namespace: &str) -> Option<&Element> {
        self.children
            .iter()
            .find(|c| c.name == name && c.namespace() == Some(namespace))
    }

    pub fn push_child(&mut self, child: Element) {
        self.children.push(child);
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }
}

/// Fluent builder for [`Element`]
#[derive(Debug, Clone)]
pub struct ElementBuilder {
    element: Element,
}

impl ElementBuilder {
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.element.set_attribute(key, value);
        self
    }

    pub fn namespace(self, namespace: impl Into<String>) -> Self {
        self.attribute(XMLNS, namespace)
    }

    pub fn child(mut self, child: Element) -> Self {
        self.element.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.element.children.extend(children);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.element.text = Some(text.into());
        self
    }

    pub fn build(self) -> Element {
        self.element
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let el = Element::builder("query")
            .namespace("jabber:iq:last")
            .attribute("seconds", "10")
            .text("Heading home")
            .child(Element::new("item"))
            .build();

        assert_eq!(el.name(), "query");
        assert_eq!(el.namespace(), Some("jabber:iq:last"));
        assert_eq!(el.attribute("seconds"), Some("10"));
        assert_eq!(el.text(), Some("Heading home"));
        assert!(el.child("item").is_some());
        assert!(el.child("missing").is_none());
    }

    #[test]
    fn test_set_attribute_replaces() {
        let mut el = Element::new("slot");
        el.set_attribute("url", "a");
        el.set_attribute("url", "b");
        assert_eq!(el.attributes().count(), 1);
        assert_eq!(el.attribute("url"), Some("b"));
        assert_eq!(el.remove_attribute("url"), Some("b".to_string()));
        assert_eq!(el.attribute("url"), None);
    }

    #[test]
    fn test_child_ns() {
        let el = Element::builder("error")
            .child(Element::builder("forbidden").namespace("ns:a").build())
            .child(Element::builder("forbidden").namespace("ns:b").build())
            .build();
        assert!(el.child_ns("forbidden", "ns:b").is_some());
        assert!(el.child_ns("forbidden", "ns:c").is_none());
    }
}
