use std::fmt;

use crate::node::Node;

/// Types that can be turned into a list of `(name, value)` attribute pairs.
///
/// A `None` value is dropped rather than serialized as the literal string
/// `"null"` — this is how optional attributes (e.g. a `Handler`'s `from`, or
/// a stanza's `type`) are meant to be omitted.
pub trait IntoAttrs {
    /// Converts `self` into an attribute vector, dropping `None` values.
    fn into_attrs(self) -> Vec<(String, String)>;
}

impl IntoAttrs for () {
    fn into_attrs(self) -> Vec<(String, String)> {
        Vec::new()
    }
}

impl<'a> IntoAttrs for &'a [(&'a str, &'a str)] {
    fn into_attrs(self) -> Vec<(String, String)> {
        self.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }
}

impl<'a, const N: usize> IntoAttrs for [(&'a str, &'a str); N] {
    fn into_attrs(self) -> Vec<(String, String)> {
        self.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }
}

impl<'a> IntoAttrs for &'a [(&'a str, Option<&'a str>)] {
    fn into_attrs(self) -> Vec<(String, String)> {
        self.iter()
            .filter_map(|(k, v)| v.map(|v| (k.to_string(), v.to_string())))
            .collect()
    }
}

impl IntoAttrs for Vec<(String, String)> {
    fn into_attrs(self) -> Vec<(String, String)> {
        self
    }
}

impl IntoAttrs for Vec<(String, Option<String>)> {
    fn into_attrs(self) -> Vec<(String, String)> {
        self.into_iter().filter_map(|(k, v)| v.map(|v| (k, v))).collect()
    }
}

/// An XML element: a name, an ordered attribute list, and a list of child
/// nodes (elements or text runs).
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    /// Creates a bare element with no attributes and no children.
    pub fn new(name: impl Into<String>) -> Element {
        Element {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Creates an element carrying the given `xmlns` namespace.
    pub fn new_with_ns(name: impl Into<String>, ns: impl Into<String>) -> Element {
        let mut el = Element::new(name);
        el.set_attr("xmlns", Some(ns.into()));
        el
    }

    /// The qualified element name, e.g. `"iq"` or `"stream:features"`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The element's `xmlns` attribute, if set.
    pub fn ns(&self) -> Option<&str> {
        self.attr("xmlns")
    }

    /// Looks up an attribute by name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterates over all `(name, value)` attribute pairs, in insertion order.
    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Sets (or clears, if `value` is `None`) a single attribute.
    pub fn set_attr(&mut self, name: impl Into<String>, value: Option<impl Into<String>>) {
        let name = name.into();
        match value {
            Some(value) => {
                let value = value.into();
                if let Some(slot) = self.attrs.iter_mut().find(|(k, _)| *k == name) {
                    slot.1 = value;
                } else {
                    self.attrs.push((name, value));
                }
            }
            None => self.attrs.retain(|(k, _)| *k != name),
        }
    }

    /// Merges a batch of attributes into this element, in order.
    pub fn merge_attrs(&mut self, attrs: impl IntoAttrs) {
        for (k, v) in attrs.into_attrs() {
            self.set_attr(k, Some(v));
        }
    }

    /// Appends a child element, returning nothing (use the fluent
    /// `ElementBuilder` in `crate::builder` for cursor-based composition).
    pub fn append_child(&mut self, child: Element) -> &mut Element {
        self.children.push(Node::Element(child));
        self.children.last_mut().unwrap().as_element_mut().unwrap()
    }

    /// Appends a text node.
    pub fn append_text(&mut self, text: impl Into<String>) {
        self.children.push(Node::Text(text.into()));
    }

    /// Pushes a raw node (element or text) onto the end of the child list.
    pub(crate) fn push_node(&mut self, node: Node) {
        self.children.push(node);
    }

    /// Total number of direct child nodes, elements and text alike.
    pub(crate) fn node_count(&self) -> usize {
        self.children.len()
    }

    /// Mutable access to every direct child node (elements and text).
    pub(crate) fn children_mut_raw(&mut self) -> impl Iterator<Item = &mut Node> {
        self.children.iter_mut()
    }

    /// All child nodes (elements and text runs), in document order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.children.iter()
    }

    /// All immediate child *elements* (text nodes are skipped), in document
    /// order.
    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Mutable access to immediate child elements.
    pub fn children_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(Node::as_element_mut)
    }

    /// Concatenation of all immediate text-node children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(Node::as_text)
            .collect::<Vec<_>>()
            .concat()
    }

    /// The first immediate child element matching `name`/`ns`, if any.
    pub fn get_child(&self, name: &str, ns: &str) -> Option<&Element> {
        self.children().find(|c| c.is(name, ns))
    }

    /// True iff this element has at least one immediate child matching
    /// `name`/`ns`.
    pub fn has_child(&self, name: &str, ns: &str) -> bool {
        self.get_child(name, ns).is_some()
    }

    /// True iff the element's qualified name equals `name` (case-sensitive)
    /// and its namespace equals `ns`.
    pub fn is(&self, name: &str, ns: &str) -> bool {
        self.name == name && self.ns() == Some(ns)
    }

    /// Serializes this element (and its subtree) as XML text.
    pub fn write_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (k, v) in &self.attrs {
            out.push(' ');
            out.push_str(k);
            out.push_str("=\"");
            escape_into(v, out);
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for node in &self.children {
            match node {
                Node::Element(e) => e.write_to(out),
                Node::Text(t) => escape_into(t, out),
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut s = String::new();
        self.write_to(&mut s);
        f.write_str(&s)
    }
}

fn escape_into(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omits_none_attrs() {
        let mut el = Element::new("iq");
        el.merge_attrs(vec![
            ("id".to_string(), Some("1".to_string())),
            ("type".to_string(), None),
        ]);
        assert_eq!(el.attr("id"), Some("1"));
        assert_eq!(el.attr("type"), None);
        assert!(!el.to_string().contains("null"));
    }

    #[test]
    fn is_matches_name_and_ns() {
        let el = Element::new_with_ns("bind", "urn:ietf:params:xml:ns:xmpp-bind");
        assert!(el.is("bind", "urn:ietf:params:xml:ns:xmpp-bind"));
        assert!(!el.is("bind", "other"));
        assert!(!el.is("other", "urn:ietf:params:xml:ns:xmpp-bind"));
    }

    #[test]
    fn serializes_escaped_text() {
        let mut el = Element::new("t");
        el.append_text("a & b < c");
        assert_eq!(el.to_string(), "<t>a &amp; b &lt; c</t>");
    }

    #[test]
    fn self_closes_when_empty() {
        let el = Element::new("presence");
        assert_eq!(el.to_string(), "<presence/>");
    }
}
